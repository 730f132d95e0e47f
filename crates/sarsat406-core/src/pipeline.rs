//! Receiver Pipeline
//!
//! Wires the four stages into the one-directional flow:
//!
//! ```text
//! IQ samples ─▶ detector ─▶ router ─┬─▶ FGB demodulator ─▶ decoder ─▶ BeaconRecord
//!                                   └─▶ SGB demodulator (pluggable)
//! ```
//!
//! The pipeline is single-threaded cooperative: [`Receiver::feed`] drives
//! each stage with bounded chunks and returns whatever records completed,
//! keeping partial state (half-captured bursts, an acquisition in progress)
//! across calls. Bursts flow on the message path in strict capture order;
//! the detector's tagged stream remains available to external stream-only
//! collaborators but is advisory here.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::pipeline::Receiver;
//! use sarsat406_core::config::ReceiverConfig;
//! use num_complex::Complex64;
//!
//! let mut receiver = Receiver::new(ReceiverConfig::default()).unwrap();
//! let silence = vec![Complex64::new(1e-4, 0.0); 30_000];
//! let records = receiver.feed(&silence);
//! assert!(records.is_empty());
//! ```

use crate::burst::{BurstBuffer, TaggedStream};
use crate::burst_detector::{CospasBurstDetector, DetectorStats};
use crate::burst_router::{BurstRouter, RouterStats};
use crate::config::ReceiverConfig;
use crate::decoder::{BeaconRecord, DecoderStats, MessageDecoder};
use crate::fgb_demodulator::{DemodulatorStats, FgbDemodulator};
use crate::frame::DemodulatedFrame;
use crate::types::{BurstClass, IQSample, SarsatResult};

/// Chunk size the receiver uses to drive the detector, mirroring a
/// cooperative scheduler's bounded work quantum.
const FEED_CHUNK: usize = 8192;

/// Contract for a pluggable second-generation demodulator. The core ships
/// without one; SGB bursts are classified, counted and dropped until an
/// implementation is installed.
pub trait SgbDemodulator {
    /// Demodulate one SGB burst into a 250-bit frame.
    fn process_burst(&mut self, burst: &BurstBuffer) -> Option<DemodulatedFrame>;

    /// Clear any partial acquisition state.
    fn reset_state(&mut self) {}
}

/// Aggregated per-stage counters.
#[derive(Debug, Clone, Default)]
pub struct ReceiverStats {
    pub detector: DetectorStats,
    pub router: RouterStats,
    pub demodulator: DemodulatorStats,
    pub decoder: DecoderStats,
}

/// The assembled receiver core.
pub struct Receiver {
    detector: CospasBurstDetector,
    router: BurstRouter,
    fgb: FgbDemodulator,
    decoder: MessageDecoder,
    sgb: Option<Box<dyn SgbDemodulator>>,
    /// Sink for the detector's tagged stream (advisory on this path).
    stream: TaggedStream,
}

impl Receiver {
    pub fn new(config: ReceiverConfig) -> SarsatResult<Self> {
        config.validate()?;
        let stream_capacity = (2 * config.size_threshold_samples).max(config.buffer_samples());
        Ok(Self {
            detector: CospasBurstDetector::new(&config),
            router: BurstRouter::new(&config),
            fgb: FgbDemodulator::new(&config),
            decoder: MessageDecoder::new(config.debug_mode),
            sgb: None,
            stream: TaggedStream::new(stream_capacity),
        })
    }

    /// Install a second-generation demodulator collaborator.
    pub fn with_sgb_demodulator(mut self, sgb: Box<dyn SgbDemodulator>) -> Self {
        self.sgb = Some(sgb);
        self
    }

    /// Consume a chunk of baseband and return the beacon records it
    /// completed, in capture order.
    pub fn feed(&mut self, samples: &[IQSample]) -> Vec<BeaconRecord> {
        let mut records = Vec::new();

        for chunk in samples.chunks(FEED_CHUNK) {
            // The pipeline consumes the framing-exact message path; the tag
            // stream is drained so back-pressure never stalls the detector.
            self.stream.drain();
            let bursts = self.detector.feed(chunk, &mut self.stream);
            self.detector.bursts_port().clear();

            for burst in bursts {
                match self.router.route(burst) {
                    BurstClass::Fgb => {
                        for routed in self.router.fgb_port().drain() {
                            self.demodulate_fgb(&routed, &mut records);
                        }
                    }
                    BurstClass::Sgb => {
                        for routed in self.router.sgb_port().drain() {
                            self.demodulate_sgb(&routed, &mut records);
                        }
                    }
                }
            }
        }

        records
    }

    fn demodulate_fgb(&mut self, burst: &BurstBuffer, records: &mut Vec<BeaconRecord>) {
        let Some(frame) = self.fgb.process_burst(burst) else {
            return;
        };
        match self.decoder.decode(&frame) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(%error, "frame refused by decoder");
            }
        }
    }

    fn demodulate_sgb(&mut self, burst: &BurstBuffer, records: &mut Vec<BeaconRecord>) {
        let Some(sgb) = self.sgb.as_mut() else {
            tracing::debug!(len = burst.len(), "no SGB demodulator installed, burst dropped");
            return;
        };
        let Some(frame) = sgb.process_burst(burst) else {
            return;
        };
        match self.decoder.decode(&frame) {
            Ok(record) => records.push(record),
            Err(error) => {
                tracing::warn!(%error, "SGB frame refused by decoder");
            }
        }
    }

    pub fn stats(&self) -> ReceiverStats {
        ReceiverStats {
            detector: self.detector.stats(),
            router: self.router.stats(),
            demodulator: self.fgb.stats(),
            decoder: self.decoder.stats(),
        }
    }

    pub fn bursts_1g(&self) -> u64 {
        self.router.bursts_1g()
    }

    pub fn bursts_2g(&self) -> u64 {
        self.router.bursts_2g()
    }

    pub fn reset_statistics(&mut self) {
        self.detector.reset_statistics();
        self.router.reset_statistics();
        self.fgb.reset_statistics();
        self.decoder.reset_statistics();
    }

    /// Drop all partial state in every stage. Counters survive; calling it
    /// twice is a no-op.
    pub fn reset_state(&mut self) {
        self.detector.reset_state();
        self.router.reset_state();
        self.fgb.reset_state();
        if let Some(sgb) = self.sgb.as_mut() {
            sgb.reset_state();
        }
        self.stream.drain();
    }

    pub fn set_debug_mode(&mut self, enable: bool) {
        self.detector.set_debug_mode(enable);
        self.router.set_debug_mode(enable);
        self.fgb.set_debug_mode(enable);
        self.decoder.set_debug_mode(enable);
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("detector", &self.detector)
            .field("router", &self.router)
            .field("fgb", &self.fgb)
            .field("sgb_installed", &self.sgb.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectorFeature;
    use crate::frame::FrameQuality;
    use crate::generator::{FgbWaveformGenerator, FrameBuilder, WaveformConfig};
    use num_complex::Complex64;

    /// Ideal synthetic bursts have a flat envelope, so detection goes by
    /// amplitude; the autocorrelation feature needs the bit-rate envelope
    /// ripple of a real filtered transmitter.
    fn test_config() -> ReceiverConfig {
        ReceiverConfig {
            detector_feature: DetectorFeature::Amplitude,
            ..Default::default()
        }
    }

    fn calibration(config: &ReceiverConfig) -> Vec<IQSample> {
        vec![Complex64::new(1e-4, 0.0); config.calibration_samples()]
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = ReceiverConfig {
            sample_rate: -1.0,
            ..Default::default()
        };
        assert!(Receiver::new(config).is_err());
    }

    #[test]
    fn test_decodes_burst_in_stream() {
        let config = test_config();
        let mut receiver = Receiver::new(config.clone()).unwrap();

        let bits = FrameBuilder::long()
            .country_code(227)
            .protocol_code(3)
            .identification_field(0x3C6589)
            .position_quarter_deg(48.5, 2.25)
            .build();
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());

        let mut capture = calibration(&config);
        capture.extend(vec![Complex64::new(1e-4, 0.0); 5000]);
        capture.extend(generator.generate(&bits));
        capture.extend(vec![Complex64::new(1e-4, 0.0); 5000]);

        let records = receiver.feed(&capture);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country_code, 227);
        assert!(records[0].integrity.ok());
        assert_eq!(receiver.bursts_1g(), 1);
        assert_eq!(receiver.stats().detector.bursts_detected, 1);
    }

    #[test]
    fn test_feed_in_small_chunks_preserves_state() {
        let config = test_config();
        let mut receiver = Receiver::new(config.clone()).unwrap();

        let bits = FrameBuilder::short().country_code(226).user_protocol_code(1).build();
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());

        let mut capture = calibration(&config);
        capture.extend(vec![Complex64::new(1e-4, 0.0); 3000]);
        capture.extend(generator.generate(&bits));
        capture.extend(vec![Complex64::new(1e-4, 0.0); 3000]);

        let mut records = Vec::new();
        for chunk in capture.chunks(777) {
            records.extend(receiver.feed(chunk));
        }
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].country_code, 226);
    }

    #[test]
    fn test_sgb_burst_dropped_without_collaborator() {
        let config = test_config();
        let mut receiver = Receiver::new(config.clone()).unwrap();

        let mut capture = calibration(&config);
        capture.extend(vec![Complex64::new(1e-4, 0.0); 2000]);
        // A long modulated burst classifies as SGB.
        let mut state = 0x9e3779b97f4a7c15u64;
        for _ in 0..40_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let phase = (state % 628) as f64 / 100.0 - 3.14;
            capture.push(Complex64::from_polar(0.5, phase));
        }
        capture.extend(vec![Complex64::new(1e-4, 0.0); 4000]);

        let records = receiver.feed(&capture);
        assert!(records.is_empty());
        assert_eq!(receiver.bursts_2g(), 1);
        assert_eq!(receiver.bursts_1g(), 0);
    }

    struct FixedSgb(Vec<u8>);

    impl SgbDemodulator for FixedSgb {
        fn process_burst(&mut self, _burst: &BurstBuffer) -> Option<DemodulatedFrame> {
            Some(DemodulatedFrame {
                bits: self.0.clone(),
                class: BurstClass::Sgb,
                quality: FrameQuality {
                    samples_per_bit: 0.0,
                    freq_offset_hz: 0.0,
                    ambiguous_bits: 0,
                },
            })
        }
    }

    #[test]
    fn test_sgb_collaborator_feeds_decoder() {
        let config = test_config();
        let mut receiver = Receiver::new(config.clone())
            .unwrap()
            .with_sgb_demodulator(Box::new(FixedSgb(vec![1u8; 250])));

        let mut capture = calibration(&config);
        capture.extend(vec![Complex64::new(1e-4, 0.0); 2000]);
        let mut state = 0xdeadbeefdeadbeefu64;
        for _ in 0..40_000 {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            let phase = (state % 628) as f64 / 100.0 - 3.14;
            capture.push(Complex64::from_polar(0.5, phase));
        }
        capture.extend(vec![Complex64::new(1e-4, 0.0); 4000]);

        let records = receiver.feed(&capture);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].frame_kind, crate::types::FrameKind::Sgb);
    }

    #[test]
    fn test_reset_state_idempotent() {
        let mut receiver = Receiver::new(test_config()).unwrap();
        receiver.feed(&vec![Complex64::new(0.5, 0.0); 10_000]);
        receiver.reset_state();
        receiver.reset_state();
        let stats = receiver.stats();
        assert_eq!(stats.decoder.frames_decoded, 0);
    }
}
