//! COSPAS Burst Detector
//!
//! Cuts discrete beacon bursts out of a continuous I/Q stream. The detector
//! first calibrates an adaptive threshold on 0.5 s of input, then runs a
//! three-state machine (idle / in-burst / burst-complete) driven by a feature
//! signal: either raw sample magnitude or the magnitude of a sliding
//! one-bit-period autocorrelation, which rides through the Manchester
//! mid-bit dips that raw amplitude detection stumbles on.
//!
//! Completed bursts are delivered on both interfaces at once: the whole
//! buffer on the `"bursts"` message port, and the same samples bracketed by
//! `burst_start`/`burst_end` tags on the output stream. The trailing silence
//! that closed the burst is kept; the demodulator expects the full envelope.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::burst_detector::CospasBurstDetector;
//! use sarsat406_core::config::ReceiverConfig;
//! use sarsat406_core::burst::TaggedStream;
//! use num_complex::Complex64;
//!
//! let config = ReceiverConfig::default();
//! let mut detector = CospasBurstDetector::new(&config);
//! let mut out = TaggedStream::new(65_536);
//!
//! // Calibration: half a second of near-silence.
//! let silence = vec![Complex64::new(1e-4, 0.0); 20_000];
//! let bursts = detector.feed(&silence, &mut out);
//! assert!(bursts.is_empty());
//! ```

use std::sync::{Arc, Mutex};

use crate::burst::{BurstBuffer, TagKind, TaggedStream};
use crate::config::{DetectorFeature, ReceiverConfig};
use crate::port::MessagePort;
use crate::types::IQSample;

/// Threshold floor for the autocorrelation feature; keeps an all-silence
/// calibration from producing a zero trigger level.
const MIN_THRESHOLD_CORRELATION: f64 = 1e-8;

/// Threshold floor for the amplitude feature.
const MIN_THRESHOLD_AMPLITUDE: f64 = 1e-2;

/// Detection state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum DetectorState {
    /// Waiting for the feature to cross the threshold.
    Idle,
    /// Accumulating a burst; counts the current sub-threshold run.
    InBurst { silence_count: usize },
    /// A burst is complete and still draining into the output stream.
    /// Incoming samples are consumed but not evaluated.
    BurstComplete,
}

/// Counters and flags shared with observer threads.
#[derive(Debug, Clone, Default)]
pub struct DetectorStats {
    /// Bursts accepted (long enough) since the last statistics reset.
    pub bursts_detected: u64,
    /// Bursts discarded for being shorter than the minimum.
    pub bursts_too_short: u64,
}

#[derive(Debug)]
struct Shared {
    stats: DetectorStats,
    debug_mode: bool,
}

/// Adaptive-threshold burst detector.
#[derive(Debug)]
pub struct CospasBurstDetector {
    sample_rate: f64,
    feature: DetectorFeature,
    threshold_factor: f64,
    min_burst_samples: usize,
    silence_limit: usize,
    calibration_samples: usize,

    // Adaptive threshold
    threshold: f64,
    threshold_initialized: bool,
    calibration_buffer: Vec<f64>,

    // Sliding autocorrelation over 2 bit periods of amplitude values
    samples_per_bit: usize,
    correlation_buffer: Vec<f64>,
    correlation_index: usize,

    state: DetectorState,
    burst_samples: Vec<IQSample>,
    burst_offset: u64,
    total_consumed: u64,

    // Completed burst still draining into the tagged stream
    pending: Vec<IQSample>,
    pending_offset: usize,
    pending_start_tagged: bool,

    bursts_out: MessagePort<BurstBuffer>,
    shared: Arc<Mutex<Shared>>,
}

impl CospasBurstDetector {
    pub fn new(config: &ReceiverConfig) -> Self {
        let samples_per_bit = config.samples_per_bit();
        Self {
            sample_rate: config.sample_rate,
            feature: config.detector_feature,
            threshold_factor: config.threshold_factor,
            min_burst_samples: config.min_burst_samples(),
            silence_limit: config.silence_limit_samples(),
            calibration_samples: config.calibration_samples(),
            threshold: 0.0,
            threshold_initialized: false,
            calibration_buffer: Vec::with_capacity(config.calibration_samples()),
            samples_per_bit,
            correlation_buffer: vec![0.0; 2 * samples_per_bit],
            correlation_index: 0,
            state: DetectorState::Idle,
            burst_samples: Vec::new(),
            burst_offset: 0,
            total_consumed: 0,
            pending: Vec::new(),
            pending_offset: 0,
            pending_start_tagged: false,
            bursts_out: MessagePort::new("bursts", 8),
            shared: Arc::new(Mutex::new(Shared {
                stats: DetectorStats::default(),
                debug_mode: config.debug_mode,
            })),
        }
    }

    /// Consume input samples. Returns completed bursts in capture order and
    /// writes the same bursts, tagged, into `out` (as far as capacity
    /// allows; the rest drains on later calls).
    pub fn feed(&mut self, input: &[IQSample], out: &mut TaggedStream) -> Vec<BurstBuffer> {
        let debug = self.debug_mode();
        let mut completed = Vec::new();

        // A burst still draining blocks the state machine: consume input
        // without evaluating it so the next burst cannot interleave.
        self.drain_pending(out);
        if !self.pending.is_empty() {
            self.total_consumed += input.len() as u64;
            return completed;
        }

        for &sample in input {
            // A completed burst drains as soon as the output has room, so a
            // closely following burst is not lost to the pause.
            if matches!(self.state, DetectorState::BurstComplete) {
                self.drain_pending(out);
            }

            let offset = self.total_consumed;
            self.total_consumed += 1;

            let feature = self.feature_value(sample);

            if !self.threshold_initialized {
                self.calibrate(feature, debug);
                continue;
            }

            match self.state {
                DetectorState::Idle => {
                    if feature > self.threshold {
                        self.state = DetectorState::InBurst { silence_count: 0 };
                        self.burst_samples.clear();
                        self.burst_samples.push(sample);
                        self.burst_offset = offset;
                        if debug {
                            tracing::debug!(feature, threshold = self.threshold, "burst started");
                        }
                    }
                }
                DetectorState::InBurst { silence_count } => {
                    self.burst_samples.push(sample);

                    if feature > self.threshold {
                        self.state = DetectorState::InBurst { silence_count: 0 };
                    } else {
                        let silence = silence_count + 1;
                        if silence >= self.silence_limit {
                            if self.burst_samples.len() >= self.min_burst_samples {
                                self.complete_burst(&mut completed, debug);
                            } else {
                                if debug {
                                    tracing::debug!(
                                        len = self.burst_samples.len(),
                                        min = self.min_burst_samples,
                                        "burst too short, discarded"
                                    );
                                }
                                if let Ok(mut shared) = self.shared.lock() {
                                    shared.stats.bursts_too_short += 1;
                                }
                                self.reset_burst_state();
                            }
                        } else {
                            self.state = DetectorState::InBurst {
                                silence_count: silence,
                            };
                        }
                    }
                }
                DetectorState::BurstComplete => {
                    // Paused until the pending buffer is gone.
                }
            }
        }

        self.drain_pending(out);
        completed
    }

    fn feature_value(&mut self, sample: IQSample) -> f64 {
        let amplitude = sample.norm();
        match self.feature {
            DetectorFeature::Amplitude => amplitude,
            DetectorFeature::Autocorrelation => {
                self.correlation_buffer[self.correlation_index] = amplitude;
                self.correlation_index =
                    (self.correlation_index + 1) % self.correlation_buffer.len();
                self.compute_autocorrelation()
            }
        }
    }

    /// Mean-removed product of the two bit-period halves of the circular
    /// amplitude window.
    fn compute_autocorrelation(&self) -> f64 {
        let window = self.correlation_buffer.len();
        let mean: f64 = self.correlation_buffer.iter().sum::<f64>() / window as f64;

        let mut correlation = 0.0;
        for i in 0..self.samples_per_bit {
            let idx1 = (self.correlation_index + i) % window;
            let idx2 = (self.correlation_index + i + self.samples_per_bit) % window;
            correlation +=
                (self.correlation_buffer[idx1] - mean) * (self.correlation_buffer[idx2] - mean);
        }
        correlation.abs()
    }

    fn calibrate(&mut self, feature: f64, debug: bool) {
        self.calibration_buffer.push(feature);
        if self.calibration_buffer.len() < self.calibration_samples {
            return;
        }

        let max_feature = self
            .calibration_buffer
            .iter()
            .cloned()
            .fold(f64::MIN, f64::max);
        let floor = match self.feature {
            DetectorFeature::Amplitude => MIN_THRESHOLD_AMPLITUDE,
            DetectorFeature::Autocorrelation => MIN_THRESHOLD_CORRELATION,
        };
        self.threshold = (self.threshold_factor * max_feature).max(floor);
        self.threshold_initialized = true;
        self.calibration_buffer = Vec::new();

        if debug {
            tracing::debug!(
                max_feature,
                threshold = self.threshold,
                "calibration complete"
            );
        }
    }

    fn complete_burst(&mut self, completed: &mut Vec<BurstBuffer>, debug: bool) {
        let burst = BurstBuffer::new(std::mem::take(&mut self.burst_samples), self.burst_offset);

        if let Ok(mut shared) = self.shared.lock() {
            shared.stats.bursts_detected += 1;
        }
        if debug {
            tracing::debug!(
                len = burst.len(),
                duration_ms = burst.duration_ms(self.sample_rate),
                capture_offset = burst.capture_offset,
                "burst complete"
            );
        }

        // Stage the samples for the tagged stream before the buffer moves on.
        self.pending = burst.samples.clone();
        self.pending_offset = 0;
        self.pending_start_tagged = false;
        self.state = DetectorState::BurstComplete;

        self.bursts_out.publish(burst.clone());
        completed.push(burst);
    }

    /// Progressively copy a completed burst into the bounded output stream.
    fn drain_pending(&mut self, out: &mut TaggedStream) {
        if self.pending.is_empty() {
            return;
        }
        let total_len = self.pending.len() as u64;

        while self.pending_offset < self.pending.len() && out.remaining() > 0 {
            let offset = out.push(self.pending[self.pending_offset]);
            if !self.pending_start_tagged {
                out.add_tag(offset, TagKind::BurstStart { total_len });
                self.pending_start_tagged = true;
            }
            self.pending_offset += 1;
            if self.pending_offset == self.pending.len() {
                out.add_tag(offset, TagKind::BurstEnd { total_len });
            }
        }

        if self.pending_offset == self.pending.len() {
            self.pending = Vec::new();
            self.pending_offset = 0;
            self.reset_burst_state();
        }
    }

    fn reset_burst_state(&mut self) {
        self.state = DetectorState::Idle;
        self.burst_samples.clear();
    }

    /// Monitoring port carrying every completed burst.
    pub fn bursts_port(&mut self) -> &mut MessagePort<BurstBuffer> {
        &mut self.bursts_out
    }

    /// Whether the calibration window has completed.
    pub fn is_calibrated(&self) -> bool {
        self.threshold_initialized
    }

    /// Adaptive trigger level (0.0 until calibrated).
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn bursts_detected(&self) -> u64 {
        self.shared
            .lock()
            .map(|s| s.stats.bursts_detected)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> DetectorStats {
        self.shared
            .lock()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    pub fn reset_statistics(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.stats = DetectorStats::default();
        }
    }

    pub fn set_debug_mode(&mut self, enable: bool) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.debug_mode = enable;
        }
    }

    fn debug_mode(&self) -> bool {
        self.shared.lock().map(|s| s.debug_mode).unwrap_or(false)
    }

    /// Full reset: drops any partial burst and re-enters calibration-done
    /// idle state. Counters are untouched. Safe at any suspension point;
    /// calling it twice is a no-op.
    pub fn reset_state(&mut self) {
        self.state = DetectorState::Idle;
        self.burst_samples.clear();
        self.pending = Vec::new();
        self.pending_offset = 0;
        self.pending_start_tagged = false;
        self.correlation_buffer.fill(0.0);
        self.correlation_index = 0;
        self.bursts_out.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    fn config() -> ReceiverConfig {
        ReceiverConfig {
            min_burst_duration_ms: 100,
            ..Default::default()
        }
    }

    fn quiet(n: usize) -> Vec<IQSample> {
        vec![Complex64::new(1e-4, 0.0); n]
    }

    fn loud(n: usize) -> Vec<IQSample> {
        vec![Complex64::new(0.5, 0.0); n]
    }

    /// Amplitude-modulated tone so the autocorrelation feature has structure.
    fn modulated(n: usize, samples_per_bit: usize) -> Vec<IQSample> {
        (0..n)
            .map(|i| {
                let on = (i / (samples_per_bit / 2)) % 2 == 0;
                Complex64::new(if on { 0.5 } else { 0.1 }, 0.0)
            })
            .collect()
    }

    fn calibrated_detector(feature: DetectorFeature) -> CospasBurstDetector {
        let config = ReceiverConfig {
            detector_feature: feature,
            ..config()
        };
        let mut detector = CospasBurstDetector::new(&config);
        let mut out = TaggedStream::new(1 << 20);
        detector.feed(&quiet(config.calibration_samples()), &mut out);
        assert!(detector.is_calibrated());
        detector
    }

    #[test]
    fn test_no_output_during_calibration() {
        let config = config();
        let mut detector = CospasBurstDetector::new(&config);
        let mut out = TaggedStream::new(1 << 20);

        let bursts = detector.feed(&loud(config.calibration_samples() - 1), &mut out);
        assert!(bursts.is_empty());
        assert!(!detector.is_calibrated());
    }

    #[test]
    fn test_detects_amplitude_burst() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = quiet(1000);
        signal.extend(loud(8000));
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);

        assert_eq!(bursts.len(), 1);
        assert_eq!(detector.bursts_detected(), 1);
        // Length covers the burst plus the silence run that closed it.
        assert!(bursts[0].len() >= 8000);
        assert_eq!(bursts[0].capture_offset, 20_000 + 1000);
    }

    #[test]
    fn test_detects_autocorrelation_burst() {
        let mut detector = calibrated_detector(DetectorFeature::Autocorrelation);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = quiet(1000);
        signal.extend(modulated(8000, 100));
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);

        assert_eq!(bursts.len(), 1);
    }

    #[test]
    fn test_burst_keeps_trailing_silence() {
        let config = config();
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = loud(8000);
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);

        assert_eq!(bursts.len(), 1);
        let burst = &bursts[0];
        let silence_limit = config.silence_limit_samples();
        // The captured envelope ends with at least silence_limit quiet samples.
        let tail = &burst.samples[burst.len() - silence_limit..];
        assert!(tail.iter().all(|s| s.norm() < 0.01));
    }

    #[test]
    fn test_short_burst_dropped() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = loud(500); // well under min_burst_samples
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);

        assert!(bursts.is_empty());
        assert_eq!(detector.bursts_detected(), 0);
        assert_eq!(detector.stats().bursts_too_short, 1);
    }

    #[test]
    fn test_tagged_stream_brackets_burst() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = loud(8000);
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);
        assert_eq!(bursts.len(), 1);

        let (samples, tags) = out.drain();
        assert_eq!(samples.len(), bursts[0].len());
        assert_eq!(tags.len(), 2);
        match (tags[0].kind, tags[1].kind) {
            (TagKind::BurstStart { total_len: a }, TagKind::BurstEnd { total_len: b }) => {
                assert_eq!(a, bursts[0].len() as u64);
                assert_eq!(a, b);
            }
            other => panic!("unexpected tags: {other:?}"),
        }
        assert_eq!(tags[0].offset, 0);
        assert_eq!(tags[1].offset, samples.len() as u64 - 1);
    }

    #[test]
    fn test_backpressure_pauses_state_machine() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        // Output too small to hold the burst in one call.
        let mut out = TaggedStream::new(1024);

        let mut signal = loud(8000);
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);
        assert_eq!(bursts.len(), 1);

        // A second burst arriving while the first drains must not be detected.
        let mut more = loud(8000);
        more.extend(quiet(2000));
        let bursts = detector.feed(&more, &mut out);
        assert!(bursts.is_empty());
        assert_eq!(detector.bursts_detected(), 1);

        // Drain to completion; the detector resumes afterwards.
        loop {
            out.drain();
            detector.feed(&[], &mut out);
            if out.samples().is_empty() {
                break;
            }
        }
        let mut third = loud(8000);
        third.extend(quiet(2000));
        out.drain();
        let mut big_out = TaggedStream::new(1 << 20);
        let bursts = detector.feed(&third, &mut big_out);
        assert_eq!(bursts.len(), 1, "detector resumes after drain");
        assert_eq!(detector.bursts_detected(), 2);
    }

    #[test]
    fn test_message_port_carries_burst() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);

        let mut signal = loud(8000);
        signal.extend(quiet(2000));
        let bursts = detector.feed(&signal, &mut out);

        let published = detector.bursts_port().drain();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0], bursts[0]);
    }

    #[test]
    fn test_reset_state_idempotent() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);
        detector.feed(&loud(3000), &mut out);

        detector.reset_state();
        let first = format!("{:?}", detector.state);
        detector.reset_state();
        assert_eq!(first, format!("{:?}", detector.state));
        assert!(detector.burst_samples.is_empty());
    }

    #[test]
    fn test_reset_statistics_only_clears_counters() {
        let mut detector = calibrated_detector(DetectorFeature::Amplitude);
        let mut out = TaggedStream::new(1 << 20);
        let mut signal = loud(8000);
        signal.extend(quiet(2000));
        detector.feed(&signal, &mut out);
        assert_eq!(detector.bursts_detected(), 1);

        detector.reset_statistics();
        assert_eq!(detector.bursts_detected(), 0);
        assert!(detector.is_calibrated());
    }
}
