//! First-Generation Beacon Demodulator
//!
//! Turns an FGB burst (160 ms unmodulated carrier followed by 112 or 144
//! bits of biphase-L at 400 bps) into a bit frame. The acquisition machine
//! has five states:
//!
//! ```text
//! CarrierSearch ─▶ CarrierTracking ─▶ BitSync ─▶ FrameSync ─▶ Message
//!      ▲                                                         │
//!      └──────────────── frame emitted / sync lost ◀─────────────┘
//! ```
//!
//! - **CarrierSearch** accumulates the phase of strong samples, estimates
//!   the carrier frequency offset over a 5 000-sample window (validating
//!   that the window is a linear-phase carrier, not BPSK), then confirms
//!   the carrier with 25 ms of in-band smoothed phase.
//! - **CarrierTracking** holds the de-rotated phase reference and waits for
//!   the first Manchester phase jump: > 1.0 rad against the phase ten
//!   samples back, measured on three-sample coherent averages so a single
//!   noise spike cannot fake the carrier-to-BPSK edge.
//! - **BitSync** decodes the fifteen '1' preamble bits while collecting
//!   mid-bit transition positions; the median spacing measures the true
//!   samples-per-bit.
//! - **FrameSync** and **Message** decode the remaining bits with the
//!   measured bit clock, continuously steering a timing offset μ toward the
//!   observed transition position inside each bit window.
//!
//! Each bit integrates the middle of both half-bit plateaus and takes the
//! phase difference of the two sums: below −0.5 rad is a '1', above
//! +0.5 rad a '0', anything in between is ambiguous and falls back to the
//! sign. More than five consecutive ambiguous bits aborts the acquisition
//! and counts a sync failure. A completed frame is always emitted,
//! ambiguous bits included; integrity is the decoder's business.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use num_complex::Complex64;

use crate::burst::BurstBuffer;
use crate::config::ReceiverConfig;
use crate::frame::{DemodulatedFrame, FrameQuality, BIT_SYNC_BITS, FRAME_SYNC_BITS};
use crate::phase_ops::{phase_diff, wrap_angle};
use crate::types::{BurstClass, IQSample};

/// Amplitude gate below which a sample contributes no phase statistics.
const STRONG_AMPLITUDE: f64 = 0.05;

/// Phase-history window for the frequency estimate.
const FREQ_EST_WINDOW: usize = 5000;

/// Linear-fit residual above which the estimation window is modulated.
const MAX_CARRIER_RESIDUAL: f64 = 0.3;

/// Offsets at or below this are treated as zero.
const MIN_LOCK_OFFSET_HZ: f64 = 10.0;

/// Smoothed-phase deviation accepted as carrier.
const CARRIER_THRESHOLD: f64 = 0.2;

/// Carrier run confirming acquisition once the offset is locked (25 ms).
const CARRIER_CONFIRM_SECONDS: f64 = 0.025;

/// Phase jump (vs. ten samples back) that marks the carrier-to-BPSK edge.
const JUMP_THRESHOLD: f64 = 1.0;

/// Samples coherently averaged on each side of the jump comparison.
const JUMP_AVG: usize = 3;

/// Consecutive-sample phase step recorded as a Manchester transition.
const TRANSITION_THRESHOLD: f64 = 1.5;

/// Bit-decode decision threshold on the half-bit phase difference.
const DECISION_THRESHOLD: f64 = 0.5;

/// Smoothing factor for the carrier-presence phase filter.
const PHASE_LPF_ALPHA: f64 = 0.05;

/// Ambiguous-bit run that aborts the acquisition.
const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Timing-loop gain during frame sync.
const TIMING_GAIN_FRAME_SYNC: f64 = 0.2;

/// Timing-loop gain during the message body.
const TIMING_GAIN_MESSAGE: f64 = 0.1;

/// Clamp on the adaptive timing offset, in samples.
const MU_LIMIT: f64 = 25.0;

/// Acquisition state with its per-state working data.
#[derive(Debug, Clone)]
enum DemodState {
    CarrierSearch {
        /// Wrapped phases of recent strong samples (pre-lock).
        phase_history: Vec<f64>,
        /// Start-of-run reference for the smoothed phase (post-lock).
        run_ref: Option<f64>,
        /// Consecutive in-band samples since the run started.
        consecutive: usize,
    },
    CarrierTracking {
        /// Recent strong corrected samples, newest last.
        recent: VecDeque<IQSample>,
    },
    BitSync {
        bit_buf: Vec<IQSample>,
        /// Sample counters at which phase transitions were observed.
        transitions: Vec<usize>,
        sync_count: usize,
        last_phase: Option<f64>,
    },
    FrameSync {
        bit_buf: Vec<IQSample>,
    },
    Message {
        bit_buf: Vec<IQSample>,
        target_bits: usize,
    },
}

/// Counters shared with observer threads.
#[derive(Debug, Clone, Default)]
pub struct DemodulatorStats {
    pub frames_decoded: u64,
    pub sync_failures: u64,
}

#[derive(Debug)]
struct Shared {
    stats: DemodulatorStats,
    debug_mode: bool,
}

/// Biphase-L demodulator for first-generation bursts.
#[derive(Debug)]
pub struct FgbDemodulator {
    sample_rate: f64,
    samples_per_bit: usize,
    carrier_confirm_samples: usize,

    state: DemodState,
    bits: Vec<u8>,
    measured_spb: f64,
    mu: f64,
    ambiguous_bits: u32,
    consecutive_ambiguous: u32,

    freq_locked: bool,
    freq_offset_hz: f64,
    phase_correction: f64,
    lpf_phase: f64,

    shared: Arc<Mutex<Shared>>,
}

impl FgbDemodulator {
    pub fn new(config: &ReceiverConfig) -> Self {
        let samples_per_bit = config.samples_per_bit();
        Self {
            sample_rate: config.sample_rate,
            samples_per_bit,
            carrier_confirm_samples: (CARRIER_CONFIRM_SECONDS * config.sample_rate) as usize,
            state: DemodState::initial(),
            bits: Vec::new(),
            measured_spb: samples_per_bit as f64,
            mu: 0.0,
            ambiguous_bits: 0,
            consecutive_ambiguous: 0,
            freq_locked: false,
            freq_offset_hz: 0.0,
            phase_correction: 0.0,
            lpf_phase: 0.0,
            shared: Arc::new(Mutex::new(Shared {
                stats: DemodulatorStats::default(),
                debug_mode: config.debug_mode,
            })),
        }
    }

    /// Demodulate one burst. Residual samples after a completed frame are
    /// discarded: they sit mid-signal and cannot be realigned without a
    /// fresh carrier acquisition.
    pub fn process_burst(&mut self, burst: &BurstBuffer) -> Option<DemodulatedFrame> {
        let debug = self.debug_mode();
        self.reset_state();

        if burst.is_empty() {
            return None;
        }
        if debug {
            tracing::debug!(
                len = burst.len(),
                p95_amplitude = amplitude_percentile(&burst.samples, 0.95),
                "processing burst"
            );
        }

        // Padding guarantees the final bit window fills even when the burst
        // was cut tight.
        let padding = 2 * self.samples_per_bit;
        let total = burst.len() + padding;

        for index in 0..total {
            let raw = if index < burst.len() {
                burst.samples[index]
            } else {
                Complex64::new(0.0, 0.0)
            };
            let sample = self.apply_freq_correction(raw);

            if let Some(frame) = self.process_sample(sample, index, total, debug) {
                if let Ok(mut shared) = self.shared.lock() {
                    shared.stats.frames_decoded += 1;
                }
                self.reset_state();
                return Some(frame);
            }
        }

        if debug {
            tracing::debug!(bits = self.bits.len(), "burst exhausted without a frame");
        }
        self.reset_state();
        None
    }

    fn process_sample(
        &mut self,
        sample: IQSample,
        index: usize,
        total: usize,
        debug: bool,
    ) -> Option<DemodulatedFrame> {
        let phase = sample.arg();
        let strong = sample.norm() > STRONG_AMPLITUDE;

        // Take the state by value so the per-state data can move between
        // variants without fighting the estimator calls below.
        let state = std::mem::replace(&mut self.state, DemodState::initial());

        match state {
            DemodState::CarrierSearch {
                mut phase_history,
                mut run_ref,
                mut consecutive,
            } => {
                if strong {
                    if !self.freq_locked {
                        phase_history.push(phase);
                        if phase_history.len() >= FREQ_EST_WINDOW {
                            self.estimate_freq_offset(&phase_history, debug);
                            phase_history.clear();
                            // Restart the smoothing filter on corrected phases.
                            self.lpf_phase = 0.0;
                        }
                    } else {
                        // Locked: confirm the carrier on the smoothed phase.
                        self.lpf_phase += PHASE_LPF_ALPHA * phase_diff(self.lpf_phase, phase);
                        self.lpf_phase = wrap_angle(self.lpf_phase);

                        let reference = *run_ref.get_or_insert(self.lpf_phase);
                        if phase_diff(reference, self.lpf_phase).abs() < CARRIER_THRESHOLD {
                            consecutive += 1;
                            if consecutive >= self.carrier_confirm_samples {
                                if debug {
                                    tracing::debug!(
                                        consecutive,
                                        freq_offset_hz = self.freq_offset_hz,
                                        "carrier confirmed"
                                    );
                                }
                                self.state = DemodState::CarrierTracking {
                                    recent: VecDeque::with_capacity(200),
                                };
                                return None;
                            }
                        } else {
                            run_ref = Some(self.lpf_phase);
                            consecutive = 0;
                        }
                    }
                }
                self.state = DemodState::CarrierSearch {
                    phase_history,
                    run_ref,
                    consecutive,
                };
            }

            DemodState::CarrierTracking { mut recent } => {
                if strong {
                    recent.push_back(sample);
                    if recent.len() > 200 {
                        recent.pop_front();
                    }
                }

                // Jump metric on three-sample coherent averages, the newest
                // three against the three ending ten samples back.
                let n = recent.len();
                let jump = if n >= 10 + JUMP_AVG {
                    let now: IQSample = recent.iter().skip(n - JUMP_AVG).copied().sum();
                    let then: IQSample = recent
                        .iter()
                        .skip(n - 10 - JUMP_AVG)
                        .take(JUMP_AVG)
                        .copied()
                        .sum();
                    phase_diff(then.arg(), now.arg())
                } else {
                    0.0
                };

                if jump > JUMP_THRESHOLD {
                    if debug {
                        tracing::debug!(jump, index, "Manchester edge, entering bit sync");
                    }
                    // The jump sample is the first sample of the first
                    // bit-sync bit.
                    self.state = DemodState::BitSync {
                        bit_buf: vec![sample],
                        transitions: Vec::with_capacity(2 * BIT_SYNC_BITS),
                        sync_count: 1,
                        last_phase: Some(phase),
                    };
                } else {
                    self.state = DemodState::CarrierTracking { recent };
                }
            }

            DemodState::BitSync {
                mut bit_buf,
                mut transitions,
                mut sync_count,
                last_phase,
            } => {
                sync_count += 1;
                if let Some(last) = last_phase {
                    if phase_diff(last, phase).abs() > TRANSITION_THRESHOLD {
                        transitions.push(sync_count);
                    }
                }

                bit_buf.push(sample);
                if bit_buf.len() >= self.samples_per_bit {
                    let bit = self.decide_bit(&bit_buf);
                    if self.push_bit(bit) == PushOutcome::SyncLost {
                        return None;
                    }
                    bit_buf.clear();

                    if self.bits.len() >= BIT_SYNC_BITS {
                        self.measure_bit_clock(&transitions, debug);
                        self.state = DemodState::FrameSync {
                            bit_buf: Vec::with_capacity(self.samples_per_bit + 32),
                        };
                        return None;
                    }
                }
                self.state = DemodState::BitSync {
                    bit_buf,
                    transitions,
                    sync_count,
                    last_phase: Some(phase),
                };
            }

            DemodState::FrameSync { mut bit_buf } => {
                bit_buf.push(sample);
                let spb_actual = (self.measured_spb.round() as usize).max(4);
                if bit_buf.len() >= spb_actual {
                    let bit = self.decide_bit(&bit_buf);
                    self.track_timing(&bit_buf, TIMING_GAIN_FRAME_SYNC);
                    if self.push_bit(bit) == PushOutcome::SyncLost {
                        return None;
                    }
                    bit_buf.clear();

                    if self.bits.len() >= BIT_SYNC_BITS + FRAME_SYNC_BITS {
                        let remaining = total.saturating_sub(index + 1);
                        let bits_possible = remaining / spb_actual;
                        let target_bits = if bits_possible >= 120 { 144 } else { 112 };
                        if debug {
                            tracing::debug!(remaining, target_bits, "entering message state");
                        }
                        self.state = DemodState::Message {
                            bit_buf,
                            target_bits,
                        };
                        return None;
                    }
                }
                self.state = DemodState::FrameSync { bit_buf };
            }

            DemodState::Message {
                mut bit_buf,
                target_bits,
            } => {
                bit_buf.push(sample);
                let spb_actual = (self.measured_spb.round() as usize).max(4);
                if bit_buf.len() >= spb_actual {
                    let bit = self.decide_bit(&bit_buf);
                    self.track_timing(&bit_buf, TIMING_GAIN_MESSAGE);
                    if self.push_bit(bit) == PushOutcome::SyncLost {
                        return None;
                    }
                    bit_buf.clear();

                    if self.bits.len() >= target_bits {
                        return Some(DemodulatedFrame {
                            bits: std::mem::take(&mut self.bits),
                            class: BurstClass::Fgb,
                            quality: FrameQuality {
                                samples_per_bit: self.measured_spb,
                                freq_offset_hz: self.freq_offset_hz,
                                ambiguous_bits: self.ambiguous_bits,
                            },
                        });
                    }
                }
                self.state = DemodState::Message {
                    bit_buf,
                    target_bits,
                };
            }
        }

        None
    }

    /// Record a decoded bit, watching for an ambiguous-bit run. On overflow
    /// the acquisition restarts from carrier search; the caller must stop
    /// touching its (now stale) per-state data.
    fn push_bit(&mut self, bit: BitDecision) -> PushOutcome {
        match bit {
            BitDecision::Clean(value) => {
                self.consecutive_ambiguous = 0;
                self.bits.push(value);
            }
            BitDecision::Ambiguous(value) => {
                self.ambiguous_bits += 1;
                self.consecutive_ambiguous += 1;
                if self.consecutive_ambiguous > MAX_CONSECUTIVE_ERRORS {
                    tracing::debug!(bits = self.bits.len(), "too many ambiguous bits, sync lost");
                    if let Ok(mut shared) = self.shared.lock() {
                        shared.stats.sync_failures += 1;
                    }
                    let ambiguous_total = self.ambiguous_bits;
                    self.reset_acquisition();
                    self.ambiguous_bits = ambiguous_total;
                    return PushOutcome::SyncLost;
                }
                self.bits.push(value);
            }
        }
        PushOutcome::Ok
    }

    /// Integrate the middle of each half-bit plateau (offset by μ) and
    /// compare the phases of the two sums.
    fn decide_bit(&self, window: &[IQSample]) -> BitDecision {
        let n = window.len();
        let half = n / 2;
        let quarter = half / 2;
        let span = half / 4;
        let offset = self.mu.round() as isize;

        let mean_phase = |center: usize| -> f64 {
            let lo = center.saturating_sub(span);
            let hi = (center + span + 1).min(n);
            let sum: IQSample = window[lo..hi].iter().copied().sum();
            sum.arg()
        };

        let first = ((quarter as isize + offset).clamp(0, n as isize - 1)) as usize;
        let second = ((half as isize + quarter as isize + offset).clamp(0, n as isize - 1)) as usize;

        let diff = phase_diff(mean_phase(first), mean_phase(second));
        if diff < -DECISION_THRESHOLD {
            BitDecision::Clean(1)
        } else if diff > DECISION_THRESHOLD {
            BitDecision::Clean(0)
        } else {
            BitDecision::Ambiguous(if diff < 0.0 { 1 } else { 0 })
        }
    }

    /// Locate the strongest phase step near the bit centre and steer μ.
    fn track_timing(&mut self, window: &[IQSample], gain: f64) {
        let n = window.len();
        if n < 8 {
            return;
        }
        let center = n / 2;
        let search = n * 2 / 5;
        let start = center.saturating_sub(search).max(1);
        let end = (center + search).min(n - 1);

        let mut best_pos = center;
        let mut best_diff = 0.0;
        for i in start..end {
            let diff = phase_diff(window[i - 1].arg(), window[i + 1].arg()).abs();
            if diff > best_diff {
                best_diff = diff;
                best_pos = i;
            }
        }

        // The sampling points already sit at center + μ, so the loop error
        // is measured against that; μ then converges instead of integrating
        // a constant offset into the clamp.
        let error = best_pos as f64 - (center as f64 + self.mu);
        self.mu = (self.mu + gain * error).clamp(-MU_LIMIT, MU_LIMIT);
    }

    /// Twice the median interval between mid-bit transitions gives the real
    /// bit clock. Intervals outside [0.3, 0.7] bit periods are boundary
    /// artifacts and are ignored; the median keeps a stray noise-detected
    /// transition from skewing the clock.
    fn measure_bit_clock(&mut self, transitions: &[usize], debug: bool) {
        if transitions.len() < 4 {
            return;
        }

        let lo = (0.3 * self.samples_per_bit as f64) as usize;
        let hi = (0.7 * self.samples_per_bit as f64) as usize;
        let mut intervals: Vec<usize> = transitions
            .windows(2)
            .map(|pair| pair[1] - pair[0])
            .filter(|&interval| interval > lo && interval < hi)
            .collect();
        if intervals.is_empty() {
            return;
        }
        intervals.sort_unstable();

        let mid = intervals.len() / 2;
        let median = if intervals.len() % 2 == 1 {
            intervals[mid] as f64
        } else {
            (intervals[mid - 1] + intervals[mid]) as f64 / 2.0
        };
        self.measured_spb = 2.0 * median;
        if debug {
            tracing::debug!(
                transitions = transitions.len(),
                measured_spb = self.measured_spb,
                nominal = self.samples_per_bit,
                "bit clock measured"
            );
        }
    }

    /// Phase slope over the window, validated against a linear fit.
    ///
    /// A first slope guess comes from the mean wrapped phase difference;
    /// residuals are then taken against that line sample by sample (wrapped,
    /// so one noisy cycle slip cannot poison the whole window) and a
    /// least-squares pass refines the slope. BPSK plateaus at ±1.1 rad leave
    /// a residual spread no carrier can produce.
    fn estimate_freq_offset(&mut self, history: &[f64], debug: bool) {
        let n = history.len();
        let mut diff_sum = 0.0;
        for pair in history.windows(2) {
            diff_sum += phase_diff(pair[0], pair[1]);
        }
        let slope0 = diff_sum / (n - 1) as f64;

        let residuals: Vec<f64> = history
            .iter()
            .enumerate()
            .map(|(i, &phase)| wrap_angle(phase - history[0] - i as f64 * slope0))
            .collect();

        let i_mean = (n - 1) as f64 / 2.0;
        let r_mean = residuals.iter().sum::<f64>() / n as f64;
        let mut numerator = 0.0;
        let mut denominator = 0.0;
        for (i, &r) in residuals.iter().enumerate() {
            let di = i as f64 - i_mean;
            numerator += di * (r - r_mean);
            denominator += di * di;
        }
        let slope_refinement = numerator / denominator;
        let slope = slope0 + slope_refinement;

        let mut residual_sq = 0.0;
        for (i, &r) in residuals.iter().enumerate() {
            let fitted = r_mean + slope_refinement * (i as f64 - i_mean);
            residual_sq += (r - fitted) * (r - fitted);
        }
        let residual_std = (residual_sq / n as f64).sqrt();

        if residual_std > MAX_CARRIER_RESIDUAL {
            if debug {
                tracing::debug!(residual_std, "window is modulated, not carrier");
            }
            return;
        }

        let offset_hz = slope * self.sample_rate / (2.0 * std::f64::consts::PI);
        self.freq_locked = true;
        self.phase_correction = 0.0;
        self.freq_offset_hz = if offset_hz.abs() > MIN_LOCK_OFFSET_HZ {
            offset_hz
        } else {
            0.0
        };
        if debug {
            tracing::debug!(
                offset_hz,
                applied = self.freq_offset_hz,
                residual_std,
                "frequency estimate locked"
            );
        }
    }

    fn apply_freq_correction(&mut self, sample: IQSample) -> IQSample {
        if !self.freq_locked || self.freq_offset_hz == 0.0 {
            return sample;
        }
        let corrected = sample * Complex64::from_polar(1.0, -self.phase_correction);
        self.phase_correction = wrap_angle(
            self.phase_correction
                + 2.0 * std::f64::consts::PI * self.freq_offset_hz / self.sample_rate,
        );
        corrected
    }

    /// Drop back to carrier search after a sync loss, keeping counters.
    fn reset_acquisition(&mut self) {
        self.state = DemodState::initial();
        self.bits.clear();
        self.measured_spb = self.samples_per_bit as f64;
        self.mu = 0.0;
        self.consecutive_ambiguous = 0;
        self.freq_locked = false;
        self.freq_offset_hz = 0.0;
        self.phase_correction = 0.0;
        self.lpf_phase = 0.0;
    }

    /// Full reset to the initial state; safe to call at any point and
    /// idempotent. Statistics survive.
    pub fn reset_state(&mut self) {
        self.reset_acquisition();
        self.ambiguous_bits = 0;
    }

    /// True while the acquisition machine is past carrier tracking.
    pub fn is_synchronized(&self) -> bool {
        matches!(
            self.state,
            DemodState::BitSync { .. } | DemodState::FrameSync { .. } | DemodState::Message { .. }
        )
    }

    pub fn frames_decoded(&self) -> u64 {
        self.shared
            .lock()
            .map(|s| s.stats.frames_decoded)
            .unwrap_or(0)
    }

    pub fn sync_failures(&self) -> u64 {
        self.shared
            .lock()
            .map(|s| s.stats.sync_failures)
            .unwrap_or(0)
    }

    pub fn stats(&self) -> DemodulatorStats {
        self.shared
            .lock()
            .map(|s| s.stats.clone())
            .unwrap_or_default()
    }

    pub fn reset_statistics(&mut self) {
        if let Ok(mut shared) = self.shared.lock() {
            shared.stats = DemodulatorStats::default();
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
}

impl DemodState {
    fn initial() -> Self {
        DemodState::CarrierSearch {
            phase_history: Vec::new(),
            run_ref: None,
            consecutive: 0,
        }
    }
}

/// Outcome of a single bit decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BitDecision {
    Clean(u8),
    Ambiguous(u8),
}

/// Result of recording a bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PushOutcome {
    Ok,
    SyncLost,
}

/// Amplitude percentile of a burst; measured for diagnostics even though
/// per-burst AGC stays disabled.
fn amplitude_percentile(samples: &[IQSample], percentile: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let mut amplitudes: Vec<f64> = samples.iter().map(|s| s.norm()).collect();
    amplitudes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let idx = ((amplitudes.len() as f64 * percentile) as usize).min(amplitudes.len() - 1);
    amplitudes[idx]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{Channel, ChannelConfig, ChannelModel};
    use crate::generator::{FgbWaveformGenerator, FrameBuilder, WaveformConfig};

    fn demodulator() -> FgbDemodulator {
        FgbDemodulator::new(&ReceiverConfig::default())
    }

    fn clean_burst(bits: &[u8]) -> BurstBuffer {
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());
        BurstBuffer::new(generator.generate_with_silence(bits, 400), 0)
    }

    #[test]
    fn test_demodulates_long_frame() {
        let bits = FrameBuilder::long()
            .country_code(227)
            .protocol_code(3)
            .identification_field(0x3C6589)
            .position_quarter_deg(48.5, 2.25)
            .build();
        let mut demod = demodulator();
        let frame = demod.process_burst(&clean_burst(&bits)).expect("frame");

        assert_eq!(frame.bits.len(), 144);
        assert_eq!(frame.bits, bits);
        assert_eq!(frame.class, BurstClass::Fgb);
        assert_eq!(frame.quality.ambiguous_bits, 0);
        assert!((frame.quality.samples_per_bit - 100.0).abs() < 2.0);
        assert_eq!(demod.frames_decoded(), 1);
    }

    #[test]
    fn test_demodulates_short_frame() {
        let bits = FrameBuilder::short()
            .country_code(226)
            .user_protocol_code(1)
            .build();
        let mut demod = demodulator();
        let frame = demod.process_burst(&clean_burst(&bits)).expect("frame");

        assert_eq!(frame.bits.len(), 112);
        assert_eq!(frame.bits, bits);
    }

    #[test]
    fn test_bit_and_frame_sync_invariants() {
        let bits = FrameBuilder::long().country_code(1).protocol_code(2).build();
        let mut demod = demodulator();
        let frame = demod.process_burst(&clean_burst(&bits)).expect("frame");

        assert!(frame.bit_sync_ok());
        assert_ne!(
            frame.frame_sync_kind(),
            crate::frame::FrameSyncKind::Unknown
        );
    }

    #[test]
    fn test_frequency_offset_compensated() {
        let bits = FrameBuilder::long()
            .country_code(227)
            .protocol_code(3)
            .position_quarter_deg(10.0, 20.0)
            .build();
        let config = WaveformConfig {
            freq_offset_hz: 350.0,
            ..Default::default()
        };
        let generator = FgbWaveformGenerator::new(config);
        let burst = BurstBuffer::new(generator.generate_with_silence(&bits, 400), 0);

        let mut demod = demodulator();
        let frame = demod.process_burst(&burst).expect("frame");
        assert_eq!(frame.bits, bits);
        assert!(
            (frame.quality.freq_offset_hz - 350.0).abs() < 5.0,
            "estimated {} Hz",
            frame.quality.freq_offset_hz
        );
    }

    #[test]
    fn test_nonzero_carrier_phase() {
        let bits = FrameBuilder::short().country_code(226).user_protocol_code(3).build();
        let config = WaveformConfig {
            carrier_phase: 0.9,
            ..Default::default()
        };
        let generator = FgbWaveformGenerator::new(config);
        let burst = BurstBuffer::new(generator.generate_with_silence(&bits, 400), 0);

        let mut demod = demodulator();
        let frame = demod.process_burst(&burst).expect("frame");
        assert_eq!(frame.bits, bits);
    }

    #[test]
    fn test_decodes_through_noise() {
        let bits = FrameBuilder::long()
            .country_code(227)
            .protocol_code(3)
            .position_quarter_deg(48.5, 2.25)
            .build();
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());
        let clean = generator.generate_with_silence(&bits, 400);

        let mut channel = Channel::new(ChannelConfig {
            model: ChannelModel::Awgn,
            snr_db: 13.0,
            seed: 42,
            ..Default::default()
        });
        let noisy = channel.apply(&clean);

        let mut demod = demodulator();
        let frame = demod.process_burst(&BurstBuffer::new(noisy, 0)).expect("frame");
        assert_eq!(frame.bits, bits, "13 dB SNR should decode error-free");
    }

    #[test]
    fn test_noise_only_burst_yields_nothing() {
        let mut channel = Channel::new(ChannelConfig {
            seed: 5,
            ..Default::default()
        });
        let noise = channel.noise_floor(20_000, -10.0);
        let mut demod = demodulator();
        assert!(demod.process_burst(&BurstBuffer::new(noise, 0)).is_none());
        assert_eq!(demod.frames_decoded(), 0);
    }

    #[test]
    fn test_truncated_burst_yields_nothing() {
        let bits = FrameBuilder::long().country_code(1).protocol_code(2).build();
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());
        let mut samples = generator.generate(&bits);
        samples.truncate(9000); // carrier + a handful of bits
        let mut demod = demodulator();
        assert!(demod.process_burst(&BurstBuffer::new(samples, 0)).is_none());
    }

    #[test]
    fn test_consecutive_bursts_independent() {
        let first = FrameBuilder::long().country_code(227).protocol_code(3).build();
        let second = FrameBuilder::short().country_code(226).user_protocol_code(1).build();
        let mut demod = demodulator();

        let a = demod.process_burst(&clean_burst(&first)).expect("first");
        let b = demod.process_burst(&clean_burst(&second)).expect("second");
        assert_eq!(a.bits.len(), 144);
        assert_eq!(b.bits.len(), 112);
        assert_eq!(demod.frames_decoded(), 2);
    }

    #[test]
    fn test_reset_state_idempotent() {
        let mut demod = demodulator();
        demod.reset_state();
        let snapshot = format!("{:?}", demod.state);
        demod.reset_state();
        assert_eq!(snapshot, format!("{:?}", demod.state));
        assert!(!demod.is_synchronized());
    }

    #[test]
    fn test_statistics_reset() {
        let bits = FrameBuilder::long().country_code(1).protocol_code(2).build();
        let mut demod = demodulator();
        demod.process_burst(&clean_burst(&bits));
        assert_eq!(demod.frames_decoded(), 1);
        demod.reset_statistics();
        assert_eq!(demod.frames_decoded(), 0);
    }
}
