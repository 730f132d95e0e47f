//! Receiver Configuration
//!
//! One configuration struct drives every stage of the pipeline so that the
//! detector, router and demodulator always agree on sample-accurate framing.
//! All derived sizes (samples per bit, calibration window, silence limit)
//! come from here rather than being recomputed ad hoc in each stage.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::config::ReceiverConfig;
//!
//! let config = ReceiverConfig {
//!     sample_rate: 40_000.0,
//!     ..Default::default()
//! };
//! assert_eq!(config.samples_per_bit(), 100);
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};

use crate::types::{SarsatError, SarsatResult};

/// First-generation beacon bit rate in bits per second.
pub const BIT_RATE: f64 = 400.0;

/// Duration of the unmodulated carrier preamble in seconds.
pub const CARRIER_DURATION: f64 = 0.160;

/// Duration of the detector calibration window in seconds.
pub const CALIBRATION_DURATION: f64 = 0.5;

/// Feature signal the burst detector thresholds against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorFeature {
    /// Raw sample magnitude.
    Amplitude,
    /// Magnitude of a sliding one-bit-period autocorrelation. More selective
    /// against impulsive interference; the default.
    Autocorrelation,
}

impl Default for DetectorFeature {
    fn default() -> Self {
        DetectorFeature::Autocorrelation
    }
}

/// Configuration shared by all pipeline stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    /// Input sample rate in Hz.
    pub sample_rate: f64,
    /// Reserved storage for the detector's history buffer, in milliseconds.
    pub buffer_duration_ms: u32,
    /// Multiplier applied to the calibration maximum to set the trigger level.
    pub threshold_factor: f64,
    /// Bursts shorter than this are discarded, in milliseconds.
    pub min_burst_duration_ms: u32,
    /// Silence run that closes a burst, in milliseconds. 10 ms suits FGB-only
    /// operation; 50 ms keeps SGB chip-rate dips from splitting a burst.
    pub silence_duration_ms: u32,
    /// FGB/SGB classification boundary in samples.
    pub size_threshold_samples: usize,
    /// Detector feature signal.
    pub detector_feature: DetectorFeature,
    /// Enable verbose per-stage debug events.
    pub debug_mode: bool,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40_000.0,
            buffer_duration_ms: 1200,
            threshold_factor: 0.3,
            min_burst_duration_ms: 300,
            silence_duration_ms: 10,
            size_threshold_samples: 25_000,
            detector_feature: DetectorFeature::default(),
            debug_mode: false,
        }
    }
}

impl ReceiverConfig {
    /// Nominal samples per 400 bps bit.
    pub fn samples_per_bit(&self) -> usize {
        (self.sample_rate / BIT_RATE) as usize
    }

    /// Length of the unmodulated carrier preamble in samples.
    pub fn carrier_samples(&self) -> usize {
        (CARRIER_DURATION * self.sample_rate) as usize
    }

    /// Detector calibration window in samples.
    pub fn calibration_samples(&self) -> usize {
        (CALIBRATION_DURATION * self.sample_rate) as usize
    }

    /// Minimum burst length in samples.
    pub fn min_burst_samples(&self) -> usize {
        (self.sample_rate * self.min_burst_duration_ms as f64 / 1000.0) as usize
    }

    /// Silence run that closes a burst, in samples.
    pub fn silence_limit_samples(&self) -> usize {
        (self.sample_rate * self.silence_duration_ms as f64 / 1000.0) as usize
    }

    /// Detector history reservation in samples.
    pub fn buffer_samples(&self) -> usize {
        (self.sample_rate * self.buffer_duration_ms as f64 / 1000.0) as usize
    }

    /// Check that the configuration is usable.
    pub fn validate(&self) -> SarsatResult<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(SarsatError::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.samples_per_bit() < 4 {
            return Err(SarsatError::InvalidConfig(format!(
                "sample_rate {} Hz gives {} samples/bit; need at least 4",
                self.sample_rate,
                self.samples_per_bit()
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold_factor) {
            return Err(SarsatError::InvalidConfig(format!(
                "threshold_factor must be in [0, 1], got {}",
                self.threshold_factor
            )));
        }
        if self.silence_duration_ms == 0 {
            return Err(SarsatError::InvalidConfig(
                "silence_duration_ms must be nonzero".into(),
            ));
        }
        if self.size_threshold_samples == 0 {
            return Err(SarsatError::InvalidConfig(
                "size_threshold_samples must be nonzero".into(),
            ));
        }
        Ok(())
    }
}
