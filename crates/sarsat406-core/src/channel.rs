//! Channel Impairment Model
//!
//! Simulates the propagation impairments the receiver must survive: additive
//! white Gaussian noise at a target SNR and carrier frequency offset. Used by
//! the test suite to grade the pipeline against noisy captures; real I/Q
//! recordings bypass this module entirely.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::channel::{Channel, ChannelConfig, ChannelModel};
//! use num_complex::Complex64;
//!
//! let config = ChannelConfig {
//!     model: ChannelModel::Awgn,
//!     snr_db: 10.0,
//!     ..Default::default()
//! };
//! let mut channel = Channel::new(config);
//! let clean = vec![Complex64::new(0.5, 0.0); 1000];
//! let noisy = channel.apply(&clean);
//! assert_eq!(noisy.len(), 1000);
//! ```

use num_complex::Complex64;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::types::IQSample;

/// Channel model type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelModel {
    /// Perfect channel (no impairments).
    Ideal,
    /// Additive white Gaussian noise only.
    Awgn,
    /// AWGN plus carrier frequency offset.
    AwgnWithCfo,
}

impl Default for ChannelModel {
    fn default() -> Self {
        Self::Awgn
    }
}

/// Channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub model: ChannelModel,
    /// Target SNR in dB, referenced to the non-silent part of the input.
    pub snr_db: f64,
    /// Carrier frequency offset in Hz.
    pub cfo_hz: f64,
    /// Sample rate (for the CFO rotation).
    pub sample_rate: f64,
    /// RNG seed, so impaired captures are reproducible.
    pub seed: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            model: ChannelModel::Awgn,
            snr_db: 20.0,
            cfo_hz: 0.0,
            sample_rate: 40_000.0,
            seed: 1,
        }
    }
}

/// Stateful channel simulator.
#[derive(Debug)]
pub struct Channel {
    config: ChannelConfig,
    rng: StdRng,
    cfo_phase: f64,
}

impl Channel {
    pub fn new(config: ChannelConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            cfo_phase: 0.0,
        }
    }

    /// Pass samples through the channel.
    ///
    /// The SNR reference is the mean power of the burst content (samples more
    /// than 60 dB above zero), so the silence between spliced bursts does not
    /// dilute the noise calibration.
    pub fn apply(&mut self, input: &[IQSample]) -> Vec<IQSample> {
        let mut output = input.to_vec();

        if self.config.model == ChannelModel::AwgnWithCfo && self.config.cfo_hz != 0.0 {
            let omega =
                2.0 * std::f64::consts::PI * self.config.cfo_hz / self.config.sample_rate;
            for s in output.iter_mut() {
                *s *= Complex64::from_polar(1.0, self.cfo_phase);
                self.cfo_phase = (self.cfo_phase + omega) % (2.0 * std::f64::consts::PI);
            }
        }

        if self.config.model != ChannelModel::Ideal {
            let signal_power = active_power(&output);
            if signal_power > 0.0 {
                let noise_power = signal_power / 10f64.powf(self.config.snr_db / 10.0);
                self.add_noise(&mut output, noise_power);
            }
        }

        output
    }

    /// Generate a bare noise floor at the given power in dBFS; the
    /// empty-stream scenarios feed this straight into the detector.
    pub fn noise_floor(&mut self, len: usize, power_dbfs: f64) -> Vec<IQSample> {
        let mut output = vec![Complex64::new(0.0, 0.0); len];
        self.add_noise(&mut output, 10f64.powf(power_dbfs / 10.0));
        output
    }

    fn add_noise(&mut self, samples: &mut [IQSample], noise_power: f64) {
        let sigma = (noise_power / 2.0).sqrt();
        let Ok(normal) = Normal::new(0.0, sigma) else {
            return;
        };
        for s in samples.iter_mut() {
            *s += Complex64::new(normal.sample(&mut self.rng), normal.sample(&mut self.rng));
        }
    }
}

/// Mean power of the samples that actually carry signal.
fn active_power(samples: &[IQSample]) -> f64 {
    let mut sum = 0.0;
    let mut count = 0usize;
    for s in samples {
        let p = s.norm_sqr();
        if p > 1e-6 {
            sum += p;
            count += 1;
        }
    }
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}
