//! Reference Frame Builder and Waveform Generator
//!
//! Test-signal source for the receiver: [`FrameBuilder`] assembles valid
//! T.001 bit frames (bit sync, frame sync, PDF fields, both cyclic check
//! fields), and [`FgbWaveformGenerator`] renders a frame as the transmitted
//! burst: 160 ms of unmodulated carrier followed by biphase-L at 400 bps,
//! phase states ±1.1 rad, with optional carrier frequency offset.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::generator::{FrameBuilder, FgbWaveformGenerator, WaveformConfig};
//!
//! let bits = FrameBuilder::long()
//!     .country_code(227)
//!     .protocol_code(3)
//!     .identification_field(0x3C6589)
//!     .position_quarter_deg(48.5, 2.25)
//!     .build();
//! assert_eq!(bits.len(), 144);
//!
//! let generator = FgbWaveformGenerator::new(WaveformConfig::default());
//! let samples = generator.generate(&bits);
//! // 160 ms carrier + 144 bits at 400 bps, 40 kHz
//! assert_eq!(samples.len(), 6400 + 144 * 100);
//! ```

use num_complex::Complex64;

use crate::config::{BIT_RATE, CARRIER_DURATION};
use crate::crc::{PDF1, PDF2};
use crate::frame::{
    BIT_SYNC_BITS, FRAME_SYNC_BITS, FRAME_SYNC_NORMAL, FRAME_SYNC_SELF_TEST,
};
use crate::types::IQSample;

/// Biphase-L phase deviation in radians.
pub const MOD_PHASE: f64 = 1.1;

// ============================================================================
// Frame builder
// ============================================================================

/// Builder for valid T.001 first-generation frames.
///
/// Starts from an all-zero payload with correct bit-sync and frame-sync
/// fields; setters fill the protocol fields, and [`FrameBuilder::build`]
/// computes the PDF-1 (and, for long frames, PDF-2) check bits last.
#[derive(Debug, Clone)]
pub struct FrameBuilder {
    bits: Vec<u8>,
    long: bool,
    self_test: bool,
}

impl FrameBuilder {
    /// A 144-bit location-protocol frame (P flag 0).
    pub fn long() -> Self {
        Self {
            bits: vec![0u8; 144],
            long: true,
            self_test: false,
        }
    }

    /// A 112-bit user-protocol frame (P flag 1).
    pub fn short() -> Self {
        let mut builder = Self {
            bits: vec![0u8; 112],
            long: false,
            self_test: false,
        };
        builder.bits[25] = 1;
        builder
    }

    /// Use the self-test frame sync pattern instead of the normal one.
    pub fn self_test(mut self, enable: bool) -> Self {
        self.self_test = enable;
        self
    }

    /// Set the protocol flag (bit 26) explicitly.
    pub fn protocol_flag(mut self, flag: u8) -> Self {
        self.bits[25] = flag & 1;
        self
    }

    /// 10-bit country code (bits 27-36).
    pub fn country_code(mut self, mid: u16) -> Self {
        self.set_field(26, 10, mid as u32);
        self
    }

    /// 4-bit location protocol code (bits 37-40), long frames.
    pub fn protocol_code(mut self, code: u8) -> Self {
        self.set_field(36, 4, code as u32);
        self
    }

    /// 3-bit user protocol code (bits 37-39), short frames.
    pub fn user_protocol_code(mut self, code: u8) -> Self {
        self.set_field(36, 3, code as u32);
        self
    }

    /// 24-bit identification field of the standard location protocols
    /// (bits 41-64).
    pub fn identification_field(mut self, value: u32) -> Self {
        self.set_field(40, 24, value);
        self
    }

    /// Standard-location base position in quarter-degree increments
    /// (bits 65-85), with PDF-2 fixed bits and zeroed positive offsets for
    /// long frames.
    pub fn position_quarter_deg(mut self, lat: f64, lon: f64) -> Self {
        self.bits[64] = (lat < 0.0) as u8;
        self.set_field(65, 9, (lat.abs() / 0.25).round() as u32);
        self.bits[74] = (lon < 0.0) as u8;
        self.set_field(75, 10, (lon.abs() / 0.25).round() as u32);
        if self.long {
            self.set_field(106, 4, 0b1101);
            self.bits[112] = 1; // positive, zero-magnitude offsets
            self.bits[122] = 1;
        }
        self
    }

    /// Standard-location PDF-2 offsets: signed minutes/seconds per axis.
    /// Seconds are stored in 4-second increments.
    pub fn standard_offsets(
        mut self,
        lat_sign: i8,
        lat_min: u8,
        lat_sec: u8,
        lon_sign: i8,
        lon_min: u8,
        lon_sec: u8,
    ) -> Self {
        self.bits[112] = (lat_sign >= 0) as u8;
        self.set_field(113, 5, lat_min as u32);
        self.set_field(118, 4, (lat_sec / 4) as u32);
        self.bits[122] = (lon_sign >= 0) as u8;
        self.set_field(123, 5, lon_min as u32);
        self.set_field(128, 4, (lon_sec / 4) as u32);
        self
    }

    /// ELT-DT base position in half-degree increments (bits 67-85).
    pub fn position_half_deg(mut self, lat: f64, lon: f64) -> Self {
        self.bits[66] = (lat < 0.0) as u8;
        self.set_field(67, 8, (lat.abs() / 0.5).round() as u32);
        self.bits[75] = (lon < 0.0) as u8;
        self.set_field(76, 9, (lon.abs() / 0.5).round() as u32);
        self
    }

    /// ELT-DT PDF-2: location freshness plus signed offsets (seconds in
    /// 4-second increments).
    pub fn elt_dt_offsets(
        mut self,
        freshness: u8,
        lat_sign: i8,
        lat_min: u8,
        lat_sec: u8,
        lon_sign: i8,
        lon_min: u8,
        lon_sec: u8,
    ) -> Self {
        self.set_field(112, 2, freshness as u32);
        self.bits[114] = (lat_sign >= 0) as u8;
        self.set_field(115, 4, lat_min as u32);
        self.set_field(119, 4, (lat_sec / 4) as u32);
        self.bits[123] = (lon_sign >= 0) as u8;
        self.set_field(124, 4, lon_min as u32);
        self.set_field(128, 4, (lon_sec / 4) as u32);
        self
    }

    /// Write an arbitrary MSB-first field; escape hatch for protocol tests.
    pub fn raw_field(mut self, start: usize, len: usize, value: u32) -> Self {
        self.set_field(start, len, value);
        self
    }

    fn set_field(&mut self, start: usize, len: usize, value: u32) {
        for i in 0..len {
            self.bits[start + i] = ((value >> (len - 1 - i)) & 1) as u8;
        }
    }

    /// Finalize: bit sync, frame sync, then the check fields.
    pub fn build(mut self) -> Vec<u8> {
        for bit in &mut self.bits[..BIT_SYNC_BITS] {
            *bit = 1;
        }
        let pattern = if self.self_test {
            FRAME_SYNC_SELF_TEST
        } else {
            FRAME_SYNC_NORMAL
        };
        for i in 0..FRAME_SYNC_BITS {
            self.bits[BIT_SYNC_BITS + i] =
                ((pattern >> (FRAME_SYNC_BITS - 1 - i)) & 1) as u8;
        }

        // A long frame never transmits an empty PDF-2; backfill the fixed
        // bits if no setter touched the region, so the check field cannot
        // degenerate to all zeros.
        if self.long && self.bits[106..132].iter().all(|&b| b == 0) {
            self.set_field(106, 4, 0b1101);
        }

        PDF1.encode(&mut self.bits);
        if self.long {
            PDF2.encode(&mut self.bits);
        }
        self.bits
    }
}

// ============================================================================
// Waveform generator
// ============================================================================

/// Waveform synthesis parameters.
#[derive(Debug, Clone)]
pub struct WaveformConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Carrier amplitude.
    pub amplitude: f64,
    /// Carrier frequency offset in Hz (simulates oscillator error).
    pub freq_offset_hz: f64,
    /// Static carrier phase in radians.
    pub carrier_phase: f64,
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            sample_rate: 40_000.0,
            amplitude: 0.5,
            freq_offset_hz: 0.0,
            carrier_phase: 0.0,
        }
    }
}

/// Renders bit frames as first-generation beacon bursts.
#[derive(Debug, Clone)]
pub struct FgbWaveformGenerator {
    config: WaveformConfig,
}

impl FgbWaveformGenerator {
    pub fn new(config: WaveformConfig) -> Self {
        Self { config }
    }

    /// Samples per 400 bps bit at the configured rate.
    pub fn samples_per_bit(&self) -> usize {
        (self.config.sample_rate / BIT_RATE) as usize
    }

    /// Render one burst: 160 ms unmodulated carrier, then each bit as two
    /// half-bit phase plateaus (`'1'`: +1.1 → −1.1 rad, `'0'`: −1.1 → +1.1).
    pub fn generate(&self, bits: &[u8]) -> Vec<IQSample> {
        let carrier_samples = (CARRIER_DURATION * self.config.sample_rate) as usize;
        let spb = self.samples_per_bit();
        let half = spb / 2;
        let mut phases = Vec::with_capacity(carrier_samples + bits.len() * spb);

        phases.extend(std::iter::repeat(0.0).take(carrier_samples));
        for &bit in bits {
            let (first, second) = if bit == 1 {
                (MOD_PHASE, -MOD_PHASE)
            } else {
                (-MOD_PHASE, MOD_PHASE)
            };
            phases.extend(std::iter::repeat(first).take(half));
            phases.extend(std::iter::repeat(second).take(spb - half));
        }

        let omega = 2.0 * std::f64::consts::PI * self.config.freq_offset_hz
            / self.config.sample_rate;
        phases
            .iter()
            .enumerate()
            .map(|(n, &phase)| {
                Complex64::from_polar(
                    self.config.amplitude,
                    self.config.carrier_phase + phase + omega * n as f64,
                )
            })
            .collect()
    }

    /// Render a burst followed by `silence_samples` of dead air, ready to be
    /// spliced into a longer capture.
    pub fn generate_with_silence(&self, bits: &[u8], silence_samples: usize) -> Vec<IQSample> {
        let mut samples = self.generate(bits);
        samples.extend(std::iter::repeat(Complex64::new(0.0, 0.0)).take(silence_samples));
        samples
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::{PDF1, PDF2};
    use crate::frame::bit_field;

    #[test]
    fn test_builder_sync_fields() {
        let bits = FrameBuilder::long().build();
        assert_eq!(bits.len(), 144);
        assert!(bits[..15].iter().all(|&b| b == 1));
        assert_eq!(bit_field(&bits, 15, 9) as u16, FRAME_SYNC_NORMAL);

        let bits = FrameBuilder::long().self_test(true).build();
        assert_eq!(bit_field(&bits, 15, 9) as u16, FRAME_SYNC_SELF_TEST);
    }

    #[test]
    fn test_builder_checks_pass() {
        let bits = FrameBuilder::long()
            .country_code(227)
            .protocol_code(9)
            .position_half_deg(45.0, -1.5)
            .elt_dt_offsets(3, 1, 3, 20, -1, 2, 40)
            .build();
        assert!(PDF1.check(&bits));
        assert!(PDF2.check(&bits));

        let bits = FrameBuilder::short().country_code(226).user_protocol_code(1).build();
        assert_eq!(bits.len(), 112);
        assert!(PDF1.check(&bits));
    }

    #[test]
    fn test_builder_field_placement() {
        let bits = FrameBuilder::long()
            .country_code(0x3FF)
            .protocol_code(0xF)
            .build();
        assert_eq!(bit_field(&bits, 26, 10), 0x3FF);
        assert_eq!(bit_field(&bits, 36, 4), 0xF);
        assert_eq!(bits[25], 0, "long frames default to P=0");
    }

    #[test]
    fn test_waveform_structure() {
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());
        let bits = FrameBuilder::short().country_code(1).user_protocol_code(1).build();
        let samples = generator.generate(&bits);
        assert_eq!(samples.len(), 6400 + 112 * 100);

        // Carrier at phase 0, constant amplitude.
        for s in &samples[..6400] {
            assert!(s.arg().abs() < 1e-9);
            assert!((s.norm() - 0.5).abs() < 1e-9);
        }
        // First bit-sync bit is '1': +1.1 then -1.1 rad.
        assert!((samples[6400 + 25].arg() - MOD_PHASE).abs() < 1e-9);
        assert!((samples[6400 + 75].arg() + MOD_PHASE).abs() < 1e-9);
    }

    #[test]
    fn test_waveform_freq_offset_rotates() {
        let config = WaveformConfig {
            freq_offset_hz: 100.0,
            ..Default::default()
        };
        let generator = FgbWaveformGenerator::new(config);
        let bits = FrameBuilder::short().country_code(1).user_protocol_code(1).build();
        let samples = generator.generate(&bits);

        // 100 Hz at 40 kHz: phase advances 2π/400 per sample during carrier.
        let step = crate::phase_ops::phase_diff(samples[10].arg(), samples[11].arg());
        assert!((step - 2.0 * std::f64::consts::PI / 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_padding() {
        let generator = FgbWaveformGenerator::new(WaveformConfig::default());
        let bits = FrameBuilder::short().country_code(1).user_protocol_code(1).build();
        let samples = generator.generate_with_silence(&bits, 400);
        assert_eq!(samples.len(), 6400 + 11_200 + 400);
        assert!(samples[samples.len() - 1].norm() < 1e-12);
    }
}
