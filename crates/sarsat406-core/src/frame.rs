//! Demodulated Frames
//!
//! Container for the bit frame produced by a demodulator, plus the helpers
//! the decoder leans on: T.001 bit-field extraction and the bit-sync /
//! frame-sync validation rules.
//!
//! T.001 numbers bits from 1; code indexes from 0. All `bit_field` calls in
//! this crate take the 0-based index, so "bits 27..36" in the documentation
//! reads as `bit_field(bits, 26, 10)` in code.

use serde::{Deserialize, Serialize};

use crate::types::{BurstClass, FrameKind, SarsatError, SarsatResult};

/// Number of leading '1' bit-sync bits.
pub const BIT_SYNC_BITS: usize = 15;

/// Number of frame-sync bits following bit sync.
pub const FRAME_SYNC_BITS: usize = 9;

/// Frame sync pattern for a normal-mode message.
pub const FRAME_SYNC_NORMAL: u16 = 0b000101111;

/// Frame sync pattern for a self-test message.
pub const FRAME_SYNC_SELF_TEST: u16 = 0b011010000;

/// Self-test variant seen in the field; accepted with a warning.
pub const FRAME_SYNC_SELF_TEST_ALT: u16 = 0b001010010;

/// National-use frame sync pattern.
pub const FRAME_SYNC_NATIONAL: u16 = 0b110101000;

/// Interpretation of the 9-bit frame-sync field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameSyncKind {
    Normal,
    SelfTest,
    National,
    Unknown,
}

impl FrameSyncKind {
    pub fn from_pattern(pattern: u16) -> Self {
        match pattern {
            FRAME_SYNC_NORMAL => FrameSyncKind::Normal,
            FRAME_SYNC_SELF_TEST | FRAME_SYNC_SELF_TEST_ALT => FrameSyncKind::SelfTest,
            FRAME_SYNC_NATIONAL => FrameSyncKind::National,
            _ => FrameSyncKind::Unknown,
        }
    }
}

/// Demodulation quality summary attached to each frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameQuality {
    /// Samples per bit actually measured during bit sync.
    pub samples_per_bit: f64,
    /// Estimated carrier frequency offset in Hz.
    pub freq_offset_hz: f64,
    /// Bits whose Manchester transition was ambiguous (resolved by sign).
    pub ambiguous_bits: u32,
}

/// An ordered bit frame (values 0/1) with provenance and quality.
#[derive(Debug, Clone, PartialEq)]
pub struct DemodulatedFrame {
    pub bits: Vec<u8>,
    pub class: BurstClass,
    pub quality: FrameQuality,
}

impl DemodulatedFrame {
    /// Frame kind from the bit count; lengths other than 112/144 (or an SGB
    /// class tag) are a contract violation.
    pub fn kind(&self) -> SarsatResult<FrameKind> {
        if self.class == BurstClass::Sgb {
            return Ok(FrameKind::Sgb);
        }
        match self.bits.len() {
            112 => Ok(FrameKind::Short),
            144 => Ok(FrameKind::Long),
            actual => Err(SarsatError::MalformedFrame { actual }),
        }
    }

    /// True when bits 1..15 are all '1'.
    pub fn bit_sync_ok(&self) -> bool {
        self.bits.len() >= BIT_SYNC_BITS && self.bits[..BIT_SYNC_BITS].iter().all(|&b| b == 1)
    }

    /// The 9-bit frame sync field.
    pub fn frame_sync_pattern(&self) -> u16 {
        bit_field(&self.bits, BIT_SYNC_BITS, FRAME_SYNC_BITS) as u16
    }

    pub fn frame_sync_kind(&self) -> FrameSyncKind {
        FrameSyncKind::from_pattern(self.frame_sync_pattern())
    }
}

/// Read `len` bits starting at 0-based index `start`, MSB first.
pub fn bit_field(bits: &[u8], start: usize, len: usize) -> u32 {
    debug_assert!(len <= 32);
    let mut value = 0u32;
    for &bit in bits.iter().skip(start).take(len) {
        value = (value << 1) | (bit & 1) as u32;
    }
    value
}

/// Uppercase hex of bits 25..end (the PDF payload), nibble-aligned MSB first.
pub fn hex_id(bits: &[u8]) -> String {
    let payload = &bits[24.min(bits.len())..];
    let mut hex = String::with_capacity(payload.len().div_ceil(4));
    for chunk in payload.chunks(4) {
        let mut nibble = 0u8;
        for (i, &bit) in chunk.iter().enumerate() {
            nibble |= (bit & 1) << (3 - i);
        }
        hex.push(char::from_digit(nibble as u32, 16).unwrap_or('0').to_ascii_uppercase());
    }
    hex
}
