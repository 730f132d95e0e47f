//! Core types for the 406 MHz receiver pipeline
//!
//! Defines the complex-baseband sample representation shared by every stage
//! and the crate-wide error type.
//!
//! ## Understanding I/Q Samples
//!
//! The receiver consumes complex baseband: each sample carries an in-phase
//! (real) and quadrature (imaginary) component, so both amplitude and phase
//! of the 406 MHz carrier survive down-conversion. Biphase-L demodulation
//! works almost entirely on the phase angle of these samples.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// A single complex-baseband I/Q sample.
pub type IQSample = Complex64;

/// A buffer of I/Q samples.
pub type IQBuffer = Vec<IQSample>;

/// Beacon generation a burst was classified as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BurstClass {
    /// First-generation beacon: biphase-L (Manchester) BPSK, ~360/520 ms burst.
    Fgb,
    /// Second-generation beacon: OQPSK-DSSS, ~960 ms burst.
    Sgb,
}

impl std::fmt::Display for BurstClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BurstClass::Fgb => write!(f, "1G"),
            BurstClass::Sgb => write!(f, "2G"),
        }
    }
}

/// Length class of a demodulated frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameKind {
    /// 112-bit first-generation frame (PDF-1 only).
    Short,
    /// 144-bit first-generation frame (PDF-1 + PDF-2).
    Long,
    /// Second-generation 250-bit message.
    Sgb,
}

impl FrameKind {
    /// Total frame length in bits.
    pub fn bits(&self) -> usize {
        match self {
            FrameKind::Short => 112,
            FrameKind::Long => 144,
            FrameKind::Sgb => 250,
        }
    }
}

/// Result type for receiver operations.
pub type SarsatResult<T> = Result<T, SarsatError>;

/// Errors surfaced by the receiver core.
///
/// Data-quality problems (short bursts, lost sync, failed CRCs) are *not*
/// errors: the pipeline logs them, updates counters and keeps running.
/// These variants cover contract violations reported to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SarsatError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("malformed frame: {actual} bits (expected 112 or 144)")]
    MalformedFrame { actual: usize },
}
