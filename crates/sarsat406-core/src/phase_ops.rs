//! Phase Angle Utilities
//!
//! Small helpers shared by the router and demodulator for working with
//! sample phase angles: wrapping to (-π, π], wrapped differences, and the
//! mean/std-dev statistics used for carrier discrimination.
//!
//! ## Example
//!
//! ```rust
//! use sarsat406_core::phase_ops::{wrap_angle, phase_diff};
//! use std::f64::consts::PI;
//!
//! assert!((wrap_angle(3.0 * PI) - PI).abs() < 1e-12);
//! // +1.1 → -1.1 rad is a -2.2 rad transition, not +4.08
//! assert!((phase_diff(1.1, -1.1) + 2.2).abs() < 1e-12);
//! ```

use std::f64::consts::PI;

const TWO_PI: f64 = 2.0 * PI;

/// Wrap a single angle to (-π, π].
#[inline]
pub fn wrap_angle(x: f64) -> f64 {
    let mut y = x % TWO_PI;
    if y > PI {
        y -= TWO_PI;
    } else if y < -PI {
        y += TWO_PI;
    }
    y
}

/// Wrapped difference `to - from`, in (-π, π].
#[inline]
pub fn phase_diff(from: f64, to: f64) -> f64 {
    wrap_angle(to - from)
}

/// Mean and standard deviation of the wrapped sample-to-sample phase
/// differences of a phase sequence.
///
/// An unmodulated carrier produces a small std-dev (the differences are a
/// constant frequency term plus noise); BPSK transitions blow it up.
pub fn phase_diff_stats(phases: &[f64]) -> (f64, f64) {
    if phases.len() < 2 {
        return (0.0, 0.0);
    }
    let n = (phases.len() - 1) as f64;
    let mut sum = 0.0;
    let mut sq_sum = 0.0;
    for pair in phases.windows(2) {
        let d = phase_diff(pair[0], pair[1]);
        sum += d;
        sq_sum += d * d;
    }
    let mean = sum / n;
    let var = (sq_sum / n - mean * mean).max(0.0);
    (mean, var.sqrt())
}
