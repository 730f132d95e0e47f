//! Structured Logging
//!
//! Tracing-subscriber bootstrap for binaries and tests. Stage debug events
//! (`tracing::debug!`) are gated by each stage's `debug_mode` flag and
//! filtered here via `RUST_LOG`, e.g.:
//!
//! ```text
//! RUST_LOG=sarsat406_core=debug
//! RUST_LOG=sarsat406_core::fgb_demodulator=trace
//! ```

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, one event per line.
    Compact,
    /// Machine-readable JSON events.
    Json,
}

impl Default for LogFormat {
    fn default() -> Self {
        LogFormat::Compact
    }
}

/// Initialize the global subscriber. `RUST_LOG` overrides `default_filter`.
/// Later calls are no-ops, so tests can call this freely.
pub fn init_logging(format: LogFormat, default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let result = match format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}
