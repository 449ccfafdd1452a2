//! Startup and serving errors for the exporter binary.
//!
//! Measurement failures never reach this type; they are folded into the
//! failure record by `speedtest-core` and published as `speedtest_up 0`.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExporterError>;

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("io: {0}")]
    Io(String),
}
