//! Measurement failure taxonomy.

use std::time::Duration;

use thiserror::Error;

/// Stable failure codes, used as a structured log field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Process exited non-zero or could not be started.
    ProcessFailed,
    /// Wall-clock budget exceeded; the process was killed.
    TimedOut,
    /// Output was empty or not JSON.
    MalformedOutput,
    /// The tool reported its own error.
    ToolReportedError,
    /// The frame was not a result frame.
    UnexpectedShape,
    /// A required result field was missing or mistyped.
    FieldExtractionError,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::ProcessFailed => "PROCESS_FAILED",
            ErrorKind::TimedOut => "TIMED_OUT",
            ErrorKind::MalformedOutput => "MALFORMED_OUTPUT",
            ErrorKind::ToolReportedError => "TOOL_REPORTED_ERROR",
            ErrorKind::UnexpectedShape => "UNEXPECTED_SHAPE",
            ErrorKind::FieldExtractionError => "FIELD_EXTRACTION_ERROR",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, MeasurementError>;

/// Everything that can go wrong between spawning the CLI and holding a
/// complete result.
#[derive(Debug, Error)]
pub enum MeasurementError {
    #[error("speedtest CLI error: {0}")]
    ProcessFailed(String),
    #[error("speedtest CLI process timeout after {}s", .0.as_secs())]
    TimedOut(Duration),
    #[error("malformed speedtest output: {0}")]
    MalformedOutput(String),
    #[error("speedtest error: {0}")]
    ToolReportedError(String),
    #[error("not a result frame (type={0})")]
    UnexpectedShape(String),
    #[error("error parsing speedtest result: {0}")]
    FieldExtractionError(String),
}

impl MeasurementError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            MeasurementError::ProcessFailed(_) => ErrorKind::ProcessFailed,
            MeasurementError::TimedOut(_) => ErrorKind::TimedOut,
            MeasurementError::MalformedOutput(_) => ErrorKind::MalformedOutput,
            MeasurementError::ToolReportedError(_) => ErrorKind::ToolReportedError,
            MeasurementError::UnexpectedShape(_) => ErrorKind::UnexpectedShape,
            MeasurementError::FieldExtractionError(_) => ErrorKind::FieldExtractionError,
        }
    }
}
