//! Result normalizer: raw CLI stdout -> [`MeasurementResult`].
//!
//! Decoding runs in stages so each failure is classified precisely:
//! emptiness, JSON syntax, the tool's own `error` report, the frame `type`,
//! and finally a typed decode of the fields we publish. Only the last stage
//! uses serde structs; the earlier ones inspect a `serde_json::Value` so that
//! error and progress frames (which lack the result fields) are recognized
//! before a schema mismatch could mask them.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::{MeasurementError, Result};
use crate::measurement::MeasurementResult;
use crate::units::bytes_to_bits;

/// Frame type carrying a completed measurement.
const RESULT_FRAME: &str = "result";

#[derive(Debug, Deserialize)]
struct ResultFrame {
    ping: Ping,
    download: Transfer,
    upload: Transfer,
    server: Server,
    isp: String,
    result: TestRef,
}

#[derive(Debug, Deserialize)]
struct Ping {
    jitter: f64,
    latency: f64,
}

#[derive(Debug, Deserialize)]
struct Transfer {
    /// Bytes per second.
    bandwidth: f64,
}

#[derive(Debug, Deserialize)]
struct Server {
    id: ServerId,
    name: String,
    location: String,
    country: String,
}

/// The CLI emits an integer; a numeric string is tolerated.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ServerId {
    Number(u64),
    Text(String),
}

impl ServerId {
    fn into_string(self) -> String {
        match self {
            ServerId::Number(n) => n.to_string(),
            ServerId::Text(s) => s,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TestRef {
    id: String,
}

impl ResultFrame {
    fn into_result(self) -> Result<MeasurementResult> {
        let jitter_ms = non_negative("ping.jitter", self.ping.jitter)?;
        let ping_ms = non_negative("ping.latency", self.ping.latency)?;
        let download = non_negative("download.bandwidth", self.download.bandwidth)?;
        let upload = non_negative("upload.bandwidth", self.upload.bandwidth)?;

        Ok(MeasurementResult {
            success: true,
            jitter_ms,
            ping_ms,
            download_bps: bytes_to_bits(download),
            upload_bps: bytes_to_bits(upload),
            server_id: self.server.id.into_string(),
            test_uuid: self.result.id,
            server_name: self.server.name,
            server_location: self.server.location,
            server_country: self.server.country,
            isp: self.isp,
        })
    }
}

fn non_negative(key: &str, v: f64) -> Result<f64> {
    if v.is_finite() && v >= 0.0 {
        Ok(v)
    } else {
        Err(MeasurementError::FieldExtractionError(format!(
            "{key} must be a non-negative number, got {v}"
        )))
    }
}

/// Normalize raw CLI output. Never fails: any error is logged here and
/// replaced by [`MeasurementResult::failed`].
pub fn normalize(raw: &[u8]) -> MeasurementResult {
    match decode(raw) {
        Ok(result) => result,
        Err(MeasurementError::UnexpectedShape(frame)) => {
            // Progress/log frames are expected in streaming mode.
            debug!(frame = %frame, "speedtest output is not a result frame");
            MeasurementResult::failed()
        }
        Err(e) => {
            error!(kind = e.kind().as_str(), "{e}");
            MeasurementResult::failed()
        }
    }
}

/// Strict decode used by [`normalize`]; exposed so callers can inspect the
/// classified error.
pub fn decode(raw: &[u8]) -> Result<MeasurementResult> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Err(MeasurementError::MalformedOutput("empty output".into()));
    }

    let doc: Value = serde_json::from_slice(raw)
        .map_err(|e| MeasurementError::MalformedOutput(e.to_string()))?;

    if let Some(reported) = doc.get("error") {
        let msg = match reported {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        return Err(MeasurementError::ToolReportedError(msg));
    }

    match doc.get("type") {
        Some(Value::String(t)) if t == RESULT_FRAME => {}
        Some(Value::String(t)) => return Err(MeasurementError::UnexpectedShape(t.clone())),
        Some(other) => return Err(MeasurementError::UnexpectedShape(other.to_string())),
        None => return Err(MeasurementError::UnexpectedShape("<missing>".into())),
    }

    let frame: ResultFrame = serde_json::from_value(doc)
        .map_err(|e| MeasurementError::FieldExtractionError(e.to_string()))?;
    frame.into_result()
}
