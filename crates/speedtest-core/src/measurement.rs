//! Request and result records exchanged with the exporter.

use std::time::Duration;

/// Timeout applied when none (or an unusable one) is configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Parameters for one CLI invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementRequest {
    /// Pin the measurement to this server. `None` lets the tool pick.
    pub server_id: Option<String>,
    pub timeout_secs: u64,
}

impl Default for MeasurementRequest {
    fn default() -> Self {
        Self {
            server_id: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl MeasurementRequest {
    pub fn new(server_id: Option<String>, timeout_secs: u64) -> Self {
        Self {
            server_id,
            timeout_secs,
        }
    }

    /// Server pin, ignoring blank values.
    pub fn pinned_server(&self) -> Option<&str> {
        self.server_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Zero is not a usable budget and falls back to the default.
    pub fn timeout(&self) -> Duration {
        let secs = if self.timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            self.timeout_secs
        };
        Duration::from_secs(secs)
    }
}

/// Normalized outcome of one measurement.
///
/// Either every field is populated (`success == true`) or the record equals
/// [`MeasurementResult::failed`]. Partial records are never constructed
/// outside this crate's decode path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeasurementResult {
    pub success: bool,
    pub jitter_ms: f64,
    pub ping_ms: f64,
    pub download_bps: f64,
    pub upload_bps: f64,
    pub server_id: String,
    pub test_uuid: String,
    pub server_name: String,
    pub server_location: String,
    pub server_country: String,
    pub isp: String,
}

impl MeasurementResult {
    /// The sentinel failure record: all zero, all empty.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Liveness value published as `speedtest_up`.
    pub fn up(&self) -> f64 {
        if self.success {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_server_pin_is_ignored() {
        let req = MeasurementRequest::new(Some("  ".into()), 30);
        assert_eq!(req.pinned_server(), None);

        let req = MeasurementRequest::new(Some(" 1234 ".into()), 30);
        assert_eq!(req.pinned_server(), Some("1234"));
    }

    #[test]
    fn zero_timeout_uses_default() {
        let req = MeasurementRequest::new(None, 0);
        assert_eq!(req.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }

    #[test]
    fn failed_record_is_down_and_empty() {
        let r = MeasurementResult::failed();
        assert!(!r.success);
        assert_eq!(r.up(), 0.0);
        assert_eq!(r.download_bps, 0.0);
        assert!(r.server_id.is_empty());
        assert!(r.isp.is_empty());
    }
}
