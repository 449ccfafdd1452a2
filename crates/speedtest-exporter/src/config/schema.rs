use std::net::SocketAddr;

use serde::Deserialize;
use speedtest_core::runner::DEFAULT_PROGRAM;
use speedtest_core::{MeasurementRequest, DEFAULT_TIMEOUT_SECS};

use crate::error::{ExporterError, Result};
use crate::obs::metrics::MetricSchema;

/// Upper bound for `speedtest.timeout_secs`.
pub const MAX_TIMEOUT_SECS: u64 = 3600;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    pub version: u32,

    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub speedtest: SpeedtestSection,

    #[serde(default)]
    pub metrics: MetricsSection,
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            version: 1,
            server: ServerSection::default(),
            speedtest: SpeedtestSection::default(),
            metrics: MetricsSection::default(),
        }
    }
}

impl ExporterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(ExporterError::Config(format!(
                "unsupported config version {}",
                self.version
            )));
        }
        self.server.validate()?;
        self.speedtest.validate()?;
        Ok(())
    }

    /// Per-scrape request derived from the `speedtest` section.
    pub fn request(&self) -> MeasurementRequest {
        MeasurementRequest::new(self.speedtest.server_id.clone(), self.speedtest.timeout_secs)
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.server.listen_addr()
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    #[serde(default = "default_listen")]
    pub listen: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl ServerSection {
    pub fn validate(&self) -> Result<()> {
        self.listen_addr().map(|_| ())
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            ExporterError::Config(format!(
                "server.listen {:?} is not a socket address: {e}",
                self.listen
            ))
        })
    }
}

fn default_listen() -> String {
    "0.0.0.0:9798".into()
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpeedtestSection {
    /// Executable name or path of the Ookla CLI.
    #[serde(default = "default_binary")]
    pub binary: String,

    #[serde(default)]
    pub server_id: Option<String>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SpeedtestSection {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            server_id: None,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SpeedtestSection {
    pub fn validate(&self) -> Result<()> {
        if self.binary.trim().is_empty() {
            return Err(ExporterError::Config("speedtest.binary must not be empty".into()));
        }
        if !(1..=MAX_TIMEOUT_SECS).contains(&self.timeout_secs) {
            return Err(ExporterError::Config(format!(
                "speedtest.timeout_secs must be between 1 and {MAX_TIMEOUT_SECS}"
            )));
        }
        Ok(())
    }
}

fn default_binary() -> String {
    DEFAULT_PROGRAM.into()
}
fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    #[serde(default)]
    pub schema: MetricSchema,
}
