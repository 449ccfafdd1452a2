//! Exporter config: optional strict YAML file, then environment overrides.

pub mod schema;

use std::fs;

use speedtest_core::DEFAULT_TIMEOUT_SECS;
use tracing::warn;

use crate::error::{ExporterError, Result};

pub use schema::{
    ExporterConfig, MetricsSection, ServerSection, SpeedtestSection, MAX_TIMEOUT_SECS,
};

/// Path of an optional YAML config file.
pub const ENV_CONFIG_PATH: &str = "SPEEDTEST_EXPORTER_CONFIG";
/// Server id to pin measurements to.
pub const ENV_SERVER: &str = "SPEEDTEST_SERVER";
/// CLI timeout in seconds.
pub const ENV_TIMEOUT: &str = "SPEEDTEST_TIMEOUT";
/// Listen port.
pub const ENV_PORT: &str = "SPEEDTEST_PORT";

/// Load the file at `path` (if any), apply process environment overrides,
/// and validate.
pub fn load(path: Option<&str>) -> Result<ExporterConfig> {
    let mut cfg = match path {
        Some(p) => parse_file(p)?,
        None => ExporterConfig::default(),
    };
    apply_env(&mut cfg, |key| std::env::var(key).ok());
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_file(path: &str) -> Result<ExporterConfig> {
    let cfg = parse_file(path)?;
    cfg.validate()?;
    Ok(cfg)
}

pub fn load_from_str(s: &str) -> Result<ExporterConfig> {
    let cfg = parse_str(s)?;
    cfg.validate()?;
    Ok(cfg)
}

fn parse_file(path: &str) -> Result<ExporterConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| ExporterError::Io(format!("read config {path} failed: {e}")))?;
    parse_str(&s)
}

fn parse_str(s: &str) -> Result<ExporterConfig> {
    serde_yaml::from_str(s).map_err(|e| ExporterError::Config(format!("invalid yaml: {e}")))
}

/// Apply `SPEEDTEST_*` overrides. Unusable values are logged and replaced by
/// defaults rather than rejected, so a bad variable never stops the exporter.
pub fn apply_env<F>(cfg: &mut ExporterConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(server) = lookup(ENV_SERVER) {
        let server = server.trim();
        cfg.speedtest.server_id = (!server.is_empty()).then(|| server.to_string());
    }

    if let Some(raw) = lookup(ENV_TIMEOUT) {
        cfg.speedtest.timeout_secs = match raw.trim().parse::<u64>() {
            Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => secs,
            _ => {
                warn!(
                    value = %raw,
                    default = DEFAULT_TIMEOUT_SECS,
                    max = MAX_TIMEOUT_SECS,
                    "{ENV_TIMEOUT} is not a usable timeout, using default"
                );
                DEFAULT_TIMEOUT_SECS
            }
        };
    }

    if let Some(raw) = lookup(ENV_PORT) {
        match (raw.trim().parse::<u16>(), cfg.server.listen_addr()) {
            (Ok(port), Ok(mut addr)) => {
                addr.set_port(port);
                cfg.server.listen = addr.to_string();
            }
            (Err(e), _) => warn!(value = %raw, "ignoring {ENV_PORT}: {e}"),
            // Invalid listen address is reported by validate().
            (Ok(_), Err(_)) => {}
        }
    }
}
