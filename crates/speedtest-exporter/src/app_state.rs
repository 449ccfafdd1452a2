//! Shared application state for the exporter.

use std::sync::Arc;

use speedtest_core::Runner;

use crate::config::ExporterConfig;
use crate::obs::SpeedtestMetrics;
use crate::scrape::Scraper;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    metrics: Arc<SpeedtestMetrics>,
    scraper: Scraper,
}

impl AppState {
    /// State that runs the configured CLI binary.
    pub fn new(cfg: ExporterConfig) -> Self {
        let runner = Runner::tokio(cfg.speedtest.binary.clone());
        Self::with_runner(cfg, runner)
    }

    /// State with a caller-supplied runner (tests inject fake executors here).
    pub fn with_runner(cfg: ExporterConfig, runner: Runner) -> Self {
        let metrics = Arc::new(SpeedtestMetrics::new(cfg.metrics.schema));
        let scraper = Scraper::new(runner, cfg.request(), Arc::clone(&metrics));
        Self {
            inner: Arc::new(AppStateInner {
                metrics,
                scraper,
            }),
        }
    }

    pub fn metrics(&self) -> Arc<SpeedtestMetrics> {
        Arc::clone(&self.inner.metrics)
    }

    pub fn scraper(&self) -> &Scraper {
        &self.inner.scraper
    }
}
