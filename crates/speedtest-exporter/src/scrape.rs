//! Scrape coordinator: one measurement per `/metrics` request.
//!
//! Measurements are serialized: the CLI saturates the link, so two
//! overlapping runs would skew each other's bandwidth. A request that arrives
//! while another is measuring waits, then runs its own measurement.

use std::sync::Arc;

use speedtest_core::units::bits_to_megabits_string;
use speedtest_core::{MeasurementRequest, MeasurementResult, Runner};
use tokio::sync::Mutex;
use tracing::info;

use crate::obs::SpeedtestMetrics;

pub struct Scraper {
    runner: Runner,
    request: MeasurementRequest,
    metrics: Arc<SpeedtestMetrics>,
    in_flight: Mutex<()>,
}

impl Scraper {
    pub fn new(
        runner: Runner,
        request: MeasurementRequest,
        metrics: Arc<SpeedtestMetrics>,
    ) -> Self {
        Self {
            runner,
            request,
            metrics,
            in_flight: Mutex::new(()),
        }
    }

    /// Run one measurement and publish it.
    pub async fn scrape(&self) -> MeasurementResult {
        let _turn = self.in_flight.lock().await;
        self.measure_and_publish().await
    }

    /// Like [`Scraper::scrape`], but renders before releasing the turn so the
    /// response carries this request's own measurement.
    pub async fn scrape_and_render(&self) -> String {
        let _turn = self.in_flight.lock().await;
        self.measure_and_publish().await;
        self.metrics.render()
    }

    async fn measure_and_publish(&self) -> MeasurementResult {
        info!("starting speedtest check");
        let result = self.runner.run(&self.request).await;
        self.metrics.publish(&result);
        if result.success {
            log_summary(&result);
        }
        result
    }
}

fn log_summary(r: &MeasurementResult) {
    info!(
        "UUID={} ServerID={} ServerName={} ServerLocation={} ServerCountry={} ISP={} \
         Jitter={}ms Ping={}ms Download={} Upload={}",
        r.test_uuid,
        r.server_id,
        r.server_name,
        r.server_location,
        r.server_country,
        r.isp,
        r.jitter_ms,
        r.ping_ms,
        bits_to_megabits_string(r.download_bps),
        bits_to_megabits_string(r.upload_bps),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use bytes::Bytes;
    use speedtest_core::{CommandExecutor, MeasurementError, Result};

    use super::*;
    use crate::logging::capture::Captured;
    use crate::obs::MetricSchema;

    const RESULT_FRAME: &str = r#"{"type":"result",
        "ping":{"jitter":0.8,"latency":14.2},
        "download":{"bandwidth":12500000},"upload":{"bandwidth":1250000},
        "isp":"ExampleISP",
        "server":{"id":1234,"name":"ACME","location":"Metropolis","country":"US"},
        "result":{"id":"abcd-1"}}"#;

    /// Answers every call with the same stdout, or with a non-zero exit.
    enum Canned {
        Stdout(&'static str),
        ExitCode(i32),
    }

    #[async_trait]
    impl CommandExecutor for Canned {
        async fn execute(&self, _: &str, _: &[String], _: Duration) -> Result<Bytes> {
            match self {
                Canned::Stdout(s) => Ok(Bytes::from_static(s.as_bytes())),
                Canned::ExitCode(code) => Err(MeasurementError::ProcessFailed(format!(
                    "speedtest exited with code {code}"
                ))),
            }
        }
    }

    async fn scrape_logged(canned: Canned) -> (MeasurementResult, String) {
        let out = Captured::default();
        let _default = tracing::subscriber::set_default(out.subscriber());
        let scraper = Scraper::new(
            Runner::new(Arc::new(canned), "speedtest"),
            MeasurementRequest::default(),
            Arc::new(SpeedtestMetrics::new(MetricSchema::Info)),
        );
        let result = scraper.scrape().await;
        (result, out.text())
    }

    #[tokio::test]
    async fn successful_scrape_logs_summary_line() {
        let (result, logs) = scrape_logged(Canned::Stdout(RESULT_FRAME)).await;
        assert!(result.success);

        assert!(logs.contains("level=INFO datetime="), "{logs}");
        assert!(logs.contains(" starting speedtest check\n"), "{logs}");
        assert!(logs.contains(" running a new measurement\n"), "{logs}");
        assert!(
            logs.contains(
                " UUID=abcd-1 ServerID=1234 ServerName=ACME ServerLocation=Metropolis \
                 ServerCountry=US ISP=ExampleISP Jitter=0.8ms Ping=14.2ms \
                 Download=100.0Mbps Upload=10.0Mbps\n"
            ),
            "{logs}"
        );
        assert!(!logs.contains("level=ERROR"), "{logs}");
    }

    #[tokio::test]
    async fn failed_scrape_logs_error_and_no_summary() {
        let (result, logs) = scrape_logged(Canned::ExitCode(2)).await;
        assert!(!result.success);

        assert!(logs.contains(" starting speedtest check\n"), "{logs}");
        assert!(logs.contains(" running a new measurement\n"), "{logs}");
        let error_line = logs
            .lines()
            .find(|l| l.starts_with("level=ERROR "))
            .unwrap_or_else(|| panic!("no error line in:\n{logs}"));
        assert!(
            error_line.contains("speedtest CLI error: speedtest exited with code 2"),
            "{error_line}"
        );
        assert!(error_line.contains("kind=\"PROCESS_FAILED\""), "{error_line}");
        assert!(!logs.contains("UUID="), "{logs}");
    }

    /// Sleeps while tracking how many calls overlap.
    #[derive(Default)]
    struct Overlap {
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CommandExecutor for Overlap {
        async fn execute(&self, _: &str, _: &[String], _: Duration) -> Result<Bytes> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(Bytes::from_static(b"{\"type\":\"testStart\"}"))
        }
    }

    #[tokio::test]
    async fn overlapping_scrapes_measure_one_at_a_time() {
        let exec = Arc::new(Overlap::default());
        let metrics = Arc::new(SpeedtestMetrics::new(MetricSchema::Info));
        let scraper = Arc::new(Scraper::new(
            Runner::new(exec.clone(), "speedtest"),
            MeasurementRequest::default(),
            metrics,
        ));

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let s = Arc::clone(&scraper);
                tokio::spawn(async move { s.scrape().await })
            })
            .collect();
        for h in handles {
            assert!(!h.await.unwrap().success);
        }

        assert_eq!(exec.calls.load(Ordering::SeqCst), 3);
        assert_eq!(exec.peak.load(Ordering::SeqCst), 1);
    }
}
