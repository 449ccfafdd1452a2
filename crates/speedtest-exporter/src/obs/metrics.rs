//! Speedtest gauge registry and Prometheus text rendering.
//!
//! Gauges are `f64` values stored as bits in `AtomicU64`, keyed by a sorted
//! label vector in a `DashMap`. A registry-wide `RwLock` makes each publish
//! (five gauges plus the info series) atomic with respect to rendering.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use dashmap::DashMap;
use serde::Deserialize;
use speedtest_core::MeasurementResult;

pub const JITTER: &str = "speedtest_jitter_latency_milliseconds";
pub const PING: &str = "speedtest_ping_latency_milliseconds";
pub const DOWNLOAD: &str = "speedtest_download_bits_per_second";
pub const UPLOAD: &str = "speedtest_upload_bits_per_second";
pub const UP: &str = "speedtest_up";
pub const INFO: &str = "speedtest_info";

/// Which metrics layout the exporter publishes. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricSchema {
    /// v1: every gauge carries the six descriptive labels. Each new server or
    /// test id adds a series; old ones stay registered.
    Labeled,
    /// v2: plain gauges plus a `speedtest_info` series replaced on each publish.
    #[default]
    Info,
}

/// Helper to escape label values.
fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl GaugeVec {
    /// Overwrite the value for a label set, registering it if new.
    pub fn set(&self, labels: &[(&str, &str)], v: f64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        gauge.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> Option<f64> {
        self.map
            .get(&label_key(labels))
            .map(|g| f64::from_bits(g.load(Ordering::Relaxed)))
    }

    /// Number of registered label sets.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&self) {
        self.map.clear();
    }

    /// Render in Prometheus text exposition format.
    fn render(&self, name: &str, help: &str, out: &mut String) {
        let _ = writeln!(out, "# HELP {} {}", name, help);
        let _ = writeln!(out, "# TYPE {} gauge", name);
        let mut series: Vec<(String, f64)> = self
            .map
            .iter()
            .map(|r| {
                let label_str = r
                    .key()
                    .iter()
                    .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
                    .collect::<Vec<_>>()
                    .join(",");
                (label_str, f64::from_bits(r.value().load(Ordering::Relaxed)))
            })
            .collect();
        series.sort_by(|a, b| a.0.cmp(&b.0));

        for (label_str, val) in series {
            if label_str.is_empty() {
                let _ = writeln!(out, "{} {}", name, val);
            } else {
                let _ = writeln!(out, "{}{{{}}} {}", name, label_str, val);
            }
        }
    }
}

/// The six descriptive fields, as labels.
fn descriptive_labels(r: &MeasurementResult) -> [(&'static str, &str); 6] {
    [
        ("test_uuid", r.test_uuid.as_str()),
        ("server_id", r.server_id.as_str()),
        ("server_name", r.server_name.as_str()),
        ("server_location", r.server_location.as_str()),
        ("server_country", r.server_country.as_str()),
        ("isp", r.isp.as_str()),
    ]
}

/// Process-wide speedtest metrics, owned by the exporter.
pub struct SpeedtestMetrics {
    schema: MetricSchema,
    publish: RwLock<()>,
    pub jitter: GaugeVec,
    pub ping: GaugeVec,
    pub download: GaugeVec,
    pub upload: GaugeVec,
    pub up: GaugeVec,
    pub info: GaugeVec,
}

impl SpeedtestMetrics {
    pub fn new(schema: MetricSchema) -> Self {
        Self {
            schema,
            publish: RwLock::new(()),
            jitter: GaugeVec::default(),
            ping: GaugeVec::default(),
            download: GaugeVec::default(),
            upload: GaugeVec::default(),
            up: GaugeVec::default(),
            info: GaugeVec::default(),
        }
    }

    /// Publish one measurement. Renders never see a partially applied result.
    pub fn publish(&self, r: &MeasurementResult) {
        let _guard = self.publish.write().unwrap_or_else(PoisonError::into_inner);
        let labels = descriptive_labels(r);

        let gauge_labels: &[(&str, &str)] = match self.schema {
            MetricSchema::Labeled => &labels,
            MetricSchema::Info => &[],
        };
        self.jitter.set(gauge_labels, r.jitter_ms);
        self.ping.set(gauge_labels, r.ping_ms);
        self.download.set(gauge_labels, r.download_bps);
        self.upload.set(gauge_labels, r.upload_bps);
        self.up.set(gauge_labels, r.up());

        if self.schema == MetricSchema::Info {
            self.info.clear();
            self.info.set(&labels, 1.0);
        }
    }

    /// Render all speedtest series.
    pub fn render(&self) -> String {
        let _guard = self.publish.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        self.jitter.render(JITTER, "Speedtest current Jitter in ms", &mut out);
        self.ping.render(PING, "Speedtest current Ping in ms", &mut out);
        self.download.render(DOWNLOAD, "Speedtest current Download Speed in bit/s", &mut out);
        self.upload.render(UPLOAD, "Speedtest current Upload speed in bits/s", &mut out);
        self.up.render(UP, "Speedtest status whether the scrape worked", &mut out);
        if self.schema == MetricSchema::Info {
            self.info.render(INFO, "Speedtest server and test details", &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(uuid: &str, server_id: &str) -> MeasurementResult {
        MeasurementResult {
            success: true,
            jitter_ms: 0.8,
            ping_ms: 14.2,
            download_bps: 100_000_000.0,
            upload_bps: 10_000_000.0,
            server_id: server_id.into(),
            test_uuid: uuid.into(),
            server_name: "ACME".into(),
            server_location: "Metropolis".into(),
            server_country: "US".into(),
            isp: "Example \"ISP\"".into(),
        }
    }

    #[test]
    fn info_schema_renders_plain_gauges() {
        let m = SpeedtestMetrics::new(MetricSchema::Info);
        m.publish(&sample("abcd-1", "1234"));
        let text = m.render();

        assert!(text.contains("# TYPE speedtest_up gauge\n"));
        assert!(text.contains("\nspeedtest_up 1\n"));
        assert!(text.contains("\nspeedtest_download_bits_per_second 100000000\n"));
        assert!(text.contains("\nspeedtest_jitter_latency_milliseconds 0.8\n"));
        assert!(text.contains("isp=\"Example \\\"ISP\\\"\""), "{text}");
        assert!(text.contains("test_uuid=\"abcd-1\"} 1\n"), "{text}");
    }

    #[test]
    fn info_series_is_replaced_wholesale() {
        let m = SpeedtestMetrics::new(MetricSchema::Info);
        m.publish(&sample("abcd-1", "1234"));
        m.publish(&sample("abcd-2", "999"));
        assert_eq!(m.info.len(), 1);
        assert_eq!(m.up.len(), 1);

        m.publish(&MeasurementResult::failed());
        assert_eq!(m.info.len(), 1);
        assert_eq!(m.up.get(&[]), Some(0.0));
        assert_eq!(m.download.get(&[]), Some(0.0));
        assert!(m.render().contains("test_uuid=\"\"} 1\n"));
    }

    #[test]
    fn labeled_schema_keeps_previous_label_sets() {
        let m = SpeedtestMetrics::new(MetricSchema::Labeled);
        m.publish(&sample("abcd-1", "1234"));
        m.publish(&sample("abcd-2", "999"));

        assert_eq!(m.jitter.len(), 2);
        assert!(m.info.is_empty());
        let text = m.render();
        assert!(!text.contains(INFO));
        assert!(text.contains("server_id=\"999\""));
        assert!(text.contains("server_id=\"1234\""));
    }

    #[test]
    fn label_order_does_not_split_series() {
        let g = GaugeVec::default();
        g.set(&[("a", "1"), ("b", "2")], 1.0);
        g.set(&[("b", "2"), ("a", "1")], 2.0);
        assert_eq!(g.len(), 1);
        assert_eq!(g.get(&[("a", "1"), ("b", "2")]), Some(2.0));
    }
}
