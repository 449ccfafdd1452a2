//! Speedtest exporter library entry.
//!
//! Wires config, logging, the metrics registry, and the scrape coordinator
//! into an axum router. Consumed by the binary (`main.rs`) and by integration
//! tests.

pub mod app_state;
pub mod config;
pub mod error;
pub mod logging;
pub mod obs;
pub mod ops;
pub mod router;
pub mod scrape;
