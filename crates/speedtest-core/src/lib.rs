//! speedtest core: measurement invocation and result normalization.
//!
//! This crate owns the pipeline between the external `speedtest` CLI and the
//! metrics layer: building the invocation, running it under a wall-clock
//! budget, and folding whatever comes back into a [`MeasurementResult`]. It
//! carries no HTTP or metrics-registry dependencies so the exporter (or a
//! test) can drive it with any [`runner::CommandExecutor`].
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Every failure path
//! surfaces as [`MeasurementError`] internally and collapses into the sentinel
//! failure record at the [`Runner::run`] boundary.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod measurement;
pub mod normalize;
pub mod runner;
pub mod units;

pub use error::{ErrorKind, MeasurementError, Result};
pub use measurement::{MeasurementRequest, MeasurementResult, DEFAULT_TIMEOUT_SECS};
pub use normalize::normalize;
pub use runner::{CommandExecutor, Runner, TokioExecutor};
