//! Client side of the machine metrics endpoint.
//!
//! A [`MetricSource`] turns one endpoint URL into either a typed
//! [`MetricReading`] or a [`FetchError`] value. It never panics and never
//! retries; the collector decides what to do with failures.

pub mod client;
pub mod error;
pub mod parse;

use async_trait::async_trait;
use fleetmon_common::types::MetricReading;

pub use client::HttpMetricSource;
pub use error::FetchError;

/// Fetches the current metrics from a single machine.
///
/// Implementations must apply their own timeout so that one hung endpoint
/// cannot hold a collector slot forever.
#[async_trait]
pub trait MetricSource: Send + Sync {
    /// Returns a short name used in logs (e.g. `"http"`).
    fn name(&self) -> &str;

    /// Fetches and parses the metrics served at `endpoint`.
    async fn fetch(&self, endpoint: &str) -> error::Result<MetricReading>;
}
