use crate::error::{FetchError, Result};
use crate::parse::parse_payload;
use crate::MetricSource;
use async_trait::async_trait;
use fleetmon_common::types::MetricReading;
use reqwest::StatusCode;
use std::time::Duration;

/// Fetches metrics over plain HTTP GET with a fixed per-request timeout.
pub struct HttpMetricSource {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpMetricSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client, timeout })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            }
        } else if err.is_decode() {
            FetchError::MalformedPayload(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl MetricSource for HttpMetricSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self, endpoint: &str) -> Result<MetricReading> {
        let resp = self
            .client
            .get(endpoint)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = resp.status();
        if status != StatusCode::OK {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: serde_json::Value = resp.json().await.map_err(|e| self.classify(e))?;
        let reading = parse_payload(&body)?;
        tracing::trace!(endpoint, cpu = reading.cpu, "Fetched metrics");
        Ok(reading)
    }
}
