//! External telemetry source.
//!
//! Samplers may pull readings from an HTTP service returning a JSON object
//! with numeric fields (`latitude`, `longitude`, `temperature`). Every failure
//! (unreachable, non-2xx status, malformed payload, missing field) is an
//! `Err` for the caller to log; nothing here retries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;

pub const TEMPERATURE_PATH: &str = "/get-temperature";
pub const LOCATION_PATH: &str = "/get-location";

/// Request/response exchange with a telemetry provider.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    /// Fetch the JSON object served at `path`.
    async fn fetch(&self, path: &str) -> Result<Map<String, Value>>;
}

/// Telemetry source backed by an HTTP endpoint.
pub struct HttpTelemetry {
    /// Base URL (e.g., "http://127.0.0.1:5000")
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTelemetry {
    /// Creates a client whose requests fail after `timeout`.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build telemetry HTTP client")?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetry {
    async fn fetch(&self, path: &str) -> Result<Map<String, Value>> {
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach telemetry source at {}", url))?;

        if !response.status().is_success() {
            anyhow::bail!("Telemetry source returned status {}", response.status());
        }

        let body: Value = response
            .json()
            .await
            .context("Failed to parse telemetry response")?;

        match body {
            Value::Object(map) => Ok(map),
            other => anyhow::bail!("Telemetry response is not a JSON object: {}", other),
        }
    }
}

/// Extract a numeric field from a telemetry payload.
pub fn number_field(payload: &Map<String, Value>, field: &str) -> Result<f64> {
    payload
        .get(field)
        .and_then(Value::as_f64)
        .with_context(|| format!("Telemetry payload has no numeric '{}' field", field))
}
