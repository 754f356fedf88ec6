//! Where report text comes from.
//!
//! The fetch pool only sees the [`ReportSource`] trait; production uses the
//! HTTP implementation, tests plug in an in-memory one.

use std::time::Duration;

use async_trait::async_trait;
use insights_core::{InsightsError, Result};

const USER_AGENT: &str = concat!("usage-insights/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout of the HTTP source.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Classified result of a single fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success(String),
    /// Upstream has no report for this coordinate (HTTP 404).
    NotFound,
    /// Network error or any other non-success status.
    Transient(String),
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    async fn fetch(&self, url: &str) -> FetchOutcome;
}

/// `reqwest`-backed source.
#[derive(Debug, Clone)]
pub struct HttpReportSource {
    http_client: reqwest::Client,
}

impl HttpReportSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| InsightsError::HttpClient(e.to_string()))?;

        Ok(Self { http_client })
    }
}

#[async_trait]
impl ReportSource for HttpReportSource {
    async fn fetch(&self, url: &str) -> FetchOutcome {
        tracing::debug!(url = %url, "GET");

        let response = match self.http_client.get(url).send().await {
            Ok(r) => r,
            Err(e) => return FetchOutcome::Transient(e.to_string()),
        };

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return FetchOutcome::NotFound;
        }
        if !status.is_success() {
            return FetchOutcome::Transient(format!("HTTP {}", status));
        }

        match response.text().await {
            Ok(body) => FetchOutcome::Success(body),
            Err(e) => FetchOutcome::Transient(format!("reading body: {}", e)),
        }
    }
}
