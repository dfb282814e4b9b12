//! Analytics adapter: submits a query to a remote search backend and polls
//! the resulting job to completion, per §4.5.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Map;

use crate::core::constants::{ADAPTER_CALL_TIMEOUT_SECS, ADAPTER_MAX_RETRY_ATTEMPTS, ADAPTER_RETRY_BASE_DELAY_MS};
use crate::domain::adapters::{retry_for_value, AdapterError};

#[derive(Debug, Clone)]
pub struct AnalyticsQueryResult {
    pub columns: Vec<String>,
    pub fields: Vec<String>,
    pub rows: Vec<Map<String, serde_json::Value>>,
    /// `true` when the remote job hadn't fully completed within the poll
    /// deadline and this is a partial/preview result (§7 `partial`).
    pub preview: bool,
}

#[async_trait]
pub trait AnalyticsAdapter: Send + Sync {
    async fn available(&self) -> bool;
    async fn execute(
        &self,
        query: &str,
        earliest: i64,
        latest: i64,
    ) -> Result<AnalyticsQueryResult, AdapterError>;
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: String,
}

#[derive(Deserialize)]
struct PollResponse {
    status: String,
    columns: Option<Vec<String>>,
    rows: Option<Vec<Map<String, serde_json::Value>>>,
}

/// Real adapter calling a remote search/analytics service over HTTP,
/// submitting a query then polling its job until done or the deadline
/// elapses.
pub struct HttpAnalyticsAdapter {
    client: reqwest::Client,
    base_url: String,
    poll_interval: Duration,
    poll_deadline: Duration,
}

impl HttpAnalyticsAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(ADAPTER_CALL_TIMEOUT_SECS))
                .build()
                .expect("reqwest client configuration is static and known-valid"),
            base_url: base_url.into(),
            poll_interval: Duration::from_millis(500),
            poll_deadline: Duration::from_secs(ADAPTER_CALL_TIMEOUT_SECS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_poll_deadline(mut self, deadline: Duration) -> Self {
        self.poll_deadline = deadline;
        self
    }

    async fn poll_until_done(&self, job_id: &str) -> Result<(PollResponse, bool), AdapterError> {
        let started = tokio::time::Instant::now();
        loop {
            let poll: PollResponse = self
                .client
                .get(format!("{}/jobs/{}", self.base_url, job_id))
                .send()
                .await
                .map_err(AdapterError::from)?
                .json()
                .await
                .map_err(AdapterError::from)?;

            if poll.status == "done" {
                return Ok((poll, false));
            }
            if poll.status == "failed" {
                return Err(AdapterError::BadResponse("remote analytics job failed".to_string()));
            }
            if started.elapsed() >= self.poll_deadline {
                return Ok((poll, true));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl AnalyticsAdapter for HttpAnalyticsAdapter {
    async fn available(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn execute(
        &self,
        query: &str,
        earliest: i64,
        latest: i64,
    ) -> Result<AnalyticsQueryResult, AdapterError> {
        let body = serde_json::json!({ "query": query, "earliest": earliest, "latest": latest });

        let submit: SubmitResponse = retry_for_value(
            ADAPTER_MAX_RETRY_ATTEMPTS,
            ADAPTER_RETRY_BASE_DELAY_MS,
            || {
                let body = body.clone();
                async {
                    self.client
                        .post(format!("{}/search", self.base_url))
                        .json(&body)
                        .send()
                        .await
                        .map_err(AdapterError::from)?
                        .json::<SubmitResponse>()
                        .await
                        .map_err(AdapterError::from)
                }
            },
        )
        .await?;

        let (poll, preview) = self.poll_until_done(&submit.job_id).await?;
        let rows = poll.rows.unwrap_or_default();
        let columns = poll.columns.unwrap_or_else(|| {
            rows.first()
                .map(|r| r.keys().cloned().collect())
                .unwrap_or_default()
        });

        Ok(AnalyticsQueryResult {
            fields: columns.clone(),
            columns,
            rows,
            preview,
        })
    }
}

/// Deterministic fake for tests.
pub struct FakeAnalyticsAdapter {
    pub available: bool,
    pub result: AnalyticsQueryResult,
}

impl FakeAnalyticsAdapter {
    pub fn new(result: AnalyticsQueryResult) -> Self {
        Self {
            available: true,
            result,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            result: AnalyticsQueryResult {
                columns: Vec::new(),
                fields: Vec::new(),
                rows: Vec::new(),
                preview: false,
            },
        }
    }
}

#[async_trait]
impl AnalyticsAdapter for FakeAnalyticsAdapter {
    async fn available(&self) -> bool {
        self.available
    }

    async fn execute(
        &self,
        _query: &str,
        _earliest: i64,
        _latest: i64,
    ) -> Result<AnalyticsQueryResult, AdapterError> {
        if !self.available {
            return Err(AdapterError::Unavailable("fake analytics adapter offline".to_string()));
        }
        Ok(self.result.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_adapter_returns_configured_result() {
        let mut row = Map::new();
        row.insert("count".to_string(), serde_json::json!(5));
        let adapter = FakeAnalyticsAdapter::new(AnalyticsQueryResult {
            columns: vec!["count".to_string()],
            fields: vec!["count".to_string()],
            rows: vec![row],
            preview: false,
        });
        let result = adapter.execute("stats count", 0, 100).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert!(!result.preview);
    }

    #[tokio::test]
    async fn test_unavailable_adapter_errors() {
        let adapter = FakeAnalyticsAdapter::unavailable();
        let err = adapter.execute("stats count", 0, 100).await.unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable(_)));
    }
}
