//! Retrieval adapter: ranked context lookups over an HTTP-backed index.

use async_trait::async_trait;
use serde::Deserialize;

use crate::core::constants::{ADAPTER_CALL_TIMEOUT_SECS, ADAPTER_MAX_RETRY_ATTEMPTS, ADAPTER_RETRY_BASE_DELAY_MS};
use crate::domain::adapters::{retry_for_value, AdapterError};

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub top_k: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalHit {
    pub score: f64,
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

#[async_trait]
pub trait RetrievalAdapter: Send + Sync {
    async fn available(&self) -> bool;
    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievalHit>, AdapterError>;
}

#[derive(Deserialize)]
struct RetrievalResponse {
    hits: Vec<RetrievalHit>,
}

/// Real adapter calling a remote retrieval service over HTTP.
pub struct HttpRetrievalAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetrievalAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(ADAPTER_CALL_TIMEOUT_SECS))
                .build()
                .expect("reqwest client configuration is static and known-valid"),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RetrievalAdapter for HttpRetrievalAdapter {
    async fn available(&self) -> bool {
        self.client
            .get(format!("{}/health", self.base_url))
            .send()
            .await
            .map(|r| r.status().is_success())
            .unwrap_or(false)
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievalHit>, AdapterError> {
        let body = serde_json::json!({ "query": request.query, "top_k": request.top_k });

        let response: RetrievalResponse = retry_for_value(
            ADAPTER_MAX_RETRY_ATTEMPTS,
            ADAPTER_RETRY_BASE_DELAY_MS,
            || {
                let body = body.clone();
                async {
                    let resp = self
                        .client
                        .post(format!("{}/retrieve", self.base_url))
                        .json(&body)
                        .send()
                        .await
                        .map_err(AdapterError::from)?;

                    if !resp.status().is_success() {
                        return Err(AdapterError::BadResponse(format!(
                            "retrieval service returned {}",
                            resp.status()
                        )));
                    }
                    resp.json::<RetrievalResponse>()
                        .await
                        .map_err(AdapterError::from)
                }
            },
        )
        .await?;

        Ok(response.hits)
    }
}

/// Deterministic fake for tests: returns a fixed set of hits, or reports
/// unavailable.
pub struct FakeRetrievalAdapter {
    pub available: bool,
    pub hits: Vec<RetrievalHit>,
}

impl FakeRetrievalAdapter {
    pub fn new(hits: Vec<RetrievalHit>) -> Self {
        Self {
            available: true,
            hits,
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            hits: Vec::new(),
        }
    }
}

#[async_trait]
impl RetrievalAdapter for FakeRetrievalAdapter {
    async fn available(&self) -> bool {
        self.available
    }

    async fn retrieve(&self, request: RetrievalRequest) -> Result<Vec<RetrievalHit>, AdapterError> {
        if !self.available {
            return Err(AdapterError::Unavailable("fake retrieval adapter offline".to_string()));
        }
        Ok(self.hits.iter().take(request.top_k.max(1)).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(score: f64, content: &str) -> RetrievalHit {
        RetrievalHit {
            score,
            content: content.to_string(),
            metadata: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn test_fake_adapter_respects_top_k() {
        let adapter = FakeRetrievalAdapter::new(vec![
            hit(0.9, "a"),
            hit(0.8, "b"),
            hit(0.7, "c"),
        ]);
        let hits = adapter
            .retrieve(RetrievalRequest { query: "q".into(), top_k: 2 })
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_unavailable_adapter_errors() {
        let adapter = FakeRetrievalAdapter::unavailable();
        assert!(!adapter.available().await);
        let err = adapter
            .retrieve(RetrievalRequest { query: "q".into(), top_k: 1 })
            .await
            .unwrap_err();
        assert!(matches!(err, AdapterError::Unavailable(_)));
    }
}
