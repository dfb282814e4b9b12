//! External Adapters (C5): LLM, retrieval and analytics backends behind
//! narrow traits, so the Pipeline Engine never depends on a concrete SDK.
//!
//! Each trait exposes `available()` so the pipeline can decide, per job,
//! whether to take the mock short-circuit (§9) rather than caching that
//! decision across jobs.

pub mod analytics;
pub mod error;
pub mod llm;
pub mod retrieval;

use std::sync::Arc;

pub use analytics::{AnalyticsAdapter, AnalyticsQueryResult};
pub use error::AdapterError;
pub use llm::{LlmAdapter, LlmMessage, LlmRequest, LlmResponse};
pub use retrieval::{RetrievalAdapter, RetrievalHit, RetrievalRequest};

/// Dependency container for the three external adapters, injected into
/// the Pipeline Engine rather than reached for as a global singleton.
#[derive(Clone)]
pub struct AdapterContainer {
    pub llm: Arc<dyn LlmAdapter>,
    pub retrieval: Arc<dyn RetrievalAdapter>,
    pub analytics: Arc<dyn AnalyticsAdapter>,
}

impl AdapterContainer {
    pub fn new(
        llm: Arc<dyn LlmAdapter>,
        retrieval: Arc<dyn RetrievalAdapter>,
        analytics: Arc<dyn AnalyticsAdapter>,
    ) -> Self {
        Self {
            llm,
            retrieval,
            analytics,
        }
    }
}

/// Retry an async operation that produces a value, using the same
/// exponential backoff shape as [`crate::utils::retry::retry_with_backoff_async`].
/// Adapters need the attempt's return value on success, which that helper
/// (built for fire-and-forget operations) doesn't carry.
pub(crate) async fn retry_for_value<F, Fut, T, E>(
    max_attempts: u32,
    base_delay_ms: u64,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if attempts >= max_attempts {
                    return Err(e);
                }
                let delay = std::time::Duration::from_millis(base_delay_ms * 2_u64.pow(attempts - 1));
                tracing::warn!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "retrying adapter call after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_retry_for_value_returns_first_success() {
        let result: Result<&str, &str> = retry_for_value(3, 1, || async { Ok("ok") }).await;
        assert_eq!(result, Ok("ok"));
    }

    #[tokio::test]
    async fn test_retry_for_value_retries_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let result: Result<u32, &str> = retry_for_value(3, 1, || {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test]
    async fn test_retry_for_value_exhausts_attempts() {
        let result: Result<(), &str> = retry_for_value(2, 1, || async { Err("persistent") }).await;
        assert_eq!(result, Err("persistent"));
    }
}
