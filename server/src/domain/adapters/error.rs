//! Per-layer error type for external adapters (§11), collapsing into the
//! caller-facing taxonomy (§7) at the API boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("adapter unavailable: {0}")]
    Unavailable(String),

    #[error("adapter call timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("adapter returned a malformed response: {0}")]
    BadResponse(String),

    #[error("adapter request rejected: {0}")]
    BadRequest(String),

    #[error("adapter transport error: {0}")]
    Transport(String),
}

impl AdapterError {
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout { .. } | Self::Transport(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs: 0 }
        } else {
            Self::Transport(err.to_string())
        }
    }
}
