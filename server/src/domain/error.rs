//! Unified error type for the domain layer (§11), collapsing adapter and
//! data errors into the caller-facing taxonomy (§7).

use thiserror::Error;

use crate::data::error::DataError;
use crate::domain::adapters::AdapterError;

/// Caller-facing error kind (§7), a closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    Unauthorized,
    NotFound,
    Unavailable,
    Timeout,
    Partial,
    Internal,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    BadInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("adapter error: {0}")]
    Adapter(#[from] AdapterError),

    #[error("data error: {0}")]
    Data(#[from] DataError),

    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Map to the closed caller-facing taxonomy (§7).
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) => ErrorKind::BadInput,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Cancelled => ErrorKind::Internal,
            Self::Invariant(_) => ErrorKind::Internal,
            Self::Adapter(e) => match e {
                AdapterError::Unavailable(_) => ErrorKind::Unavailable,
                AdapterError::Timeout { .. } => ErrorKind::Timeout,
                AdapterError::BadRequest(_) => ErrorKind::BadInput,
                AdapterError::BadResponse(_) | AdapterError::Transport(_) => ErrorKind::Internal,
            },
            Self::Data(e) => {
                if matches!(e, DataError::NotFound(_)) {
                    ErrorKind::NotFound
                } else if matches!(e, DataError::Timeout { .. }) {
                    ErrorKind::Timeout
                } else {
                    ErrorKind::Internal
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_unavailable_maps_to_unavailable() {
        let err = PipelineError::Adapter(AdapterError::Unavailable("down".into()));
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[test]
    fn test_adapter_timeout_maps_to_timeout() {
        let err = PipelineError::Adapter(AdapterError::Timeout { timeout_secs: 5 });
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[test]
    fn test_data_not_found_maps_to_not_found() {
        let err = PipelineError::Data(DataError::NotFound("job".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_invariant_violation_maps_to_internal() {
        let err = PipelineError::Invariant("progress went backwards".into());
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_bad_input_maps_to_bad_input() {
        let err = PipelineError::BadInput("missing field".into());
        assert_eq!(err.kind(), ErrorKind::BadInput);
    }
}
