//! Shared API types: the caller-facing error taxonomy (§7).
//!
//! `ApiError` is the single response-shaping error type for every route
//! handler. It mirrors the closed set of error kinds the external
//! interfaces are specified against — `bad_input`, `unauthorized`,
//! `not_found`, `unavailable`, `timeout`, `partial`, `internal` — and
//! converts from `PipelineError` via its `ErrorKind` rather than matching
//! on lower-layer error variants directly.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::error::{ErrorKind, PipelineError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadInput(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("request timed out")]
    Timeout,
    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    fn kind_code(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::Unauthorized => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "unavailable",
            Self::Timeout => "timeout",
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Timeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if matches!(self, Self::Internal(_)) {
            tracing::error!(error = %self, "internal API error");
        }
        let status = self.status();
        let code = self.kind_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Collapse a `PipelineError` into the caller-facing taxonomy via its
/// `ErrorKind` (§7) — the only place that mapping happens, so no route
/// handler ever matches on `PipelineError` variants directly.
///
/// `partial` has no distinct HTTP shape: a partial pipeline failure still
/// produces a terminal `Job` row and, where applicable, a fallback
/// assistant message (§7) — callers observe it through those channels,
/// not through a distinct error response.
impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::BadInput => ApiError::BadInput(message),
            ErrorKind::Unauthorized => ApiError::Unauthorized,
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::Unavailable => ApiError::Unavailable(message),
            ErrorKind::Timeout => ApiError::Timeout,
            ErrorKind::Partial => ApiError::Internal(message),
            ErrorKind::Internal => ApiError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_input_maps_to_400() {
        let err = ApiError::BadInput("missing field".to_string());
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.kind_code(), "bad_input");
    }

    #[test]
    fn test_unavailable_maps_to_503() {
        assert_eq!(ApiError::Unavailable("down".to_string()).status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn test_pipeline_not_found_converts() {
        let err: ApiError = PipelineError::NotFound("job".to_string()).into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_pipeline_invariant_converts_to_internal() {
        let err: ApiError = PipelineError::Invariant("bad state".to_string()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
