//! Analytics query endpoint (§6: "execute analytics query").

use axum::extract::{Extension, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::auth::AuthContext;
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::core::constants::DEFAULT_ANALYTICS_WINDOW_SECS;
use crate::domain::blocks::Block;

pub fn routes() -> Router<ApiState> {
    Router::new().route("/query", post(execute_query))
}

#[derive(Deserialize)]
struct ExecuteQueryRequest {
    query: String,
    earliest: Option<i64>,
    latest: Option<i64>,
    /// Present in the external interface for forward compatibility with
    /// non-SPL query languages; this deployment only speaks one dialect,
    /// so the value is accepted and otherwise unused.
    #[serde(default)]
    #[allow(dead_code)]
    language: Option<String>,
}

#[derive(Serialize)]
struct ExecuteQueryResponse {
    cache_id: String,
    columns: Vec<String>,
    rows: Vec<serde_json::Map<String, serde_json::Value>>,
    visualization: Block,
    preview: bool,
}

async fn execute_query(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<ExecuteQueryRequest>,
) -> Result<Json<ExecuteQueryResponse>, ApiError> {
    if request.query.trim().is_empty() {
        return Err(ApiError::BadInput("query must not be empty".to_string()));
    }

    let latest = request.latest.unwrap_or_else(|| chrono::Utc::now().timestamp());
    let earliest = request.earliest.unwrap_or(latest - DEFAULT_ANALYTICS_WINDOW_SECS);

    let result = state
        .query_service
        .execute(&auth.user_id, &request.query, earliest, latest)
        .await?;

    Ok(Json(ExecuteQueryResponse {
        cache_id: result.fingerprint,
        columns: result.columns,
        rows: result.rows,
        visualization: result.visualization,
        preview: result.preview,
    }))
}
