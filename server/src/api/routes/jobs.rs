//! Job status endpoint (§6: "get job by id").

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::domain::job::Job;

pub fn routes() -> Router<ApiState> {
    Router::new().route("/jobs/{id}", get(get_job))
}

#[derive(Serialize)]
struct JobDto {
    id: String,
    job_type: String,
    conversation_id: Option<String>,
    status: String,
    progress: i64,
    result: Option<serde_json::Value>,
    error: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<Job> for JobDto {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            job_type: job.job_type.as_str().to_string(),
            conversation_id: job.conversation_id,
            status: job.status.as_str().to_string(),
            progress: job.progress,
            result: job.result,
            error: job.error,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

async fn get_job(State(state): State<ApiState>, Path(id): Path<String>) -> Result<Json<JobDto>, ApiError> {
    let job = state.jobs.get(&id).await?;
    Ok(Json(job.into()))
}
