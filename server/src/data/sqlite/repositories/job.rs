//! Job repository

use sqlx::SqlitePool;

use super::super::error::SqliteError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub id: String,
    pub job_type: String,
    pub conversation_id: Option<String>,
    pub parameters: String,
    pub status: String,
    pub progress: i64,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Insert a new job in `queued` status
pub async fn create_job(
    pool: &SqlitePool,
    id: &str,
    job_type: &str,
    conversation_id: Option<&str>,
    parameters: &str,
) -> Result<JobRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO jobs (id, job_type, conversation_id, parameters, status, progress, created_at, updated_at)
         VALUES (?, ?, ?, ?, 'queued', 0, ?, ?)",
    )
    .bind(id)
    .bind(job_type)
    .bind(conversation_id)
    .bind(parameters)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_job(pool, id)
        .await?
        .ok_or_else(|| SqliteError::Conflict(format!("job {id} vanished after insert")))
}

pub async fn get_job(pool: &SqlitePool, id: &str) -> Result<Option<JobRow>, SqliteError> {
    let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Move a job to `started`/`progress`, bumping its progress percentage
pub async fn update_job_progress(
    pool: &SqlitePool,
    id: &str,
    status: &str,
    progress: i64,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE jobs SET status = ?, progress = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(progress)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Move a job to the `completed` terminal state with its result payload
pub async fn complete_job(pool: &SqlitePool, id: &str, result: &str) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "UPDATE jobs SET status = 'completed', progress = 100, result = ?, updated_at = ? WHERE id = ?",
    )
    .bind(result)
    .bind(now)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Move a job to the `failed` terminal state with an error message
pub async fn fail_job(pool: &SqlitePool, id: &str, error: &str) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE jobs SET status = 'failed', error = ?, updated_at = ? WHERE id = ?")
        .bind(error)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn list_jobs_for_conversation(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<JobRow>, SqliteError> {
    let rows = sqlx::query_as::<_, JobRow>(
        "SELECT * FROM jobs WHERE conversation_id = ? ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
