//! Cached query result repository
//!
//! Results are content-addressed by a fingerprint of the query text and time
//! window, scoped per user. A given fingerprint+user pair is upserted in
//! place — never duplicated.

use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use super::super::error::SqliteError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CachedQueryResultRow {
    pub fingerprint: String,
    pub user_id: String,
    pub query_text: String,
    pub earliest: i64,
    pub latest: i64,
    pub result: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Compute the content-address fingerprint for a query + time window
pub fn fingerprint(query_text: &str, earliest: i64, latest: i64) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query_text.as_bytes());
    hasher.update(b"|");
    hasher.update(earliest.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(latest.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert or update the cached result for a fingerprint+user pair
pub async fn upsert_cached_query_result(
    pool: &SqlitePool,
    fingerprint: &str,
    user_id: &str,
    query_text: &str,
    earliest: i64,
    latest: i64,
    result: &str,
) -> Result<CachedQueryResultRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO cached_query_results
            (fingerprint, user_id, query_text, earliest, latest, result, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(fingerprint, user_id) DO UPDATE SET
            result = excluded.result,
            updated_at = excluded.updated_at",
    )
    .bind(fingerprint)
    .bind(user_id)
    .bind(query_text)
    .bind(earliest)
    .bind(latest)
    .bind(result)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_cached_query_result(pool, fingerprint, user_id)
        .await?
        .ok_or_else(|| {
            SqliteError::Conflict(format!(
                "cached query result {fingerprint}/{user_id} vanished after upsert"
            ))
        })
}

pub async fn get_cached_query_result(
    pool: &SqlitePool,
    fingerprint: &str,
    user_id: &str,
) -> Result<Option<CachedQueryResultRow>, SqliteError> {
    let row = sqlx::query_as::<_, CachedQueryResultRow>(
        "SELECT * FROM cached_query_results WHERE fingerprint = ? AND user_id = ?",
    )
    .bind(fingerprint)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
