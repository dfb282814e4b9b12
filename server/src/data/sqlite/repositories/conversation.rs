//! Conversation repository

use sqlx::SqlitePool;

use super::super::error::SqliteError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ConversationRow {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn create_conversation(
    pool: &SqlitePool,
    id: &str,
    user_id: &str,
    title: Option<&str>,
) -> Result<ConversationRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO conversations (id, user_id, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(user_id)
    .bind(title)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_conversation(pool, id)
        .await?
        .ok_or_else(|| SqliteError::Conflict(format!("conversation {id} vanished after insert")))
}

pub async fn get_conversation(
    pool: &SqlitePool,
    id: &str,
) -> Result<Option<ConversationRow>, SqliteError> {
    let row = sqlx::query_as::<_, ConversationRow>("SELECT * FROM conversations WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_conversations_for_user(
    pool: &SqlitePool,
    user_id: &str,
) -> Result<Vec<ConversationRow>, SqliteError> {
    let rows = sqlx::query_as::<_, ConversationRow>(
        "SELECT * FROM conversations WHERE user_id = ? ORDER BY updated_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Bump `updated_at` to now — called on every message append
pub async fn touch_conversation(pool: &SqlitePool, id: &str) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn update_conversation_title(
    pool: &SqlitePool,
    id: &str,
    title: &str,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
        .bind(title)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a conversation; `ON DELETE CASCADE` removes its messages
pub async fn delete_conversation(pool: &SqlitePool, id: &str) -> Result<bool, SqliteError> {
    let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
