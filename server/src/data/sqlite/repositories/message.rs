//! Message repository

use sqlx::SqlitePool;

use super::super::error::SqliteError;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: String,
    pub conversation_id: String,
    pub role: String,
    pub content: String,
    pub blocks: Option<String>,
    pub job_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

pub async fn create_message(
    pool: &SqlitePool,
    id: &str,
    conversation_id: &str,
    role: &str,
    content: &str,
    job_id: Option<&str>,
) -> Result<MessageRow, SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        "INSERT INTO messages (id, conversation_id, role, content, job_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(conversation_id)
    .bind(role)
    .bind(content)
    .bind(job_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    get_message(pool, id)
        .await?
        .ok_or_else(|| SqliteError::Conflict(format!("message {id} vanished after insert")))
}

pub async fn get_message(pool: &SqlitePool, id: &str) -> Result<Option<MessageRow>, SqliteError> {
    let row = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

pub async fn list_messages_for_conversation(
    pool: &SqlitePool,
    conversation_id: &str,
) -> Result<Vec<MessageRow>, SqliteError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE conversation_id = ? ORDER BY created_at ASC",
    )
    .bind(conversation_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Append a streamed token to a message's content while its job is in progress
pub async fn append_message_content(
    pool: &SqlitePool,
    id: &str,
    token: &str,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE messages SET content = content || ?, updated_at = ? WHERE id = ?")
        .bind(token)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Freeze a message's final content and blocks once its owning job terminates
pub async fn finalize_message(
    pool: &SqlitePool,
    id: &str,
    content: &str,
    blocks: Option<&str>,
) -> Result<(), SqliteError> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query("UPDATE messages SET content = ?, blocks = ?, updated_at = ? WHERE id = ?")
        .bind(content)
        .bind(blocks)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sqlite::repositories::conversation::create_conversation;

    async fn test_pool() -> SqlitePool {
        use sqlx::sqlite::SqlitePoolOptions;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        create_conversation(&pool, "c1", "local", None).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_and_get_message() {
        let pool = test_pool().await;
        let msg = create_message(&pool, "m1", "c1", "user", "hello", None)
            .await
            .unwrap();
        assert_eq!(msg.role, "user");
        assert_eq!(msg.content, "hello");
        assert!(msg.blocks.is_none());
    }

    #[tokio::test]
    async fn test_append_content_then_finalize() {
        let pool = test_pool().await;
        create_message(&pool, "m1", "c1", "assistant", "", Some("job-1"))
            .await
            .unwrap();

        append_message_content(&pool, "m1", "Hel").await.unwrap();
        append_message_content(&pool, "m1", "lo").await.unwrap();
        let msg = get_message(&pool, "m1").await.unwrap().unwrap();
        assert_eq!(msg.content, "Hello");

        finalize_message(&pool, "m1", "Hello, done.", Some(r#"[{"type":"table"}]"#))
            .await
            .unwrap();
        let msg = get_message(&pool, "m1").await.unwrap().unwrap();
        assert_eq!(msg.content, "Hello, done.");
        assert_eq!(msg.blocks.as_deref(), Some(r#"[{"type":"table"}]"#));
    }

    #[tokio::test]
    async fn test_list_messages_ordered_by_creation() {
        let pool = test_pool().await;
        create_message(&pool, "m1", "c1", "user", "first", None)
            .await
            .unwrap();
        create_message(&pool, "m2", "c1", "assistant", "second", None)
            .await
            .unwrap();

        let messages = list_messages_for_conversation(&pool, "c1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "m1");
        assert_eq!(messages[1].id, "m2");
    }
}
