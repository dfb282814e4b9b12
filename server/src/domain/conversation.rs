//! Conversation/Message orchestrator: wraps the SQLite repositories,
//! touching the owning conversation on every append and presenting the
//! wire-level shape (parsed `Block`s) the API layer serializes.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::constants::DEFAULT_MAX_CONVERSATION_HISTORY;
use crate::data::sqlite::repositories::conversation as conversation_repo;
use crate::data::sqlite::repositories::message as message_repo;
use crate::domain::blocks::Block;
use crate::domain::error::PipelineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl From<conversation_repo::ConversationRow> for Conversation {
    fn from(row: conversation_repo::ConversationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub blocks: Option<Vec<Block>>,
    pub job_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Message {
    fn from_row(row: message_repo::MessageRow) -> Result<Self, PipelineError> {
        let role = MessageRole::parse(&row.role)
            .ok_or_else(|| PipelineError::Invariant(format!("unknown message role {}", row.role)))?;
        let blocks = row
            .blocks
            .map(|b| serde_json::from_str::<Vec<Block>>(&b))
            .transpose()
            .map_err(|e| PipelineError::Invariant(format!("malformed message blocks: {e}")))?;

        Ok(Self {
            id: row.id,
            conversation_id: row.conversation_id,
            role,
            content: row.content,
            blocks,
            job_id: row.job_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct ConversationService {
    pool: SqlitePool,
}

impl ConversationService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create_conversation(
        &self,
        user_id: &str,
        title: Option<&str>,
    ) -> Result<Conversation, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let row = conversation_repo::create_conversation(&self.pool, &id, user_id, title).await?;
        Ok(row.into())
    }

    pub async fn get_conversation(&self, id: &str) -> Result<Conversation, PipelineError> {
        let row = conversation_repo::get_conversation(&self.pool, id)
            .await?
            .ok_or_else(|| PipelineError::NotFound(format!("conversation {id}")))?;
        Ok(row.into())
    }

    pub async fn list_conversations_for_user(&self, user_id: &str) -> Result<Vec<Conversation>, PipelineError> {
        let rows = conversation_repo::list_conversations_for_user(&self.pool, user_id).await?;
        Ok(rows.into_iter().map(Conversation::from).collect())
    }

    pub async fn delete_conversation(&self, id: &str) -> Result<(), PipelineError> {
        let deleted = conversation_repo::delete_conversation(&self.pool, id).await?;
        if !deleted {
            return Err(PipelineError::NotFound(format!("conversation {id}")));
        }
        Ok(())
    }

    /// Append a finished user message and touch the conversation.
    pub async fn append_user_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> Result<Message, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let row = message_repo::create_message(&self.pool, &id, conversation_id, "user", content, None)
            .await?;
        conversation_repo::touch_conversation(&self.pool, conversation_id).await?;
        Message::from_row(row)
    }

    /// Append a finished assistant message supplied whole by the caller
    /// (§6: a message create request with `role: assistant`), rather than
    /// one produced by the Pipeline Engine or Stream Driver. Carries no
    /// job — only pipeline-generated assistant turns do.
    pub async fn append_assistant_message(
        &self,
        conversation_id: &str,
        content: &str,
        blocks: &[Block],
    ) -> Result<Message, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let row = message_repo::create_message(&self.pool, &id, conversation_id, "assistant", content, None)
            .await?;
        conversation_repo::touch_conversation(&self.pool, conversation_id).await?;
        let message = Message::from_row(row)?;
        if blocks.is_empty() {
            Ok(message)
        } else {
            self.finalize_message(&message.id, content, blocks).await?;
            Ok(Message {
                blocks: Some(blocks.to_vec()),
                ..message
            })
        }
    }

    /// Create an empty assistant message tied to a streaming job, before
    /// any tokens have arrived (§4.7 step 1).
    pub async fn append_assistant_placeholder(
        &self,
        conversation_id: &str,
        job_id: &str,
    ) -> Result<Message, PipelineError> {
        let id = Uuid::new_v4().to_string();
        let row =
            message_repo::create_message(&self.pool, &id, conversation_id, "assistant", "", Some(job_id))
                .await?;
        conversation_repo::touch_conversation(&self.pool, conversation_id).await?;
        Message::from_row(row)
    }

    pub async fn append_token(&self, message_id: &str, token: &str) -> Result<(), PipelineError> {
        message_repo::append_message_content(&self.pool, message_id, token).await?;
        Ok(())
    }

    /// Freeze a message's final content and blocks once its job terminates
    /// (§3: blocks are set once).
    pub async fn finalize_message(
        &self,
        message_id: &str,
        content: &str,
        blocks: &[Block],
    ) -> Result<(), PipelineError> {
        let blocks_json = if blocks.is_empty() {
            None
        } else {
            Some(
                serde_json::to_string(blocks)
                    .map_err(|e| PipelineError::Invariant(format!("failed to serialize blocks: {e}")))?,
            )
        };
        message_repo::finalize_message(&self.pool, message_id, content, blocks_json.as_deref()).await?;
        Ok(())
    }

    pub async fn list_messages(&self, conversation_id: &str) -> Result<Vec<Message>, PipelineError> {
        let rows = message_repo::list_messages_for_conversation(&self.pool, conversation_id).await?;
        rows.into_iter().map(Message::from_row).collect()
    }

    /// Last `DEFAULT_MAX_CONVERSATION_HISTORY` messages, oldest first, used
    /// to build the LLM adapter's prompt context.
    pub async fn recent_history(&self, conversation_id: &str) -> Result<Vec<Message>, PipelineError> {
        let mut messages = self.list_messages(conversation_id).await?;
        if messages.len() > DEFAULT_MAX_CONVERSATION_HISTORY {
            messages = messages.split_off(messages.len() - DEFAULT_MAX_CONVERSATION_HISTORY);
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        use sqlx::sqlite::SqlitePoolOptions;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await.unwrap();
        sqlx::query(crate::data::sqlite::schema::SCHEMA)
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn test_create_conversation_and_append_user_message() {
        let service = ConversationService::new(test_pool().await);
        let convo = service.create_conversation("local", None).await.unwrap();
        let message = service.append_user_message(&convo.id, "hello").await.unwrap();
        assert_eq!(message.role, MessageRole::User);
        assert_eq!(message.content, "hello");
    }

    #[tokio::test]
    async fn test_append_message_touches_conversation_updated_at() {
        let service = ConversationService::new(test_pool().await);
        let convo = service.create_conversation("local", None).await.unwrap();
        let before = service.get_conversation(&convo.id).await.unwrap().updated_at;

        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        service.append_user_message(&convo.id, "hi").await.unwrap();

        let after = service.get_conversation(&convo.id).await.unwrap().updated_at;
        assert!(after >= before);
    }

    #[tokio::test]
    async fn test_streaming_placeholder_then_finalize_sets_blocks_once() {
        let service = ConversationService::new(test_pool().await);
        let convo = service.create_conversation("local", None).await.unwrap();
        let placeholder = service
            .append_assistant_placeholder(&convo.id, "job-1")
            .await
            .unwrap();

        service.append_token(&placeholder.id, "Hel").await.unwrap();
        service.append_token(&placeholder.id, "lo").await.unwrap();

        let blocks = vec![Block::query("index=main | stats count")];
        service
            .finalize_message(&placeholder.id, "Hello, done.", &blocks)
            .await
            .unwrap();

        let messages = service.list_messages(&convo.id).await.unwrap();
        let finalized = messages.iter().find(|m| m.id == placeholder.id).unwrap();
        assert_eq!(finalized.content, "Hello, done.");
        assert_eq!(finalized.blocks.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_recent_history_truncates_to_max() {
        let service = ConversationService::new(test_pool().await);
        let convo = service.create_conversation("local", None).await.unwrap();
        for i in 0..(DEFAULT_MAX_CONVERSATION_HISTORY + 5) {
            service
                .append_user_message(&convo.id, &format!("message {i}"))
                .await
                .unwrap();
        }
        let history = service.recent_history(&convo.id).await.unwrap();
        assert_eq!(history.len(), DEFAULT_MAX_CONVERSATION_HISTORY);
        assert_eq!(history.last().unwrap().content, format!("message {}", DEFAULT_MAX_CONVERSATION_HISTORY + 4));
    }

    #[tokio::test]
    async fn test_delete_missing_conversation_is_not_found() {
        let service = ConversationService::new(test_pool().await);
        let err = service.delete_conversation("missing").await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_append_assistant_message_carries_no_job_and_sets_blocks() {
        let service = ConversationService::new(test_pool().await);
        let convo = service.create_conversation("local", None).await.unwrap();
        let blocks = vec![Block::code("rust", "fn main() {}")];
        let message = service
            .append_assistant_message(&convo.id, "here's the code", &blocks)
            .await
            .unwrap();

        assert_eq!(message.role, MessageRole::Assistant);
        assert!(message.job_id.is_none());
        assert_eq!(message.blocks.unwrap().len(), 1);
    }
}
