//! Stream Driver (C7): drives a single streamed assistant turn (§4.7).
//!
//! Persists a placeholder message, consumes the LLM adapter's chunk
//! stream while republishing each chunk as a `stream.token` event,
//! then finalizes the message and job on end-of-stream. On a mid-stream
//! adapter error the accumulated content is kept — never discarded —
//! and the job is failed rather than left in progress.

use futures::StreamExt;

use crate::core::constants::{TOPIC_JOB_UPDATE, TOPIC_MESSAGE_NEW, TOPIC_STREAM_END, TOPIC_STREAM_START, TOPIC_STREAM_TOKEN};
use crate::domain::adapters::{AdapterContainer, LlmMessage, LlmRequest};
use crate::domain::blocks::{extract_blocks, Block};
use crate::domain::conversation::ConversationService;
use crate::domain::error::PipelineError;
use crate::domain::events::EventBus;
use crate::domain::job::JobStore;
use crate::domain::pipeline::PipelinePrep;

pub struct StreamDriver<'a> {
    pub adapters: &'a AdapterContainer,
    pub conversations: &'a ConversationService,
    pub jobs: &'a JobStore,
    pub events: &'a EventBus,
}

impl<'a> StreamDriver<'a> {
    pub fn new(
        adapters: &'a AdapterContainer,
        conversations: &'a ConversationService,
        jobs: &'a JobStore,
        events: &'a EventBus,
    ) -> Self {
        Self {
            adapters,
            conversations,
            jobs,
            events,
        }
    }

    /// Run the full §4.7 flow for one assistant turn and return the final
    /// message id. Errors from persistence/job bookkeeping propagate;
    /// adapter streaming errors are handled internally (step 5) and do
    /// not return `Err`.
    pub async fn run(
        &self,
        conversation_id: &str,
        job_id: &str,
        prep: &PipelinePrep,
        history: &[LlmMessage],
        user_text: &str,
    ) -> Result<String, PipelineError> {
        // Step 1: persist placeholder assistant message.
        let placeholder = self
            .conversations
            .append_assistant_placeholder(conversation_id, job_id)
            .await?;

        // Step 2: publish stream.start.
        self.events.publish(
            TOPIC_STREAM_START,
            serde_json::json!({
                "job_id": job_id,
                "conversation_id": conversation_id,
                "message_id": placeholder.id,
            }),
        );

        let system_prompt = prep
            .retrieval_context
            .as_deref()
            .map(|ctx| format!("Use the following context to answer the user:\n\n{ctx}"));
        let mut messages = history.to_vec();
        messages.push(LlmMessage {
            role: "user".to_string(),
            content: user_text.to_string(),
        });
        let request = LlmRequest {
            system_prompt,
            messages,
        };

        let stream_result = self.adapters.llm.call_stream(request).await;

        let mut stream = match stream_result {
            Ok(stream) => stream,
            Err(e) => {
                return self.fail_mid_stream(&placeholder.id, job_id, conversation_id, "", &e.to_string()).await;
            }
        };

        // Step 3: consume chunks, appending and republishing each.
        let mut accumulated = String::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(text) => {
                    accumulated.push_str(&text);
                    self.conversations.append_token(&placeholder.id, &text).await?;
                    self.events.publish(
                        TOPIC_STREAM_TOKEN,
                        serde_json::json!({
                            "job_id": job_id,
                            "message_id": placeholder.id,
                            "token": text,
                        }),
                    );
                }
                Err(e) => {
                    return self
                        .fail_mid_stream(&placeholder.id, job_id, conversation_id, &accumulated, &e.to_string())
                        .await;
                }
            }
        }

        // Step 4: end-of-stream — extract blocks, finalize, complete.
        let (content, mut blocks) = extract_blocks(&accumulated);
        if let Some(query) = &prep.query_text {
            blocks.push(Block::query(query));
        }
        if let Some(chart) = &prep.chart_block {
            blocks.push(chart.clone());
        }

        self.conversations
            .finalize_message(&placeholder.id, &content, &blocks)
            .await?;
        self.jobs
            .complete(job_id, &serde_json::json!({"message_id": placeholder.id}))
            .await?;

        self.events.publish(
            TOPIC_STREAM_END,
            serde_json::json!({
                "job_id": job_id,
                "message_id": placeholder.id,
                "ok": true,
            }),
        );
        self.events.publish(
            TOPIC_MESSAGE_NEW,
            serde_json::json!({
                "conversation_id": conversation_id,
                "message_id": placeholder.id,
            }),
        );

        Ok(placeholder.id)
    }

    /// Step 5: a mid-stream error persists whatever text accumulated so
    /// far, fails the job, and still publishes `stream.end` — the client
    /// must be told the stream is over even though it ended badly.
    async fn fail_mid_stream(
        &self,
        message_id: &str,
        job_id: &str,
        conversation_id: &str,
        accumulated: &str,
        error_text: &str,
    ) -> Result<String, PipelineError> {
        let (content, blocks) = extract_blocks(accumulated);
        self.conversations.finalize_message(message_id, &content, &blocks).await?;
        self.jobs.fail(job_id, error_text).await?;

        self.events.publish(
            TOPIC_STREAM_END,
            serde_json::json!({
                "job_id": job_id,
                "message_id": message_id,
                "ok": false,
                "error": error_text,
            }),
        );
        self.events.publish(
            TOPIC_JOB_UPDATE,
            serde_json::json!({
                "job_id": job_id,
                "conversation_id": conversation_id,
                "status": "failed",
                "error": error_text,
            }),
        );

        Ok(message_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::adapters::analytics::FakeAnalyticsAdapter;
    use crate::domain::adapters::llm::FakeLlmAdapter;
    use crate::domain::adapters::retrieval::FakeRetrievalAdapter;
    use crate::domain::job::JobType;
    use crate::domain::pipeline::Intent;
    use sqlx::SqlitePool;
    use std::sync::Arc;

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
        pool
    }

    fn prep(query_text: Option<String>) -> PipelinePrep {
        PipelinePrep {
            intent: Intent::Chat,
            retrieval_context: None,
            query_text,
            chart_block: None,
            use_mock: false,
            use_streaming: true,
        }
    }

    #[tokio::test]
    async fn test_successful_stream_persists_full_accumulation() {
        let pool = test_pool().await;
        let conversations = ConversationService::new(pool.clone());
        let jobs = JobStore::new(pool.clone());
        let events = EventBus::new();
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> = Arc::new(FakeLlmAdapter::new("hello world"));
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );

        let convo = conversations.create_conversation("local", None).await.unwrap();
        jobs.create("job-1", JobType::AssistantResponse, Some(&convo.id), &serde_json::json!({}))
            .await
            .unwrap();
        jobs.advance("job-1", crate::domain::job::JobStatus::Started, 0).await.unwrap();

        let driver = StreamDriver::new(&adapters, &conversations, &jobs, &events);
        let message_id = driver
            .run(&convo.id, "job-1", &prep(None), &[], "say hi")
            .await
            .unwrap();

        let messages = conversations.list_messages(&convo.id).await.unwrap();
        let finalized = messages.iter().find(|m| m.id == message_id).unwrap();
        assert_eq!(finalized.content, "hello world");

        let job = jobs.get("job-1").await.unwrap();
        assert_eq!(job.status, crate::domain::job::JobStatus::Completed);
    }

    #[tokio::test]
    async fn test_query_and_chart_blocks_attached_on_completion() {
        let pool = test_pool().await;
        let conversations = ConversationService::new(pool.clone());
        let jobs = JobStore::new(pool.clone());
        let events = EventBus::new();
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> = Arc::new(FakeLlmAdapter::new("done"));
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );

        let convo = conversations.create_conversation("local", None).await.unwrap();
        jobs.create("job-2", JobType::AssistantResponse, Some(&convo.id), &serde_json::json!({}))
            .await
            .unwrap();
        jobs.advance("job-2", crate::domain::job::JobStatus::Started, 0).await.unwrap();

        let driver = StreamDriver::new(&adapters, &conversations, &jobs, &events);
        let message_id = driver
            .run(&convo.id, "job-2", &prep(Some("index=main | stats count".to_string())), &[], "run a query")
            .await
            .unwrap();

        let messages = conversations.list_messages(&convo.id).await.unwrap();
        let finalized = messages.iter().find(|m| m.id == message_id).unwrap();
        assert_eq!(finalized.blocks.as_ref().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial_content_and_fails_job() {
        let pool = test_pool().await;
        let conversations = ConversationService::new(pool.clone());
        let jobs = JobStore::new(pool.clone());
        let events = EventBus::new();
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> = Arc::new(FailingMidStreamAdapter);
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );

        let convo = conversations.create_conversation("local", None).await.unwrap();
        jobs.create("job-3", JobType::AssistantResponse, Some(&convo.id), &serde_json::json!({}))
            .await
            .unwrap();
        jobs.advance("job-3", crate::domain::job::JobStatus::Started, 0).await.unwrap();

        let driver = StreamDriver::new(&adapters, &conversations, &jobs, &events);
        let message_id = driver
            .run(&convo.id, "job-3", &prep(None), &[], "say hi")
            .await
            .unwrap();

        let messages = conversations.list_messages(&convo.id).await.unwrap();
        let finalized = messages.iter().find(|m| m.id == message_id).unwrap();
        assert_eq!(finalized.content, "partial ");

        let job = jobs.get("job-3").await.unwrap();
        assert_eq!(job.status, crate::domain::job::JobStatus::Failed);
        assert!(job.error.is_some());
    }

    struct FailingMidStreamAdapter;

    #[async_trait::async_trait]
    impl crate::domain::adapters::LlmAdapter for FailingMidStreamAdapter {
        async fn available(&self) -> bool {
            true
        }

        async fn call(
            &self,
            _request: LlmRequest,
        ) -> Result<crate::domain::adapters::LlmResponse, crate::domain::adapters::AdapterError> {
            unreachable!("test only exercises call_stream")
        }

        async fn call_stream(
            &self,
            _request: LlmRequest,
        ) -> Result<
            futures::stream::BoxStream<'static, Result<String, crate::domain::adapters::AdapterError>>,
            crate::domain::adapters::AdapterError,
        > {
            use futures::stream;
            let chunks: Vec<Result<String, crate::domain::adapters::AdapterError>> = vec![
                Ok("partial ".to_string()),
                Err(crate::domain::adapters::AdapterError::Transport("connection reset".to_string())),
            ];
            Ok(stream::iter(chunks).boxed())
        }
    }
}
