//! Conversation and message endpoints (§6).
//!
//! `POST .../messages` is the "create message in conversation" external
//! interface: a `role: user` message always spawns an assistant-response
//! job on the Task Scheduler and returns its id; a `role: assistant`
//! message is appended and broadcast as-is, with no job (only assistant
//! messages are broadcast — the caller already has the user message it
//! just sent).

use axum::extract::{Extension, Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::auth::AuthContext;
use crate::api::state::ApiState;
use crate::api::types::ApiError;
use crate::core::constants::{TOPIC_JOB_UPDATE, TOPIC_MESSAGE_NEW};
use crate::domain::adapters::LlmMessage;
use crate::domain::blocks::Block;
use crate::domain::conversation::{Conversation, Message, MessageRole};
use crate::domain::job::JobType;
use crate::domain::pipeline;
use crate::domain::stream_driver::StreamDriver;

pub fn routes() -> Router<ApiState> {
    Router::new()
        .route("/conversations", get(list_conversations).post(create_conversation))
        .route("/conversations/{id}", axum::routing::delete(delete_conversation))
        .route("/conversations/{id}/messages", get(list_messages).post(create_message))
}

#[derive(Serialize)]
struct ConversationDto {
    id: String,
    user_id: String,
    title: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<Conversation> for ConversationDto {
    fn from(c: Conversation) -> Self {
        Self {
            id: c.id,
            user_id: c.user_id,
            title: c.title,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

#[derive(Serialize)]
struct MessageDto {
    id: String,
    conversation_id: String,
    role: String,
    content: String,
    blocks: Option<Vec<Block>>,
    job_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<Message> for MessageDto {
    fn from(m: Message) -> Self {
        Self {
            id: m.id,
            conversation_id: m.conversation_id,
            role: m.role.as_str().to_string(),
            content: m.content,
            blocks: m.blocks,
            job_id: m.job_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

#[derive(Deserialize)]
struct CreateConversationRequest {
    title: Option<String>,
}

async fn create_conversation(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
    Json(request): Json<CreateConversationRequest>,
) -> Result<Json<ConversationDto>, ApiError> {
    let convo = state
        .conversations
        .create_conversation(&auth.user_id, request.title.as_deref())
        .await?;
    Ok(Json(convo.into()))
}

async fn list_conversations(
    State(state): State<ApiState>,
    Extension(auth): Extension<AuthContext>,
) -> Result<Json<Vec<ConversationDto>>, ApiError> {
    let convos = state.conversations.list_conversations_for_user(&auth.user_id).await?;
    Ok(Json(convos.into_iter().map(ConversationDto::from).collect()))
}

async fn delete_conversation(State(state): State<ApiState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    state.conversations.delete_conversation(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_messages(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<MessageDto>>, ApiError> {
    let messages = state.conversations.list_messages(&id).await?;
    Ok(Json(messages.into_iter().map(MessageDto::from).collect()))
}

#[derive(Deserialize)]
struct CreateMessageRequest {
    content: String,
    role: String,
    #[serde(default)]
    blocks: Vec<Block>,
}

#[derive(Serialize)]
struct CreateMessageResponse {
    message: MessageDto,
    job_id: Option<String>,
}

async fn create_message(
    State(state): State<ApiState>,
    Path(conversation_id): Path<String>,
    Json(request): Json<CreateMessageRequest>,
) -> Result<Json<CreateMessageResponse>, ApiError> {
    let role = MessageRole::parse(&request.role)
        .ok_or_else(|| ApiError::BadInput(format!("unknown message role '{}'", request.role)))?;

    if matches!(role, MessageRole::Assistant) {
        let message = state
            .conversations
            .append_assistant_message(&conversation_id, &request.content, &request.blocks)
            .await?;
        state.events.publish(
            TOPIC_MESSAGE_NEW,
            serde_json::json!({ "conversation_id": conversation_id, "message_id": message.id }),
        );
        return Ok(Json(CreateMessageResponse {
            message: message.into(),
            job_id: None,
        }));
    }

    let user_message = state
        .conversations
        .append_user_message(&conversation_id, &request.content)
        .await?;

    let job_id = Uuid::new_v4().to_string();
    state
        .jobs
        .create(
            &job_id,
            JobType::AssistantResponse,
            Some(&conversation_id),
            &serde_json::json!({ "content": request.content }),
        )
        .await?;
    state
        .jobs
        .advance(&job_id, crate::domain::job::JobStatus::Started, 0)
        .await?;
    state.events.publish(
        TOPIC_JOB_UPDATE,
        serde_json::json!({ "job_id": job_id, "conversation_id": conversation_id, "status": "started" }),
    );

    spawn_assistant_turn(&state, conversation_id.clone(), job_id.clone(), request.content.clone());

    Ok(Json(CreateMessageResponse {
        message: user_message.into(),
        job_id: Some(job_id),
    }))
}

/// Run the Pipeline Engine (and, when streaming, the Stream Driver) for
/// one assistant turn on the Task Scheduler's bounded worker pool.
fn spawn_assistant_turn(state: &ApiState, conversation_id: String, job_id: String, user_text: String) {
    let adapters = state.adapters.clone();
    let conversations = state.conversations.clone();
    let jobs = state.jobs.clone();
    let events = state.events.clone();
    let pipeline_config = state.pipeline_config;

    state.scheduler.spawn(job_id.clone(), move |_cancel| async move {
        let history = match conversations.recent_history(&conversation_id).await {
            Ok(messages) => messages
                .iter()
                .map(|m| LlmMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect::<Vec<_>>(),
            Err(e) => {
                fail_job(&jobs, &events, &job_id, &conversation_id, &e.to_string()).await;
                return;
            }
        };

        let prep = match pipeline::prepare(&adapters, &pipeline_config, &user_text).await {
            Ok(prep) => prep,
            Err(e) => {
                fail_job(&jobs, &events, &job_id, &conversation_id, &e.to_string()).await;
                return;
            }
        };

        if prep.use_streaming {
            let driver = StreamDriver::new(&adapters, &conversations, &jobs, &events);
            if let Err(e) = driver.run(&conversation_id, &job_id, &prep, &history, &user_text).await {
                fail_job(&jobs, &events, &job_id, &conversation_id, &e.to_string()).await;
            }
            return;
        }

        match pipeline::generate_whole_response(&adapters, &prep, &history, &user_text).await {
            Ok(outcome) => {
                match conversations
                    .append_assistant_message(&conversation_id, &outcome.content, &outcome.blocks)
                    .await
                {
                    Ok(message) => {
                        if let Err(e) = jobs
                            .complete(&job_id, &serde_json::json!({ "message_id": message.id }))
                            .await
                        {
                            tracing::warn!(job_id = %job_id, error = %e, "failed to mark job completed");
                        }
                        events.publish(
                            TOPIC_JOB_UPDATE,
                            serde_json::json!({
                                "job_id": job_id,
                                "conversation_id": conversation_id,
                                "status": "completed",
                            }),
                        );
                        events.publish(
                            TOPIC_MESSAGE_NEW,
                            serde_json::json!({ "conversation_id": conversation_id, "message_id": message.id }),
                        );
                    }
                    Err(e) => fail_job(&jobs, &events, &job_id, &conversation_id, &e.to_string()).await,
                }
            }
            Err(e) => fail_job(&jobs, &events, &job_id, &conversation_id, &e.to_string()).await,
        }
    });
}

async fn fail_job(
    jobs: &crate::domain::job::JobStore,
    events: &crate::domain::events::EventBus,
    job_id: &str,
    conversation_id: &str,
    error: &str,
) {
    if let Err(e) = jobs.fail(job_id, error).await {
        tracing::warn!(job_id = %job_id, error = %e, "failed to mark job failed");
    }
    events.publish(
        TOPIC_JOB_UPDATE,
        serde_json::json!({
            "job_id": job_id,
            "conversation_id": conversation_id,
            "status": "failed",
            "error": error,
        }),
    );
}
