//! LLM adapter: chat completion generation, whole-response and streaming.

use async_trait::async_trait;
use aws_sdk_bedrockruntime::types::{
    ContentBlock, ConversationRole, ConverseStreamOutput, Message, SystemContentBlock,
};
use futures::stream::BoxStream;
use futures::StreamExt;

use crate::core::constants::{ADAPTER_MAX_RETRY_ATTEMPTS, ADAPTER_RETRY_BASE_DELAY_MS};
use crate::domain::adapters::{retry_for_value, AdapterError};

#[derive(Debug, Clone)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub system_prompt: Option<String>,
    pub messages: Vec<LlmMessage>,
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
}

/// Generates chat completions. `call_stream` yields a lazy, finite,
/// non-restartable sequence of text chunks (§4.7) — dropping it mid-stream
/// is how the caller cancels generation.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn available(&self) -> bool;
    async fn call(&self, request: LlmRequest) -> Result<LlmResponse, AdapterError>;
    async fn call_stream(
        &self,
        request: LlmRequest,
    ) -> Result<BoxStream<'static, Result<String, AdapterError>>, AdapterError>;
}

fn to_conversation_role(role: &str) -> ConversationRole {
    if role.eq_ignore_ascii_case("assistant") {
        ConversationRole::Assistant
    } else {
        ConversationRole::User
    }
}

fn build_messages(request: &LlmRequest) -> Result<Vec<Message>, AdapterError> {
    request
        .messages
        .iter()
        .map(|m| {
            Message::builder()
                .role(to_conversation_role(&m.role))
                .content(ContentBlock::Text(m.content.clone()))
                .build()
                .map_err(|e| AdapterError::BadRequest(e.to_string()))
        })
        .collect()
}

fn extract_text(output: aws_sdk_bedrockruntime::types::ConverseOutput) -> Result<String, AdapterError> {
    let message = match output {
        aws_sdk_bedrockruntime::types::ConverseOutput::Message(message) => message,
        other => return Err(AdapterError::BadResponse(format!("unexpected output variant: {other:?}"))),
    };
    let text = message
        .content()
        .iter()
        .filter_map(|block| block.as_text().ok())
        .cloned()
        .collect::<Vec<_>>()
        .join("");
    if text.is_empty() {
        Err(AdapterError::BadResponse("empty model response".to_string()))
    } else {
        Ok(text)
    }
}

/// Real adapter backed by Amazon Bedrock's Converse API.
pub struct BedrockLlmAdapter {
    client: aws_sdk_bedrockruntime::Client,
    model_id: String,
}

impl BedrockLlmAdapter {
    pub fn new(client: aws_sdk_bedrockruntime::Client, model_id: impl Into<String>) -> Self {
        Self {
            client,
            model_id: model_id.into(),
        }
    }

    pub async fn from_env(model_id: impl Into<String>) -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_bedrockruntime::Client::new(&config), model_id)
    }
}

#[async_trait]
impl LlmAdapter for BedrockLlmAdapter {
    async fn available(&self) -> bool {
        // Bedrock has no lightweight health-check endpoint; a constructed
        // client with resolved credentials is treated as available, and
        // individual call failures surface through `call`/`call_stream`.
        true
    }

    async fn call(&self, request: LlmRequest) -> Result<LlmResponse, AdapterError> {
        let messages = build_messages(&request)?;
        let system_prompt = request.system_prompt.clone();

        let content = retry_for_value(ADAPTER_MAX_RETRY_ATTEMPTS, ADAPTER_RETRY_BASE_DELAY_MS, || {
            let messages = messages.clone();
            let system_prompt = system_prompt.clone();
            async {
                let mut builder = self.client.converse().model_id(&self.model_id);
                for m in messages {
                    builder = builder.messages(m);
                }
                if let Some(sp) = system_prompt {
                    builder = builder.system(SystemContentBlock::Text(sp));
                }
                let response = builder
                    .send()
                    .await
                    .map_err(|e| AdapterError::Transport(e.to_string()))?;
                let output = response
                    .output
                    .ok_or_else(|| AdapterError::BadResponse("missing converse output".to_string()))?;
                extract_text(output)
            }
        })
        .await?;

        Ok(LlmResponse { content })
    }

    async fn call_stream(
        &self,
        request: LlmRequest,
    ) -> Result<BoxStream<'static, Result<String, AdapterError>>, AdapterError> {
        let messages = build_messages(&request)?;
        let mut builder = self.client.converse_stream().model_id(&self.model_id);
        for m in messages {
            builder = builder.messages(m);
        }
        if let Some(sp) = request.system_prompt {
            builder = builder.system(SystemContentBlock::Text(sp));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        let stream = async_stream::stream! {
            let mut event_stream = response.stream;
            loop {
                match event_stream.recv().await {
                    Ok(Some(ConverseStreamOutput::ContentBlockDelta(delta))) => {
                        if let Some(aws_sdk_bedrockruntime::types::ContentBlockDelta::Text(text)) = delta.delta {
                            yield Ok(text);
                        }
                    }
                    Ok(Some(ConverseStreamOutput::MessageStop(_))) | Ok(None) => break,
                    Ok(Some(_)) => continue,
                    Err(e) => {
                        yield Err(AdapterError::Transport(e.to_string()));
                        break;
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

/// Deterministic in-memory stand-in for tests and for the mock pipeline
/// path's own tests (§13: fake adapter implementations of the same traits).
pub struct FakeLlmAdapter {
    pub available: bool,
    pub response: String,
}

impl FakeLlmAdapter {
    pub fn new(response: impl Into<String>) -> Self {
        Self {
            available: true,
            response: response.into(),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            available: false,
            response: String::new(),
        }
    }
}

#[async_trait]
impl LlmAdapter for FakeLlmAdapter {
    async fn available(&self) -> bool {
        self.available
    }

    async fn call(&self, _request: LlmRequest) -> Result<LlmResponse, AdapterError> {
        if !self.available {
            return Err(AdapterError::Unavailable("fake adapter offline".to_string()));
        }
        Ok(LlmResponse {
            content: self.response.clone(),
        })
    }

    async fn call_stream(
        &self,
        _request: LlmRequest,
    ) -> Result<BoxStream<'static, Result<String, AdapterError>>, AdapterError> {
        if !self.available {
            return Err(AdapterError::Unavailable("fake adapter offline".to_string()));
        }
        let chunks: Vec<Result<String, AdapterError>> =
            self.response.split_whitespace().map(|w| Ok(format!("{w} "))).collect();
        Ok(futures::stream::iter(chunks).boxed())
    }
}
