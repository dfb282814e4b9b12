//! Pipeline Engine (C6): the conversation state machine driving a single
//! assistant turn from classified intent through to a final response.
//!
//! `prepare` runs the stages that are identical whether the final answer
//! is generated whole or streamed (classify/retrieve/generate_query/
//! execute_query); `generate_whole_response` runs the remaining stages
//! (generate_response/extract_blocks) for the non-streaming path. The
//! Stream Driver (§4.7) consumes the same `PipelinePrep` for its path.

use crate::domain::adapters::{
    AdapterContainer, AdapterError, LlmMessage, LlmRequest, RetrievalHit, RetrievalRequest,
};
use crate::domain::blocks::{extract_blocks, Block};
use crate::domain::error::PipelineError;
use crate::domain::mock;
use crate::domain::visualization::{self, ClassifyInput};
use crate::core::constants::{DEFAULT_ANALYTICS_WINDOW_SECS, DEFAULT_RETRIEVAL_TOP_K, RETRIEVAL_CONTENT_TRUNCATE_CHARS};

/// Closed set of classified intents (§4.6.1), checked in this tie-break
/// order when more than one keyword group matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    AnalyticsQuery,
    Visualization,
    Code,
    Chat,
}

const ANALYTICS_KEYWORDS: &[&str] = &["query", "search", "spl", "splunk", "analytics", "stats"];
const VISUALIZATION_KEYWORDS: &[&str] = &["chart", "graph", "plot", "visualize", "dashboard"];
const CODE_KEYWORDS: &[&str] = &["code", "function", "script", "snippet"];

pub fn classify_intent(user_text: &str) -> Intent {
    let lowered = user_text.to_lowercase();
    if ANALYTICS_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::AnalyticsQuery
    } else if VISUALIZATION_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::Visualization
    } else if CODE_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        Intent::Code
    } else {
        Intent::Chat
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    pub streaming_enabled: bool,
    pub mock_enabled: bool,
}

#[derive(Debug, Clone)]
pub struct PipelinePrep {
    pub intent: Intent,
    pub retrieval_context: Option<String>,
    pub query_text: Option<String>,
    pub chart_block: Option<Block>,
    pub use_mock: bool,
    pub use_streaming: bool,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub content: String,
    pub blocks: Vec<Block>,
}

/// Run classify/retrieve/generate_query/execute_query (§4.6.1). A failed
/// analytics call is treated as a `partial` failure per §4.6.2: the stage
/// falls through with no chart block rather than aborting the pipeline.
pub async fn prepare(
    adapters: &AdapterContainer,
    config: &PipelineConfig,
    user_text: &str,
) -> Result<PipelinePrep, PipelineError> {
    let intent = classify_intent(user_text);
    let llm_available = adapters.llm.available().await;
    let use_mock = config.mock_enabled || !llm_available;

    if use_mock {
        return Ok(PipelinePrep {
            intent,
            retrieval_context: None,
            query_text: None,
            chart_block: None,
            use_mock: true,
            use_streaming: false,
        });
    }

    let mut retrieval_context = None;
    if matches!(intent, Intent::AnalyticsQuery | Intent::Visualization) && adapters.retrieval.available().await {
        match adapters
            .retrieval
            .retrieve(RetrievalRequest {
                query: user_text.to_string(),
                top_k: DEFAULT_RETRIEVAL_TOP_K,
            })
            .await
        {
            Ok(hits) => retrieval_context = Some(format_retrieval_context(&hits)),
            Err(e) => tracing::warn!(error = %e, "retrieval stage failed, continuing without context"),
        }
    }

    let mut query_text = None;
    if matches!(intent, Intent::AnalyticsQuery) {
        query_text = Some(generate_query(adapters, user_text, retrieval_context.as_deref()).await);
    }

    let mut chart_block = None;
    if let Some(query) = &query_text {
        let now = chrono::Utc::now().timestamp();
        match adapters.analytics.execute(query, now - DEFAULT_ANALYTICS_WINDOW_SECS, now).await {
            Ok(result) => {
                let input = ClassifyInput {
                    query,
                    fields: &result.fields,
                    rows: &result.rows,
                };
                chart_block = Some(visualization::build_visualization_block(&input, None));
            }
            Err(e) => {
                tracing::warn!(error = %e, "execute_query stage failed, continuing without a chart");
            }
        }
    }

    Ok(PipelinePrep {
        intent,
        retrieval_context,
        query_text,
        chart_block,
        use_mock: false,
        use_streaming: config.streaming_enabled,
    })
}

async fn generate_query(adapters: &AdapterContainer, user_text: &str, retrieval_context: Option<&str>) -> String {
    let mut system_prompt = "Produce a single analytics query string for the user's request. \
                              Respond with only the query."
        .to_string();
    if let Some(ctx) = retrieval_context {
        system_prompt.push_str("\n\nContext:\n");
        system_prompt.push_str(ctx);
    }

    let request = LlmRequest {
        system_prompt: Some(system_prompt),
        messages: vec![LlmMessage {
            role: "user".to_string(),
            content: user_text.to_string(),
        }],
    };

    match adapters.llm.call(request).await {
        Ok(response) => response.content.trim().to_string(),
        Err(e) => {
            tracing::warn!(error = %e, "LLM query generation failed, falling back to a templated query");
            templated_query(user_text)
        }
    }
}

fn templated_query(user_text: &str) -> String {
    format!("search {user_text} | stats count")
}

fn format_retrieval_context(hits: &[RetrievalHit]) -> String {
    hits.iter()
        .map(|hit| {
            let title = hit.metadata.get("title").and_then(|v| v.as_str()).unwrap_or("untitled");
            let index = hit.metadata.get("index").and_then(|v| v.as_str()).unwrap_or("unknown");
            let fields = hit
                .metadata
                .get("fields")
                .and_then(|v| v.as_array())
                .map(|a| a.iter().filter_map(|f| f.as_str()).collect::<Vec<_>>().join(", "))
                .unwrap_or_default();
            let truncated: String = hit.content.chars().take(RETRIEVAL_CONTENT_TRUNCATE_CHARS).collect();
            format!("[{title}] index={index} fields=[{fields}]\n{truncated}")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Run generate_response/extract_blocks for the non-streaming path,
/// plus emit-stage block assembly (query/chart blocks from `prepare`).
pub async fn generate_whole_response(
    adapters: &AdapterContainer,
    prep: &PipelinePrep,
    history: &[LlmMessage],
    user_text: &str,
) -> Result<PipelineOutcome, PipelineError> {
    if prep.use_mock {
        let (content, mut blocks) = mock::generate_mock_response(user_text);
        append_query_and_chart_blocks(prep, &mut blocks);
        return Ok(PipelineOutcome { content, blocks });
    }

    let mut messages = history.to_vec();
    messages.push(LlmMessage {
        role: "user".to_string(),
        content: user_text.to_string(),
    });
    let request = LlmRequest {
        system_prompt: build_system_prompt(prep.retrieval_context.as_deref()),
        messages,
    };

    let response = adapters.llm.call(request).await.map_err(PipelineError::from)?;
    let (content, mut blocks) = extract_blocks(&response.content);
    append_query_and_chart_blocks(prep, &mut blocks);
    Ok(PipelineOutcome { content, blocks })
}

fn append_query_and_chart_blocks(prep: &PipelinePrep, blocks: &mut Vec<Block>) {
    if let Some(query) = &prep.query_text {
        blocks.push(Block::query(query));
    }
    if let Some(chart) = &prep.chart_block {
        blocks.push(chart.clone());
    }
}

fn build_system_prompt(retrieval_context: Option<&str>) -> Option<String> {
    retrieval_context.map(|ctx| format!("Use the following context to answer the user:\n\n{ctx}"))
}

/// Classify whether an `AdapterError` should be treated as `partial`
/// (§7) rather than propagated — used by callers around the retrieval
/// and analytics stages specifically.
pub fn is_partial_tolerable(err: &AdapterError) -> bool {
    err.is_transient()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::adapters::analytics::{AnalyticsQueryResult, FakeAnalyticsAdapter};
    use crate::domain::adapters::llm::FakeLlmAdapter;
    use crate::domain::adapters::retrieval::FakeRetrievalAdapter;
    use std::sync::Arc;

    fn container(llm_available: bool, mock_enabled: bool) -> (AdapterContainer, PipelineConfig) {
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> = if llm_available {
            Arc::new(FakeLlmAdapter::new("a generated response"))
        } else {
            Arc::new(FakeLlmAdapter::unavailable())
        };
        let container = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );
        let config = PipelineConfig {
            streaming_enabled: true,
            mock_enabled,
        };
        (container, config)
    }

    #[test]
    fn test_classify_intent_tie_break_order() {
        assert_eq!(classify_intent("run this spl query"), Intent::AnalyticsQuery);
        assert_eq!(classify_intent("show me a chart"), Intent::Visualization);
        assert_eq!(classify_intent("write a function"), Intent::Code);
        assert_eq!(classify_intent("how are you"), Intent::Chat);
    }

    #[test]
    fn test_analytics_beats_visualization_on_tie() {
        assert_eq!(classify_intent("chart this query"), Intent::AnalyticsQuery);
    }

    #[tokio::test]
    async fn test_prepare_uses_mock_when_llm_unavailable() {
        let (adapters, config) = container(false, false);
        let prep = prepare(&adapters, &config, "hello").await.unwrap();
        assert!(prep.use_mock);
        assert!(!prep.use_streaming);
    }

    #[tokio::test]
    async fn test_prepare_uses_mock_when_config_flag_set() {
        let (adapters, config) = container(true, true);
        let prep = prepare(&adapters, &config, "hello").await.unwrap();
        assert!(prep.use_mock);
    }

    #[tokio::test]
    async fn test_prepare_real_path_sets_streaming_flag() {
        let (adapters, config) = container(true, false);
        let prep = prepare(&adapters, &config, "hello").await.unwrap();
        assert!(!prep.use_mock);
        assert!(prep.use_streaming);
    }

    #[tokio::test]
    async fn test_generate_whole_response_mock_path_scenario_five() {
        let (adapters, config) = container(false, false);
        let prep = prepare(&adapters, &config, "show chart bar").await.unwrap();
        let outcome = generate_whole_response(&adapters, &prep, &[], "show chart bar")
            .await
            .unwrap();
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(
            outcome.blocks[0].block_type,
            crate::domain::blocks::BlockType::SplunkChart
        );
    }

    #[tokio::test]
    async fn test_generate_whole_response_real_path_extracts_blocks() {
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> =
            Arc::new(FakeLlmAdapter::new("Here you go:\n```query\nindex=main\n```"));
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );
        let config = PipelineConfig {
            streaming_enabled: false,
            mock_enabled: false,
        };
        let prep = prepare(&adapters, &config, "hello").await.unwrap();
        let outcome = generate_whole_response(&adapters, &prep, &[], "hello").await.unwrap();
        assert_eq!(outcome.blocks.len(), 1);
        assert_eq!(outcome.blocks[0].block_type, crate::domain::blocks::BlockType::Query);
    }

    #[tokio::test]
    async fn test_execute_query_failure_is_partial_not_fatal() {
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> =
            Arc::new(FakeLlmAdapter::new("index=main | stats count"));
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::unavailable()),
        );
        let config = PipelineConfig {
            streaming_enabled: false,
            mock_enabled: false,
        };
        let prep = prepare(&adapters, &config, "run a query please").await.unwrap();
        assert!(prep.chart_block.is_none());
        assert!(prep.query_text.is_some());
    }

    #[tokio::test]
    async fn test_execute_query_success_builds_chart_block() {
        let mut row = serde_json::Map::new();
        row.insert("_time".to_string(), serde_json::json!(1_700_000_000));
        row.insert("count".to_string(), serde_json::json!(5));
        let llm: Arc<dyn crate::domain::adapters::LlmAdapter> =
            Arc::new(FakeLlmAdapter::new("index=main | timechart count"));
        let adapters = AdapterContainer::new(
            llm,
            Arc::new(FakeRetrievalAdapter::unavailable()),
            Arc::new(FakeAnalyticsAdapter::new(AnalyticsQueryResult {
                columns: vec!["_time".to_string(), "count".to_string()],
                fields: vec!["_time".to_string(), "count".to_string()],
                rows: vec![row],
                preview: false,
            })),
        );
        let config = PipelineConfig {
            streaming_enabled: false,
            mock_enabled: false,
        };
        let prep = prepare(&adapters, &config, "timechart my query").await.unwrap();
        assert!(prep.chart_block.is_some());
    }
}
