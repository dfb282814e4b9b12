//! Block taxonomy (§6) and `extract_blocks` stage (§4.6.1)
//!
//! Blocks are heterogeneous tagged records attached to assistant
//! messages for rich rendering. The taxonomy is a closed set; matching
//! on `BlockType` is exhaustive so a new variant forces a compile-time
//! review of every call site.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Closed set of block kinds (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockType {
    Query,
    Code,
    Table,
    Chart,
    #[serde(rename = "splunk-chart")]
    SplunkChart,
    JsonExplorer,
    Timeline,
    Alert,
    FormViewer,
    FileUploadDownload,
    Checklist,
    Diagram,
    SearchFilter,
}

impl BlockType {
    /// Parse a tag string as it would appear in a fenced JSON descriptor
    /// or a wire payload (`"chart"`, `"splunk-chart"`, `"json-explorer"`, ...).
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "query" => Self::Query,
            "code" => Self::Code,
            "table" => Self::Table,
            "chart" => Self::Chart,
            "splunk-chart" => Self::SplunkChart,
            "json-explorer" => Self::JsonExplorer,
            "timeline" => Self::Timeline,
            "alert" => Self::Alert,
            "form-viewer" => Self::FormViewer,
            "file-upload-download" => Self::FileUploadDownload,
            "checklist" => Self::Checklist,
            "diagram" => Self::Diagram,
            "search-filter" => Self::SearchFilter,
            _ => return None,
        })
    }
}

/// A tagged, structured artifact embedded in a message: `{ type, data }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    pub data: serde_json::Value,
}

impl Block {
    pub fn query(query_text: &str) -> Self {
        Self {
            block_type: BlockType::Query,
            data: serde_json::json!({ "query": query_text }),
        }
    }

    pub fn code(language: &str, content: &str) -> Self {
        Self {
            block_type: BlockType::Code,
            data: serde_json::json!({ "language": language, "content": content }),
        }
    }

    pub fn table(columns: Vec<String>, rows: Vec<Vec<serde_json::Value>>) -> Self {
        Self {
            block_type: BlockType::Table,
            data: serde_json::json!({ "columns": columns, "rows": rows }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn chart(
        chart_type: &str,
        x_axis: &str,
        y_axis: &str,
        series: Option<Vec<String>>,
        data: serde_json::Value,
        is_time_series: bool,
        allow_chart_type_switch: bool,
    ) -> Self {
        Self {
            block_type: BlockType::Chart,
            data: serde_json::json!({
                "type": chart_type,
                "xAxis": x_axis,
                "yAxis": y_axis,
                "series": series,
                "data": data,
                "isTimeSeries": is_time_series,
                "allowChartTypeSwitch": allow_chart_type_switch,
            }),
        }
    }

    /// Same shape as `chart`, tagged `splunk-chart` rather than `chart` —
    /// used for charts emitted directly by the model or the mock
    /// generator rather than built by the Visualization Classifier.
    #[allow(clippy::too_many_arguments)]
    pub fn splunk_chart(
        chart_type: &str,
        x_axis: &str,
        y_axis: &str,
        series: Option<Vec<String>>,
        data: serde_json::Value,
        is_time_series: bool,
        allow_chart_type_switch: bool,
    ) -> Self {
        let mut block = Self::chart(
            chart_type,
            x_axis,
            y_axis,
            series,
            data,
            is_time_series,
            allow_chart_type_switch,
        );
        block.block_type = BlockType::SplunkChart;
        block
    }

    pub fn json_explorer(value: serde_json::Value) -> Self {
        Self {
            block_type: BlockType::JsonExplorer,
            data: value,
        }
    }
}

fn fence_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)```([a-zA-Z0-9_-]*)[ \t]*\n?(.*?)```").unwrap())
}

/// Parse final assistant text for embedded structured artifacts: fenced
/// analytics queries, fenced code snippets, fenced JSON block
/// descriptors. Returns the text with fences stripped, plus the blocks
/// found. Idempotent: running `extract_blocks` again on the returned
/// text yields the same (unchanged) text and no further blocks.
pub fn extract_blocks(text: &str) -> (String, Vec<Block>) {
    let mut blocks = Vec::new();
    let mut remaining = String::new();
    let mut last_end = 0;

    for cap in fence_re().captures_iter(text) {
        let whole = cap.get(0).unwrap();
        remaining.push_str(&text[last_end..whole.start()]);
        last_end = whole.end();

        let lang = cap
            .get(1)
            .map(|g| g.as_str().to_lowercase())
            .unwrap_or_default();
        let body = cap.get(2).map(|g| g.as_str().trim()).unwrap_or("");
        if body.is_empty() {
            continue;
        }
        blocks.push(classify_fence(&lang, body));
    }
    remaining.push_str(&text[last_end..]);

    (remaining.trim().to_string(), blocks)
}

fn classify_fence(lang: &str, body: &str) -> Block {
    match lang {
        "query" | "spl" | "splunk" => Block::query(body),
        "json" => classify_json_fence(body),
        "" => Block::code("text", body),
        other => Block::code(other, body),
    }
}

fn classify_json_fence(body: &str) -> Block {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
        return Block::code("json", body);
    };

    if let Some(tag) = value.get("type").and_then(|t| t.as_str()) {
        if let Some(block_type) = BlockType::from_tag(tag) {
            let data = value.get("data").cloned().unwrap_or_else(|| value.clone());
            return Block { block_type, data };
        }
    }
    Block::json_explorer(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_query_fence() {
        let text = "Here is the query:\n```query\nindex=main | stats count\n```\nDone.";
        let (remaining, blocks) = extract_blocks(text);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, BlockType::Query);
        assert_eq!(blocks[0].data["query"], "index=main | stats count");
        assert!(!remaining.contains("```"));
        assert!(remaining.contains("Here is the query:"));
        assert!(remaining.contains("Done."));
    }

    #[test]
    fn test_extract_generic_code_fence() {
        let (_, blocks) = extract_blocks("```rust\nfn main() {}\n```");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, BlockType::Code);
        assert_eq!(blocks[0].data["language"], "rust");
    }

    #[test]
    fn test_extract_bare_fence_defaults_to_text_code() {
        let (_, blocks) = extract_blocks("```\nsome text\n```");
        assert_eq!(blocks[0].block_type, BlockType::Code);
        assert_eq!(blocks[0].data["language"], "text");
    }

    #[test]
    fn test_extract_json_descriptor_fence() {
        let json = r#"```json
        {"type": "table", "data": {"columns": ["a"], "rows": [[1]]}}
        ```"#;
        let (_, blocks) = extract_blocks(json);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, BlockType::Table);
        assert_eq!(blocks[0].data["columns"][0], "a");
    }

    #[test]
    fn test_extract_unknown_json_falls_back_to_json_explorer() {
        let (_, blocks) = extract_blocks("```json\n{\"foo\": \"bar\"}\n```");
        assert_eq!(blocks[0].block_type, BlockType::JsonExplorer);
    }

    #[test]
    fn test_extract_is_idempotent() {
        let text = "intro\n```query\nindex=main\n```\noutro";
        let (once, _) = extract_blocks(text);
        let (twice, blocks_twice) = extract_blocks(&once);
        assert_eq!(once, twice);
        assert!(blocks_twice.is_empty());
    }

    #[test]
    fn test_no_fences_returns_original_text_and_no_blocks() {
        let (text, blocks) = extract_blocks("just plain prose, nothing fenced");
        assert_eq!(text, "just plain prose, nothing fenced");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_block_type_from_tag_handles_splunk_chart_alias() {
        assert_eq!(BlockType::from_tag("splunk-chart"), Some(BlockType::SplunkChart));
        assert_eq!(BlockType::from_tag("chart"), Some(BlockType::Chart));
        assert_eq!(BlockType::from_tag("not-a-real-block"), None);
    }

    #[test]
    fn test_splunk_chart_constructor_tags_distinct_from_chart() {
        let block = Block::splunk_chart("bar", "category", "value", None, serde_json::json!([]), false, true);
        assert_eq!(block.block_type, BlockType::SplunkChart);
        assert_eq!(block.data["type"], "bar");
    }

    #[test]
    fn test_table_constructor_shape() {
        let block = Block::table(
            vec!["a".to_string(), "b".to_string()],
            vec![vec![serde_json::json!(1), serde_json::json!(2)]],
        );
        assert_eq!(block.block_type, BlockType::Table);
        assert_eq!(block.data["columns"].as_array().unwrap().len(), 2);
    }
}
