//! Mock response generator (§9 Design Notes, §8 scenario 5)
//!
//! Used whenever the pipeline short-circuits around the real LLM adapter
//! (mock mode configured, or the adapter reporting unavailable). The rule
//! table is a pure function of the user's text: an ordered cascade where
//! the first matching rule supplies the reply content, but every matching
//! rule may contribute blocks.

use crate::domain::blocks::Block;

/// Run the mock pattern table against `user_text`, returning the assistant
/// reply content and any blocks the matched rules attach.
pub fn generate_mock_response(user_text: &str) -> (String, Vec<Block>) {
    let lowered = user_text.to_lowercase();
    let mut blocks = Vec::new();
    let mut content: Option<String> = None;

    for rule in RULES {
        if (rule.matches)(&lowered) {
            if content.is_none() {
                content = Some((rule.respond)(&lowered));
            }
            if let Some(block) = (rule.block)(&lowered) {
                blocks.push(block);
            }
        }
    }

    let content = content.unwrap_or_else(|| default_response(&lowered));
    (content, blocks)
}

struct Rule {
    matches: fn(&str) -> bool,
    respond: fn(&str) -> String,
    block: fn(&str) -> Option<Block>,
}

fn no_block(_lowered: &str) -> Option<Block> {
    None
}

const RULES: &[Rule] = &[
    Rule {
        matches: |l| l.contains("chart"),
        respond: |l| format!("Here's a {} chart.", chart_type_from(l)),
        block: |l| {
            Some(Block::splunk_chart(
                chart_type_from(l),
                "category",
                "value",
                None,
                serde_json::json!([]),
                false,
                true,
            ))
        },
    },
    Rule {
        matches: |l| l.contains("table"),
        respond: |_l| "Here's a table.".to_string(),
        block: |_l| Some(Block::table(Vec::new(), Vec::new())),
    },
    Rule {
        matches: |l| l.contains("query") || l.contains("search") || l.contains("spl"),
        respond: |_l| "Here's a query you can run.".to_string(),
        block: |_l| Some(Block::query("index=main | stats count")),
    },
    Rule {
        matches: |l| l.contains("hello") || l.contains("hi ") || l == "hi",
        respond: |_l| "Hello! How can I help you today?".to_string(),
        block: no_block,
    },
    Rule {
        matches: |l| l.contains("help"),
        respond: |_l| {
            "I can help you explore your data, build charts, and run queries. What would you \
             like to look at?"
                .to_string()
        },
        block: no_block,
    },
];

fn chart_type_from(lowered: &str) -> &'static str {
    if lowered.contains("pie") {
        "pie"
    } else if lowered.contains("line") {
        "line"
    } else if lowered.contains("bar") {
        "bar"
    } else {
        "bar"
    }
}

fn default_response(_lowered: &str) -> String {
    "I don't have a live model connection right now, but here's a placeholder response."
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::blocks::BlockType;

    #[test]
    fn test_show_chart_bar_matches_scenario_five() {
        let (content, blocks) = generate_mock_response("show chart bar");
        assert!(content.to_lowercase().contains("bar"));
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, BlockType::SplunkChart);
        assert_eq!(blocks[0].data["type"], "bar");
    }

    #[test]
    fn test_chart_pie_keyword_selects_pie_type() {
        let (_content, blocks) = generate_mock_response("can I get a pie chart of this");
        assert_eq!(blocks[0].data["type"], "pie");
    }

    #[test]
    fn test_no_match_falls_back_to_default_response() {
        let (content, blocks) = generate_mock_response("asdkjfhaskjdfh");
        assert!(blocks.is_empty());
        assert!(!content.is_empty());
    }

    #[test]
    fn test_greeting_rule_has_no_blocks() {
        let (content, blocks) = generate_mock_response("hello there");
        assert!(blocks.is_empty());
        assert!(content.to_lowercase().contains("hello"));
    }

    #[test]
    fn test_response_is_pure() {
        let a = generate_mock_response("show chart bar");
        let b = generate_mock_response("show chart bar");
        assert_eq!(a, b);
    }

    #[test]
    fn test_query_keyword_attaches_query_block() {
        let (_content, blocks) = generate_mock_response("write me a search for errors");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].block_type, crate::domain::blocks::BlockType::Query);
    }
}
