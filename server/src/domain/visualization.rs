//! Visualization Classifier (§4.6.3): a pure function of (rows, fields,
//! query) deciding how an analytics result should be displayed.

use std::collections::HashSet;

use serde_json::{Map, Value};

use crate::domain::blocks::Block;
use crate::domain::time_bucket;

/// One result row, keyed by field name.
pub type Row = Map<String, Value>;

/// Inputs to the classifier. Identical inputs always yield an identical
/// `Visualization` (§8 purity property).
pub struct ClassifyInput<'a> {
    pub query: &'a str,
    pub fields: &'a [String],
    pub rows: &'a [Row],
}

#[derive(Debug, Clone, PartialEq)]
pub enum Visualization {
    TimeSeriesChart { time_field: String },
    SingleValue,
    Categorical { category_field: String, value_field: String, chart_type: &'static str },
    Table,
}

fn is_internal(field: &str) -> bool {
    field.starts_with('_') && !field.eq_ignore_ascii_case("_time")
}

/// Candidate time field names, in priority order, checked case-insensitively.
const TIME_FIELD_CANDIDATES: [&str; 4] = ["_time", "time", "timestamp", "date"];

fn detect_time_field(fields: &[String]) -> Option<String> {
    TIME_FIELD_CANDIDATES.iter().find_map(|candidate| {
        fields
            .iter()
            .find(|f| f.eq_ignore_ascii_case(candidate))
            .cloned()
    })
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

fn display_fields(fields: &[String]) -> Vec<&String> {
    fields.iter().filter(|f| !is_internal(f)).collect()
}

fn has_by_clause(query_lower: &str) -> bool {
    query_lower
        .split_whitespace()
        .any(|word| word == "by")
}

/// Classify a query result for display. Pure function of its inputs.
pub fn classify(input: &ClassifyInput) -> Visualization {
    let query_lower = input.query.to_lowercase();

    if query_lower.contains("timechart") || detect_time_field(input.fields).is_some() {
        let time_field = detect_time_field(input.fields).unwrap_or_else(|| "_time".to_string());
        return Visualization::TimeSeriesChart { time_field };
    }

    let is_stats = query_lower.contains("stats");
    let has_by = has_by_clause(&query_lower);

    if is_stats && !has_by && input.rows.len() == 1 && input.fields.len() <= 2 {
        return Visualization::SingleValue;
    }

    if is_stats && has_by {
        let fields = display_fields(input.fields);
        if fields.len() >= 2 {
            let category_count = count_distinct(input.rows, fields[0]);
            let chart_type = if category_count <= 5 { "pie" } else { "bar" };
            return Visualization::Categorical {
                category_field: fields[0].clone(),
                value_field: fields[1].clone(),
                chart_type,
            };
        }
    }

    Visualization::Table
}

fn count_distinct(rows: &[Row], field: &str) -> usize {
    let mut seen = HashSet::new();
    for row in rows {
        if let Some(v) = row.get(field) {
            seen.insert(v.to_string());
        }
    }
    seen.len()
}

/// Classify, then build the concrete display `Block` for a query
/// result, including time-bucketed labels for time-series charts.
pub fn build_visualization_block(input: &ClassifyInput, tz: Option<&str>) -> Block {
    match classify(input) {
        Visualization::TimeSeriesChart { time_field } => {
            build_time_series_chart(input, &time_field, tz)
        }
        Visualization::SingleValue => build_single_value(input),
        Visualization::Categorical {
            category_field,
            value_field,
            chart_type,
        } => build_categorical_chart(input, &category_field, &value_field, chart_type),
        Visualization::Table => build_table(input),
    }
}

fn build_time_series_chart(input: &ClassifyInput, time_field: &str, tz: Option<&str>) -> Block {
    let mut indexed: Vec<(i64, &Row)> = input
        .rows
        .iter()
        .map(|row| {
            let t = row
                .get(time_field)
                .map(time_bucket::parse_time_value)
                .unwrap_or(0);
            (t, row)
        })
        .collect();
    indexed.sort_by_key(|(t, _)| *t);

    let times: Vec<i64> = indexed.iter().map(|(t, _)| *t).collect();
    let span = time_bucket::resolve_bucket_span(input.query, input.rows, &times);

    let series_fields: Vec<&String> = display_fields(input.fields)
        .into_iter()
        .filter(|f| f.as_str() != time_field)
        .collect();

    let data: Vec<Value> = indexed
        .iter()
        .map(|(t, row)| {
            let mut point = Map::new();
            point.insert(
                "label".to_string(),
                Value::String(time_bucket::format_label(*t, span, tz)),
            );
            for field in &series_fields {
                let value = row.get(field.as_str()).cloned().unwrap_or(Value::Null);
                point.insert((*field).clone(), value);
            }
            Value::Object(point)
        })
        .collect();

    let series = if series_fields.is_empty() {
        None
    } else {
        Some(series_fields.into_iter().cloned().collect())
    };

    Block::chart(
        "line",
        "label",
        "value",
        series,
        Value::Array(data),
        true,
        false,
    )
}

fn build_single_value(input: &ClassifyInput) -> Block {
    let fields = display_fields(input.fields);
    let value = input
        .rows
        .first()
        .and_then(|row| fields.first().and_then(|f| row.get(f.as_str())))
        .and_then(value_to_f64)
        .unwrap_or(0.0);

    Block::chart(
        "single-value",
        "",
        "",
        None,
        serde_json::json!(value),
        false,
        false,
    )
}

fn build_categorical_chart(
    input: &ClassifyInput,
    category_field: &str,
    value_field: &str,
    chart_type: &'static str,
) -> Block {
    let data: Vec<Value> = input
        .rows
        .iter()
        .map(|row| {
            let category = row.get(category_field).cloned().unwrap_or(Value::Null);
            let value = row
                .get(value_field)
                .and_then(value_to_f64)
                .unwrap_or(0.0);
            serde_json::json!({ "category": category, "value": value })
        })
        .collect();

    Block::chart(
        chart_type,
        category_field,
        value_field,
        None,
        Value::Array(data),
        false,
        true,
    )
}

fn build_table(input: &ClassifyInput) -> Block {
    let columns: Vec<String> = display_fields(input.fields).into_iter().cloned().collect();
    let rows: Vec<Vec<Value>> = input
        .rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(Value::Null))
                .collect()
        })
        .collect();
    Block::table(columns, rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_timechart_keyword_selects_time_series() {
        let fields = vec!["count".to_string()];
        let rows = vec![row(&[("count", serde_json::json!(1))])];
        let input = ClassifyInput {
            query: "index=main | timechart count",
            fields: &fields,
            rows: &rows,
        };
        assert!(matches!(classify(&input), Visualization::TimeSeriesChart { .. }));
    }

    #[test]
    fn test_time_field_presence_selects_time_series_without_keyword() {
        let fields = vec!["_time".to_string(), "count".to_string()];
        let rows = vec![row(&[("_time", serde_json::json!(1)), ("count", serde_json::json!(1))])];
        let input = ClassifyInput {
            query: "index=main | stats count",
            fields: &fields,
            rows: &rows,
        };
        match classify(&input) {
            Visualization::TimeSeriesChart { time_field } => assert_eq!(time_field, "_time"),
            other => panic!("expected time series, got {:?}", other),
        }
    }

    #[test]
    fn test_single_value_for_one_row_stats_without_by() {
        let fields = vec!["count".to_string()];
        let rows = vec![row(&[("count", serde_json::json!(42))])];
        let input = ClassifyInput {
            query: "index=main | stats count",
            fields: &fields,
            rows: &rows,
        };
        assert_eq!(classify(&input), Visualization::SingleValue);
    }

    #[test]
    fn test_single_value_missing_number_coerces_to_zero() {
        let fields = vec!["count".to_string()];
        let rows = vec![row(&[("count", Value::Null)])];
        let input = ClassifyInput {
            query: "stats count",
            fields: &fields,
            rows: &rows,
        };
        let block = build_visualization_block(&input, None);
        assert_eq!(block.data["data"], serde_json::json!(0.0));
    }

    #[test]
    fn test_categorical_pie_under_six_categories() {
        let fields = vec!["status".to_string(), "count".to_string()];
        let rows = vec![
            row(&[("status", serde_json::json!("ok")), ("count", serde_json::json!(5))]),
            row(&[("status", serde_json::json!("error")), ("count", serde_json::json!(1))]),
            row(&[("status", serde_json::json!("warn")), ("count", serde_json::json!(2))]),
        ];
        let input = ClassifyInput {
            query: "index=main | stats count by status",
            fields: &fields,
            rows: &rows,
        };
        match classify(&input) {
            Visualization::Categorical { chart_type, .. } => assert_eq!(chart_type, "pie"),
            other => panic!("expected categorical, got {:?}", other),
        }
    }

    #[test]
    fn test_categorical_bar_over_five_categories() {
        let fields = vec!["status".to_string(), "count".to_string()];
        let rows: Vec<Row> = (0..7)
            .map(|i| {
                row(&[
                    ("status", serde_json::json!(format!("s{i}"))),
                    ("count", serde_json::json!(i)),
                ])
            })
            .collect();
        let input = ClassifyInput {
            query: "stats count by status",
            fields: &fields,
            rows: &rows,
        };
        match classify(&input) {
            Visualization::Categorical { chart_type, .. } => assert_eq!(chart_type, "bar"),
            other => panic!("expected categorical, got {:?}", other),
        }
    }

    #[test]
    fn test_default_is_table() {
        let fields = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let rows = vec![row(&[("a", serde_json::json!(1))])];
        let input = ClassifyInput {
            query: "index=main | head 10",
            fields: &fields,
            rows: &rows,
        };
        assert_eq!(classify(&input), Visualization::Table);
    }

    #[test]
    fn test_empty_result_set_is_table() {
        let fields: Vec<String> = vec![];
        let rows: Vec<Row> = vec![];
        let input = ClassifyInput {
            query: "stats count",
            fields: &fields,
            rows: &rows,
        };
        assert_eq!(classify(&input), Visualization::Table);
        let block = build_table(&input);
        assert_eq!(block.data["rows"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn test_classification_is_pure() {
        let fields = vec!["status".to_string(), "count".to_string()];
        let rows = vec![row(&[("status", serde_json::json!("ok")), ("count", serde_json::json!(1))])];
        let input = ClassifyInput {
            query: "stats count by status",
            fields: &fields,
            rows: &rows,
        };
        assert_eq!(classify(&input), classify(&input));
    }

    #[test]
    fn test_internal_fields_excluded_except_time() {
        let fields = vec!["_time".to_string(), "_span".to_string(), "count".to_string()];
        let rows = vec![row(&[
            ("_time", serde_json::json!(1_700_000_000)),
            ("_span", serde_json::json!("15m")),
            ("count", serde_json::json!(5)),
        ])];
        let input = ClassifyInput {
            query: "stats count",
            fields: &fields,
            rows: &rows,
        };
        let block = build_visualization_block(&input, None);
        let series = block.data["series"].as_array().unwrap();
        assert_eq!(series.len(), 1);
        assert_eq!(series[0], "count");
    }
}
