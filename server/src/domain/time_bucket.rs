//! Time bucketing (§4.6.4): bucket span resolution and label formatting
//! for the Visualization Classifier's time-series path.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;

/// Fallback bucket span when nothing else resolves one.
pub const DEFAULT_BUCKET_SPAN: Duration = Duration::from_secs(15 * 60);

fn span_token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(\d+)([smhdw])$").unwrap())
}

fn query_span_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"span=(\d+[smhdw])").unwrap())
}

/// Parse a `<n><unit>` token (`15m`, `2h`, `1d`, ...) into a `Duration`.
pub fn parse_span_token(token: &str) -> Option<Duration> {
    let caps = span_token_re().captures(token)?;
    let n: u64 = caps[1].parse().ok()?;
    let secs = match &caps[2] {
        "s" => n,
        "m" => n * 60,
        "h" => n * 3600,
        "d" => n * 86_400,
        "w" => n * 604_800,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

/// Extract `span=<n>{s,m,h,d,w}` from the raw query text.
pub fn span_from_query(query: &str) -> Option<Duration> {
    let caps = query_span_re().captures(query)?;
    parse_span_token(&caps[1])
}

/// Interpret a `_span` result field, which may be a `"15m"`-style token
/// or a bare number of seconds.
pub fn span_from_field(value: &serde_json::Value) -> Option<Duration> {
    match value {
        serde_json::Value::String(s) => {
            parse_span_token(s).or_else(|| s.parse::<u64>().ok().map(Duration::from_secs))
        }
        serde_json::Value::Number(n) => n.as_u64().map(Duration::from_secs),
        _ => None,
    }
}

/// Mean delta between consecutive (sorted) epoch-second time values.
pub fn mean_delta_span(times: &[i64]) -> Option<Duration> {
    if times.len() < 2 {
        return None;
    }
    let mut sorted = times.to_vec();
    sorted.sort_unstable();
    let diffs: Vec<i64> = sorted.windows(2).map(|w| (w[1] - w[0]).max(0)).collect();
    let sum: i64 = diffs.iter().sum();
    let mean = sum / diffs.len() as i64;
    if mean <= 0 {
        None
    } else {
        Some(Duration::from_secs(mean as u64))
    }
}

/// Resolve the bucket span in precedence order: query `span=`, then a
/// `_span` result field, then the mean delta between time values, then
/// the 15-minute default.
pub fn resolve_bucket_span(query: &str, rows: &[serde_json::Value], times: &[i64]) -> Duration {
    if let Some(d) = span_from_query(query) {
        return d;
    }
    if let Some(d) = rows
        .first()
        .and_then(|row| row.get("_span"))
        .and_then(span_from_field)
    {
        return d;
    }
    mean_delta_span(times).unwrap_or(DEFAULT_BUCKET_SPAN)
}

/// Interpret a raw time value as epoch seconds UTC. Bare numbers are
/// whole seconds (never millis/micros/nanos). Strings are tried as a
/// bare integer first, then ISO-8601; anything unparseable falls back
/// to the Unix epoch rather than erroring.
pub fn parse_time_value(value: &serde_json::Value) -> i64 {
    match value {
        serde_json::Value::Number(n) => n.as_i64().unwrap_or(0),
        serde_json::Value::String(s) => s
            .parse::<i64>()
            .ok()
            .or_else(|| {
                chrono::DateTime::parse_from_rfc3339(s)
                    .ok()
                    .map(|dt| dt.timestamp())
            })
            .unwrap_or(0),
        _ => 0,
    }
}

fn resolve_tz(tz_name: Option<&str>) -> Tz {
    tz_name.and_then(|s| s.parse::<Tz>().ok()).unwrap_or(chrono_tz::UTC)
}

/// Format an epoch-second timestamp for display, choosing a format
/// appropriate to the bucket span (§4.6.4). Unknown timezones fall back
/// to UTC rather than erroring.
pub fn format_label(epoch_secs: i64, span: Duration, tz_name: Option<&str>) -> String {
    let tz = resolve_tz(tz_name);
    let dt_utc = Utc
        .timestamp_opt(epoch_secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap());
    let dt = dt_utc.with_timezone(&tz);

    let span_secs = span.as_secs();
    const HOUR: u64 = 3600;
    const DAY: u64 = 86_400;
    const WEEK: u64 = 604_800;
    const MONTH: u64 = 2_592_000;

    if span_secs < HOUR {
        dt.format("%-I:%M %p").to_string()
    } else if span_secs < DAY {
        if span_secs < 2 * HOUR {
            dt.format("%-I:%M %p").to_string()
        } else {
            dt.format("%-I %p").to_string()
        }
    } else if span_secs < WEEK {
        if span_secs < 2 * DAY {
            format!("{} {}", dt.format("%a"), dt.format("%-I %p"))
        } else {
            dt.format("%m/%d").to_string()
        }
    } else if span_secs < MONTH {
        dt.format("%m/%d").to_string()
    } else {
        dt.format("%m/%Y").to_string()
    }
}
