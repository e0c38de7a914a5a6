use once_cell::sync::Lazy;
use regex::Regex;

use super::error::{classify_failure, FailureKind};

const MAX_RAW_ERROR_CHARS: usize = 150;

static RETRY_IN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)retry in\s+([0-9]+(?:\.[0-9]+)?)\s*s").expect("valid regex"));
static RETRY_DELAY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)"?retryDelay"?\s*:\s*"([0-9]+(?:\.[0-9]+)?)s""#).expect("valid regex")
});
static LIMIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\blimit:\s*([0-9]+)").expect("valid regex"));
static QUOTA_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"?quotaValue"?\s*:\s*"?([0-9]+)"#).expect("valid regex"));
static HTTP_STATUS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(500|503)\b").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuotaScope {
    Daily,
    PerMinute,
    Unknown,
}

/// Human readable form of a synthesis failure for the operator log.
///
/// Rate-limit and server errors are rewritten into a short template; other
/// errors are shown raw but truncated.
pub fn describe_failure(raw: &str) -> String {
    if classify_failure(raw) == FailureKind::RateLimited {
        return describe_rate_limit(raw);
    }
    if is_server_error(raw) {
        return describe_server_error(raw);
    }
    truncate(raw, MAX_RAW_ERROR_CHARS)
}

fn describe_rate_limit(raw: &str) -> String {
    let mut message = match quota_scope(raw) {
        QuotaScope::Daily => "Daily quota exhausted".to_string(),
        QuotaScope::PerMinute => "Per-minute rate limit reached".to_string(),
        QuotaScope::Unknown => "Rate limit reached".to_string(),
    };

    if let Some(limit) = capture(&LIMIT, raw).or_else(|| capture(&QUOTA_VALUE, raw)) {
        message.push_str(&format!(" (limit: {limit})"));
    }

    match capture(&RETRY_IN, raw).or_else(|| capture(&RETRY_DELAY, raw)) {
        Some(wait) => message.push_str(&format!(", retry in {}s", round_up_seconds(&wait))),
        None if quota_scope(raw) == QuotaScope::Daily => message.push_str(", try again tomorrow"),
        None => {}
    }

    message
}

fn describe_server_error(raw: &str) -> String {
    match capture(&HTTP_STATUS, raw).as_deref() {
        Some("503") => "Server error (HTTP 503): service temporarily unavailable".to_string(),
        Some("500") => "Server error (HTTP 500): internal error on the API side".to_string(),
        _ => "Server error: the API is having trouble, try again later".to_string(),
    }
}

fn is_server_error(raw: &str) -> bool {
    let lower = raw.to_lowercase();
    HTTP_STATUS.is_match(raw) || lower.contains("internal error") || lower.contains("unavailable")
}

fn quota_scope(raw: &str) -> QuotaScope {
    let lower = raw.to_lowercase();
    if ["perday", "per day", "per_day", "daily"]
        .iter()
        .any(|s| lower.contains(s))
    {
        QuotaScope::Daily
    } else if ["perminute", "per minute", "per_minute"]
        .iter()
        .any(|s| lower.contains(s))
    {
        QuotaScope::PerMinute
    } else {
        QuotaScope::Unknown
    }
}

fn capture(pattern: &Regex, raw: &str) -> Option<String> {
    pattern
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

fn round_up_seconds(value: &str) -> u64 {
    value
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| v.ceil() as u64)
        .unwrap_or(0)
}

fn truncate(raw: &str, max_chars: usize) -> String {
    if raw.chars().count() <= max_chars {
        return raw.to_string();
    }
    let mut cut: String = raw.chars().take(max_chars).collect();
    cut.push_str("...");
    cut
}
