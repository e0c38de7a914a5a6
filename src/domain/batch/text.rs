use once_cell::sync::Lazy;
use regex::Regex;

static TAG_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static WHITESPACE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Strip markup tags, collapse whitespace runs and trim
pub fn clean_text(text: &str) -> String {
    let without_tags = TAG_PATTERN.replace_all(text, "");
    let normalized = WHITESPACE_PATTERN.replace_all(&without_tags, " ");
    normalized.trim().to_string()
}
