/// Errors raised by the synthesis client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SynthesisError {
    /// Quota or rate limit hit; the caller may switch models
    #[error("Rate limit hit: {0}")]
    RateLimited(String),
    #[error("TTS generation failed: {0}")]
    Failed(String),
}

/// How a transport failure should be handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Transient,
    Permanent,
}

const RATE_LIMIT_SIGNATURES: [&str; 4] = ["429", "resource_exhausted", "rate limit", "quota"];
const TRANSIENT_SIGNATURES: [&str; 4] = ["500", "503", "timeout", "timed out"];

/// Classify a transport error purely by its text
pub fn classify_failure(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if RATE_LIMIT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        FailureKind::RateLimited
    } else if TRANSIENT_SIGNATURES.iter().any(|sig| lower.contains(sig)) {
        FailureKind::Transient
    } else {
        FailureKind::Permanent
    }
}
