use std::time::Duration;

use crate::domain::profile::Profile;
use crate::domain::shared::{seconds, UsageStats};

/// Token counts reported by the API for one stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

/// A binary audio fragment and its content descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineAudio {
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

/// One streamed piece of a synthesis response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpeechChunk {
    pub usage: Option<TokenUsage>,
    pub audio: Vec<InlineAudio>,
}

/// Retry knobs for a single synthesis call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub retry_on_empty: bool,
}

impl RetryPolicy {
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            max_retries: profile.retry_attempts,
            retry_delay: seconds(profile.retry_delay),
            retry_on_empty: profile.retry_on_empty,
        }
    }

    /// Attempts actually made; a zero setting still makes one call
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    /// Linear backoff: `retry_delay * (attempt + 1)`
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt.saturating_add(1))
    }
}

/// Result of one synthesis client call that did not raise
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SynthesisOutcome {
    pub audio: Option<Vec<u8>>,
    pub usage: UsageStats,
}

impl SynthesisOutcome {
    pub fn empty(usage: UsageStats) -> Self {
        Self { audio: None, usage }
    }
}

/// Per-field result handed to the batch worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthesisResult {
    /// Audio produced by `model`
    Audio {
        audio: Vec<u8>,
        model: String,
        usage: UsageStats,
    },
    /// No audio; `reason` is either a short description or raw error text
    NoAudio { reason: String, usage: UsageStats },
}

impl SynthesisResult {
    pub fn usage(&self) -> &UsageStats {
        match self {
            Self::Audio { usage, .. } | Self::NoAudio { usage, .. } => usage,
        }
    }
}
