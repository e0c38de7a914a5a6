use serde::{Deserialize, Serialize};

/// Monotonic usage counters tracked per profile and per batch session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    #[serde(default)]
    pub requests: u64,
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

impl UsageStats {
    pub fn is_empty(&self) -> bool {
        self.requests == 0 && self.input_tokens == 0 && self.output_tokens == 0
    }

    /// True when the synthesis call reported any token metadata
    pub fn has_tokens(&self) -> bool {
        self.input_tokens > 0 || self.output_tokens > 0
    }

    /// Add another set of counters into this one. Counters only ever grow.
    pub fn merge(&mut self, other: &UsageStats) {
        self.requests = self.requests.saturating_add(other.requests);
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Response for GET /api/usage
#[derive(Debug, Serialize, Deserialize)]
pub struct UsageResponse {
    pub profile: String,
    pub usage: UsageStats,
}
