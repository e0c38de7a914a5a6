use serde::Serialize;

use crate::domain::record::RecordId;
use crate::domain::shared::UsageStats;

/// Failed operations in a row that stop the whole batch
pub const MAX_CONSECUTIVE_ERRORS: u32 = 5;

/// Operation counters owned by the worker for one session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchCounters {
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    #[serde(skip)]
    pub consecutive_errors: u32,
}

impl BatchCounters {
    pub fn record_success(&mut self) {
        self.success += 1;
        self.consecutive_errors = 0;
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
        self.consecutive_errors += 1;
    }

    /// Audio came back; the save may still fail
    pub fn reset_streak(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Skips leave the consecutive-error streak untouched
    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn breaker_tripped(&self) -> bool {
        self.consecutive_errors >= MAX_CONSECUTIVE_ERRORS
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Completed,
    Cancelled,
    TooManyErrors,
}

impl StopReason {
    pub fn headline(&self) -> String {
        match self {
            Self::Completed => "Processing complete!".to_string(),
            Self::Cancelled => "Processing cancelled.".to_string(),
            Self::TooManyErrors => {
                format!("Processing stopped after {MAX_CONSECUTIVE_ERRORS} consecutive errors.")
            }
        }
    }
}

/// Terminal report of one batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub reason: StopReason,
    pub total: usize,
    pub success: u64,
    pub skipped: u64,
    pub failed: u64,
    pub usage: UsageStats,
}

impl BatchSummary {
    pub fn new(reason: StopReason, total: usize, counters: &BatchCounters, usage: UsageStats) -> Self {
        Self {
            reason,
            total,
            success: counters.success,
            skipped: counters.skipped,
            failed: counters.failed,
            usage,
        }
    }

    pub fn message(&self) -> String {
        format!(
            "{}\nSuccess: {} | Skipped: {} | Failed: {} | Tokens in/out: {}/{}",
            self.reason.headline(),
            self.success,
            self.skipped,
            self.failed,
            self.usage.input_tokens,
            self.usage.output_tokens
        )
    }
}

/// Media file name for a record's generated audio
pub fn media_filename(record_id: RecordId, unix_millis: i64) -> String {
    format!("gemini_tts_{record_id}_{unix_millis}.wav")
}
