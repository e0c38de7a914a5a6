use serde::Serialize;

use super::model::BatchSummary;
use crate::domain::shared::UsageStats;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Snapshot emitted after each record and before each API call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    /// 1-based position of the record in the batch
    pub index: usize,
    pub total: usize,
    pub status: String,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
}

/// Everything the worker reports, in the order it happened
#[derive(Debug, Clone, PartialEq)]
pub enum BatchEvent {
    Progress(ProgressUpdate),
    /// Running session totals after an API call that reported usage
    Usage(UsageStats),
    Log { level: LogLevel, message: String },
    Finished(BatchSummary),
}
