use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{LogLevel, ProgressUpdate};
use super::model::BatchSummary;
use crate::domain::record::RecordId;
use crate::domain::shared::UsageStats;

/// Request for POST /api/batches
#[derive(Debug, Serialize, Deserialize)]
pub struct StartBatchRequest {
    pub record_ids: Vec<RecordId>,
}

/// Response for POST /api/batches
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchStarted {
    pub batch_id: Uuid,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchState {
    Running,
    Cancelling,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Live view of the current (or last) batch, GET /api/batches/current
#[derive(Debug, Clone, Serialize)]
pub struct BatchStatus {
    pub batch_id: Uuid,
    pub profile: String,
    pub state: BatchState,
    pub total: usize,
    pub current: usize,
    pub status: String,
    pub success: u64,
    pub failed: u64,
    pub skipped: u64,
    pub usage: UsageStats,
    pub logs: Vec<LogLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<BatchSummary>,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl BatchStatus {
    pub fn new(batch_id: Uuid, profile: String, total: usize) -> Self {
        Self {
            batch_id,
            profile,
            state: BatchState::Running,
            total,
            current: 0,
            status: "Initializing...".to_string(),
            success: 0,
            failed: 0,
            skipped: 0,
            usage: UsageStats::default(),
            logs: Vec::new(),
            summary: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == BatchState::Completed
    }

    pub fn apply_progress(&mut self, update: ProgressUpdate) {
        self.current = update.index;
        self.status = update.status;
        self.success = update.success;
        self.failed = update.failed;
        self.skipped = update.skipped;
    }

    /// Append a log line, dropping the oldest ones past `max_lines`
    pub fn push_log(&mut self, level: LogLevel, message: String, max_lines: usize) {
        self.logs.push(LogLine {
            level,
            message,
            at: Utc::now(),
        });
        if self.logs.len() > max_lines {
            let excess = self.logs.len() - max_lines;
            self.logs.drain(..excess);
        }
    }

    pub fn finish(&mut self, summary: Option<BatchSummary>) {
        if let Some(summary) = &summary {
            self.success = summary.success;
            self.failed = summary.failed;
            self.skipped = summary.skipped;
            self.usage = summary.usage;
            self.status = "Done".to_string();
        } else {
            self.status = "Stopped unexpectedly".to_string();
        }
        self.current = self.total;
        self.summary = summary;
        self.state = BatchState::Completed;
        self.finished_at = Some(Utc::now());
    }
}

/// Report for GET /health/ready
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Readiness {
    pub configuration: bool,
    pub record_store: bool,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        self.configuration && self.record_store
    }
}
