pub mod dto;
pub mod error;
pub mod events;
pub mod model;
pub mod service;
pub mod text;
pub mod worker;

pub use dto::{BatchStarted, BatchState, BatchStatus, LogLine, Readiness, StartBatchRequest};
pub use error::BatchServiceError;
pub use events::{BatchEvent, LogLevel, ProgressUpdate};
pub use model::{BatchCounters, BatchSummary, StopReason, MAX_CONSECUTIVE_ERRORS};
pub use service::{BatchHandler, BatchHandlerApi};
pub use worker::BatchWorker;
