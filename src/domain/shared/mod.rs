pub mod cancellation;
pub mod usage_dto;

pub use cancellation::{seconds, sleep_unless_cancelled, POLL_INTERVAL};
pub use usage_dto::{UsageResponse, UsageStats};
