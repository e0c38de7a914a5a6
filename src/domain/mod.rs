pub mod batch;
pub mod profile;
pub mod record;
pub mod shared;
pub mod tts;
