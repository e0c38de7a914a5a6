pub mod gemini_tts_repository;
pub mod profile_repository;
pub mod record_repository;
pub mod tts_repository;

pub use gemini_tts_repository::{GeminiTtsRepository, GeminiTtsRepositoryFactory};
pub use profile_repository::ProfileRepository;
pub use record_repository::{JsonRecordStore, RecordStore, StoreError};
pub use tts_repository::{SpeechStream, TtsRepository, TtsRepositoryFactory};
