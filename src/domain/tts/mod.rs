pub mod dto;
pub mod error;
pub mod error_message;
pub mod fallback;
pub mod service;
pub mod wav;

pub use dto::{
    InlineAudio, RetryPolicy, SpeechChunk, SynthesisOutcome, SynthesisResult, TokenUsage,
};
pub use error::{classify_failure, FailureKind, SynthesisError};
pub use error_message::describe_failure;
pub use fallback::FallbackTtsService;
pub use service::{TtsService, TtsServiceApi};
