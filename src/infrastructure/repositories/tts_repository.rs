use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::domain::profile::Profile;
use crate::domain::tts::SpeechChunk;

/// Streamed synthesis response; each item is one decoded chunk or a transport error
pub type SpeechStream = BoxStream<'static, Result<SpeechChunk, String>>;

/// Repository for streaming TTS synthesis.
/// Abstracts the underlying speech provider.
///
/// Errors are plain text. The synthesis client classifies them by message
/// alone, so implementations must keep the HTTP status code and the
/// provider's error status in the text.
#[async_trait]
pub trait TtsRepository: Send + Sync {
    /// Open a streaming synthesis request for `text` against `model`
    ///
    /// # Errors
    /// Returns error if the request cannot be sent or the provider rejects it
    async fn stream_speech(&self, model: &str, text: &str) -> Result<SpeechStream, String>;
}

/// Builds a repository bound to one profile's credentials and voice settings
pub trait TtsRepositoryFactory: Send + Sync {
    fn create(&self, profile: &Profile) -> Result<Arc<dyn TtsRepository>, String>;
}
