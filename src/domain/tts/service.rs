use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use super::dto::{RetryPolicy, SynthesisOutcome};
use super::error::{classify_failure, FailureKind, SynthesisError};
use super::wav;
use crate::domain::shared::{sleep_unless_cancelled, UsageStats};
use crate::infrastructure::repositories::TtsRepository;

/// Synthesis client: one logical request with local retries
pub struct TtsService {
    tts_repo: Arc<dyn TtsRepository>,
    system_instruction: Option<String>,
}

impl TtsService {
    pub fn new(tts_repo: Arc<dyn TtsRepository>, system_instruction: Option<String>) -> Self {
        let system_instruction = system_instruction
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        Self {
            tts_repo,
            system_instruction,
        }
    }

    fn prompt(&self, text: &str) -> String {
        match &self.system_instruction {
            Some(instruction) => format!("{instruction}\n\n{text}"),
            None => text.to_string(),
        }
    }

    /// Consume one streamed response. `usage` is overwritten with the most
    /// recent token counts seen, even when the stream later fails.
    async fn attempt(
        &self,
        model: &str,
        prompt: &str,
        usage: &mut UsageStats,
    ) -> Result<Option<Vec<u8>>, String> {
        let mut stream = self.tts_repo.stream_speech(model, prompt).await?;
        let mut samples: Vec<u8> = Vec::new();
        let mut descriptor: Option<String> = None;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;

            if let Some(tokens) = chunk.usage {
                usage.input_tokens = tokens.input_tokens;
                usage.output_tokens = tokens.output_tokens;
            }

            for fragment in chunk.audio.into_iter().filter(|f| !f.data.is_empty()) {
                if descriptor.is_none() {
                    descriptor = fragment.mime_type;
                }
                samples.extend_from_slice(&fragment.data);
            }
        }

        if samples.is_empty() {
            return Ok(None);
        }

        tracing::debug!(
            model = %model,
            raw_bytes = samples.len(),
            descriptor = descriptor.as_deref().unwrap_or_default(),
            "Received audio stream"
        );

        Ok(Some(wav::encode(
            &samples,
            descriptor.as_deref().unwrap_or_default(),
        )))
    }
}

#[async_trait]
pub trait TtsServiceApi: Send + Sync {
    /// Synthesize `text` with `model`
    ///
    /// This operation:
    /// - Returns no audio without calling the API for blank text
    /// - Retries server errors, timeouts and (optionally) empty responses
    /// - Raises `SynthesisError::RateLimited` without retrying on quota errors
    /// - Returns whatever it has, without error, once `cancel` fires
    async fn synthesize(
        &self,
        text: &str,
        model: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<SynthesisOutcome, SynthesisError>;
}

#[async_trait]
impl TtsServiceApi for TtsService {
    async fn synthesize(
        &self,
        text: &str,
        model: &str,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
    ) -> Result<SynthesisOutcome, SynthesisError> {
        let mut usage = UsageStats::default();

        if text.trim().is_empty() {
            return Ok(SynthesisOutcome::empty(usage));
        }

        let prompt = self.prompt(text);
        let attempts = policy.attempts();

        for attempt in 0..attempts {
            if cancel.is_cancelled() {
                return Ok(SynthesisOutcome::empty(usage));
            }
            let is_last = attempt + 1 == attempts;

            let reason = match self.attempt(model, &prompt, &mut usage).await {
                Ok(Some(audio)) => {
                    return Ok(SynthesisOutcome {
                        audio: Some(audio),
                        usage,
                    })
                }
                Ok(None) if !policy.retry_on_empty || is_last => {
                    return Ok(SynthesisOutcome::empty(usage));
                }
                Ok(None) => "empty response".to_string(),
                Err(message) => match classify_failure(&message) {
                    FailureKind::RateLimited => return Err(SynthesisError::RateLimited(message)),
                    FailureKind::Permanent => return Err(SynthesisError::Failed(message)),
                    FailureKind::Transient if is_last => {
                        return Err(SynthesisError::Failed(message))
                    }
                    FailureKind::Transient => message,
                },
            };

            let wait = policy.backoff(attempt);
            tracing::warn!(
                model = %model,
                attempt = attempt + 1,
                attempts,
                wait_ms = wait.as_millis() as u64,
                reason = %reason,
                "Retrying TTS request"
            );

            if !sleep_unless_cancelled(wait, cancel).await {
                return Ok(SynthesisOutcome::empty(usage));
            }
        }

        Ok(SynthesisOutcome::empty(usage))
    }
}
