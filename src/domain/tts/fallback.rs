use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::dto::{RetryPolicy, SynthesisResult};
use super::error::SynthesisError;
use super::service::TtsServiceApi;
use crate::domain::profile::Profile;
use crate::domain::shared::{sleep_unless_cancelled, UsageStats};

/// Pause between a rate-limited primary call and the fallback call
pub const FALLBACK_PAUSE: Duration = Duration::from_secs(1);

pub const NO_AUDIO: &str = "No audio generated";
pub const FALLBACK_NO_AUDIO: &str = "Fallback model: No audio generated";
pub const CANCELLED_BEFORE_FALLBACK: &str = "Cancelled before fallback";

/// Switches to a secondary model when the primary one is rate limited.
/// Never returns an error; failures come back as `SynthesisResult::NoAudio`.
pub struct FallbackTtsService {
    client: Arc<dyn TtsServiceApi>,
    primary_model: String,
    fallback_model: String,
    enable_fallback: bool,
    policy: RetryPolicy,
}

impl FallbackTtsService {
    pub fn new(
        client: Arc<dyn TtsServiceApi>,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
        enable_fallback: bool,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            enable_fallback,
            policy,
        }
    }

    pub fn from_profile(client: Arc<dyn TtsServiceApi>, profile: &Profile) -> Self {
        Self::new(
            client,
            profile.primary_model.clone(),
            profile.fallback_model.clone(),
            profile.enable_fallback,
            RetryPolicy::from_profile(profile),
        )
    }

    pub fn primary_model(&self) -> &str {
        &self.primary_model
    }

    pub async fn synthesize_with_fallback(
        &self,
        text: &str,
        cancel: &CancellationToken,
    ) -> SynthesisResult {
        let primary = self
            .client
            .synthesize(text, &self.primary_model, &self.policy, cancel)
            .await;

        match primary {
            Ok(outcome) => match outcome.audio {
                Some(audio) => SynthesisResult::Audio {
                    audio,
                    model: self.primary_model.clone(),
                    usage: outcome.usage,
                },
                None => no_audio(NO_AUDIO, outcome.usage),
            },
            Err(SynthesisError::RateLimited(message)) if self.enable_fallback => {
                tracing::info!(
                    primary = %self.primary_model,
                    fallback = %self.fallback_model,
                    "Primary model rate limited, switching to fallback"
                );
                tracing::debug!(error = %message, "Rate limit details");
                self.run_fallback(text, cancel).await
            }
            Err(e) => no_audio(e.to_string(), UsageStats::default()),
        }
    }

    async fn run_fallback(&self, text: &str, cancel: &CancellationToken) -> SynthesisResult {
        if !sleep_unless_cancelled(FALLBACK_PAUSE, cancel).await {
            return no_audio(CANCELLED_BEFORE_FALLBACK, UsageStats::default());
        }

        match self
            .client
            .synthesize(text, &self.fallback_model, &self.policy, cancel)
            .await
        {
            Ok(outcome) => match outcome.audio {
                Some(audio) => SynthesisResult::Audio {
                    audio,
                    model: self.fallback_model.clone(),
                    usage: outcome.usage,
                },
                None => no_audio(FALLBACK_NO_AUDIO, outcome.usage),
            },
            Err(e) => no_audio(format!("Fallback failed: {e}"), UsageStats::default()),
        }
    }
}

fn no_audio(reason: impl Into<String>, usage: UsageStats) -> SynthesisResult {
    SynthesisResult::NoAudio {
        reason: reason.into(),
        usage,
    }
}
