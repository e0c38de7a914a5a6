use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use eventsource_stream::{EventStreamError, Eventsource};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::tts_repository::{SpeechStream, TtsRepository, TtsRepositoryFactory};
use crate::domain::profile::Profile;
use crate::domain::tts::{InlineAudio, SpeechChunk, TokenUsage};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const API_KEY_HEADER: &str = "x-goog-api-key";

// -- Request types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateSpeechRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig<'a>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<TextPart<'a>>,
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    temperature: f64,
    response_modalities: [&'static str; 1],
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

// -- Response types --

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamPayload {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<u16>,
    #[serde(default)]
    message: String,
    status: Option<String>,
}

impl ApiError {
    fn describe(&self) -> String {
        let code = self.code.map(|c| c.to_string()).unwrap_or_default();
        let status = self.status.as_deref().unwrap_or_default();
        format!("{code} {status}: {}", self.message)
            .trim_start()
            .to_string()
    }
}

impl StreamPayload {
    fn into_chunk(self) -> Result<SpeechChunk, String> {
        if let Some(error) = self.error {
            return Err(error.describe());
        }

        let usage = self.usage_metadata.map(|u| TokenUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        let mut audio = Vec::new();
        for inline in self
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.inline_data)
        {
            let data = base64::engine::general_purpose::STANDARD
                .decode(inline.data.as_bytes())
                .map_err(|e| format!("invalid audio payload: {e}"))?;
            audio.push(InlineAudio {
                mime_type: inline.mime_type,
                data,
            });
        }

        Ok(SpeechChunk { usage, audio })
    }
}

/// Gemini streaming speech implementation of TTS repository
pub struct GeminiTtsRepository {
    client: Client,
    base_url: String,
    api_key: String,
    voice: String,
    temperature: f64,
}

impl GeminiTtsRepository {
    pub fn new(
        client: Client,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        voice: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
            voice: voice.into(),
            temperature,
        }
    }

    fn stream_url(&self, model: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        format!("{base}/models/{model}:streamGenerateContent?alt=sse")
    }

    fn request_body<'a>(&'a self, text: &'a str) -> GenerateSpeechRequest<'a> {
        GenerateSpeechRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![TextPart { text }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                response_modalities: ["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: &self.voice,
                        },
                    },
                },
            },
        }
    }
}

fn transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timeout: {e}")
    } else {
        format!("request failed: {e}")
    }
}

#[async_trait]
impl TtsRepository for GeminiTtsRepository {
    async fn stream_speech(&self, model: &str, text: &str) -> Result<SpeechStream, String> {
        tracing::info!(
            model = %model,
            voice = %self.voice,
            text_length = text.len(),
            "Calling Gemini TTS API"
        );

        let response = self
            .client
            .post(self.stream_url(model))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&self.request_body(text))
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, model = %model, "Gemini TTS request failed");
                transport_error(&e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = %status, model = %model, "Gemini TTS returned error");
            return Err(format!("{status}: {body}"));
        }

        let stream = response
            .bytes_stream()
            .eventsource()
            .filter_map(|event| async move {
                match event {
                    Ok(event) => {
                        let data = event.data.trim();
                        if data.is_empty() {
                            return None;
                        }
                        match serde_json::from_str::<StreamPayload>(data) {
                            Ok(payload) => Some(payload.into_chunk()),
                            Err(e) => {
                                tracing::debug!(error = %e, "Skipping unparseable Gemini SSE chunk");
                                None
                            }
                        }
                    }
                    Err(EventStreamError::Transport(e)) => Some(Err(transport_error(&e))),
                    Err(e) => Some(Err(format!("stream error: {e}"))),
                }
            });

        Ok(stream.boxed())
    }
}

/// Builds Gemini repositories sharing one HTTP client
pub struct GeminiTtsRepositoryFactory {
    client: Client,
    base_url: String,
}

impl GeminiTtsRepositoryFactory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

impl TtsRepositoryFactory for GeminiTtsRepositoryFactory {
    fn create(&self, profile: &Profile) -> Result<Arc<dyn TtsRepository>, String> {
        if !profile.has_api_key() {
            return Err("API key is not configured".to_string());
        }

        Ok(Arc::new(GeminiTtsRepository::new(
            self.client.clone(),
            self.base_url.clone(),
            profile.api_key.trim(),
            profile.voice.clone(),
            profile.effective_temperature(),
        )))
    }
}
