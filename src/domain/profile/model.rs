use serde::{Deserialize, Serialize};

use crate::domain::shared::usage_dto::UsageStats;

pub const DEFAULT_PRIMARY_MODEL: &str = "gemini-2.5-pro-preview-tts";
pub const DEFAULT_FALLBACK_MODEL: &str = "gemini-2.5-flash-preview-tts";
pub const DEFAULT_VOICE: &str = "Zephyr";

const MIN_TEMPERATURE: f64 = 0.0;
const MAX_TEMPERATURE: f64 = 2.0;

/// Links a record type to one source text field and one target audio field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldMapping {
    #[serde(alias = "note_type")]
    pub record_type: String,
    pub source_field: String,
    pub target_field: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// A named bundle of API and processing configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub api_key: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub enable_fallback: bool,
    #[serde(alias = "voice_name")]
    pub voice: String,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<String>,
    #[serde(alias = "note_type_configs")]
    pub field_mappings: Vec<FieldMapping>,
    pub skip_existing_audio: bool,
    pub retry_on_empty: bool,
    pub verbose_logging: bool,
    /// Seconds to wait before every API call
    pub request_delay: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_tag: Option<String>,
    pub retry_attempts: u32,
    /// Base backoff in seconds, multiplied by the attempt number
    pub retry_delay: f64,
    pub usage_stats: UsageStats,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            primary_model: DEFAULT_PRIMARY_MODEL.to_string(),
            fallback_model: DEFAULT_FALLBACK_MODEL.to_string(),
            enable_fallback: true,
            voice: DEFAULT_VOICE.to_string(),
            temperature: 1.0,
            system_instruction: None,
            field_mappings: Vec::new(),
            skip_existing_audio: true,
            retry_on_empty: false,
            verbose_logging: false,
            request_delay: 0.0,
            success_tag: None,
            retry_attempts: 3,
            retry_delay: 2.0,
            usage_stats: UsageStats::default(),
        }
    }
}

impl Profile {
    /// Enabled mappings for a record type, in configured order
    pub fn mappings_for(&self, record_type: &str) -> Vec<&FieldMapping> {
        self.field_mappings
            .iter()
            .filter(|m| m.enabled && m.record_type == record_type)
            .collect()
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    pub fn has_enabled_mappings(&self) -> bool {
        self.field_mappings.iter().any(|m| m.enabled)
    }

    /// Temperature clamped into the range the API accepts
    pub fn effective_temperature(&self) -> f64 {
        if self.temperature.is_nan() {
            return 1.0;
        }
        self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE)
    }

    /// Non-blank system instruction, if any
    pub fn instruction(&self) -> Option<&str> {
        self.system_instruction
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn success_tag(&self) -> Option<&str> {
        self.success_tag
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

fn default_true() -> bool {
    true
}
