use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type RecordId = i64;

/// Marker that identifies a field already holding an audio reference
pub const SOUND_TAG_PREFIX: &str = "[sound:";

/// One user data item with named fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    pub record_type: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Record {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn set_field(&mut self, name: &str, value: String) {
        self.fields.insert(name.to_string(), value);
    }

    /// True when the field exists and already references an audio file
    pub fn has_audio(&self, name: &str) -> bool {
        self.field(name)
            .is_some_and(|value| value.contains(SOUND_TAG_PREFIX))
    }

    /// Add a tag unless it is already present
    pub fn add_tag(&mut self, tag: &str) {
        if !self.tags.iter().any(|t| t == tag) {
            self.tags.push(tag.to_string());
        }
    }
}

/// Reference written into a target field for a stored media file
pub fn sound_reference(filename: &str) -> String {
    format!("{SOUND_TAG_PREFIX}{filename}]")
}
