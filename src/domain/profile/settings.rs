use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::error::ProfileError;
use super::model::Profile;

pub const LEGACY_PROFILE_NAME: &str = "default";

/// Persisted configuration in either of its two historical shapes.
///
/// A document carrying `profiles` or `current_profile` is the named-profiles
/// shape and must parse as such; anything else is a flat legacy profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConfigDocument {
    Profiles(ProfilesDocument),
    Legacy(Profile),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfilesDocument {
    #[serde(default)]
    pub current_profile: String,
    pub profiles: BTreeMap<String, Profile>,
}

impl<'de> Deserialize<'de> for ConfigDocument {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let is_profiles_shape = value
            .as_object()
            .is_some_and(|obj| obj.contains_key("profiles") || obj.contains_key("current_profile"));

        if is_profiles_shape {
            ProfilesDocument::deserialize(value)
                .map(Self::Profiles)
                .map_err(de::Error::custom)
        } else {
            Profile::deserialize(value)
                .map(Self::Legacy)
                .map_err(de::Error::custom)
        }
    }
}

impl Default for ConfigDocument {
    fn default() -> Self {
        Self::Legacy(Profile::default())
    }
}

impl ConfigDocument {
    /// Name of the profile a batch would run with
    pub fn active_profile_name(&self) -> Result<String, ProfileError> {
        match self {
            Self::Legacy(_) => Ok(LEGACY_PROFILE_NAME.to_string()),
            Self::Profiles(doc) => {
                if doc.profiles.contains_key(&doc.current_profile) {
                    return Ok(doc.current_profile.clone());
                }
                // Stale or missing pointer: fall back to the first profile
                doc.profiles
                    .keys()
                    .next()
                    .cloned()
                    .ok_or(ProfileError::NoProfiles)
            }
        }
    }

    /// Resolve the active profile into one canonical structure
    pub fn active_profile(&self) -> Result<(String, Profile), ProfileError> {
        let name = self.active_profile_name()?;
        let profile = match self {
            Self::Legacy(profile) => profile.clone(),
            Self::Profiles(doc) => doc
                .profiles
                .get(&name)
                .cloned()
                .ok_or_else(|| ProfileError::UnknownProfile(name.clone()))?,
        };
        Ok((name, profile))
    }

    /// Replace the active profile, keeping the document's shape
    pub fn replace_active_profile(&mut self, profile: Profile) -> Result<(), ProfileError> {
        let name = self.active_profile_name()?;
        match self {
            Self::Legacy(existing) => *existing = profile,
            Self::Profiles(doc) => {
                doc.profiles.insert(name, profile);
            }
        }
        Ok(())
    }
}
