use std::path::PathBuf;

use crate::domain::profile::{ConfigDocument, ProfileError};

/// Configuration store holding the profile document as JSON on disk
pub struct ProfileRepository {
    path: PathBuf,
}

impl ProfileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the configuration document. A missing file yields the defaults.
    pub async fn load(&self) -> Result<ConfigDocument, ProfileError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(
                    path = %self.path.display(),
                    "Configuration file not found, using defaults"
                );
                Ok(ConfigDocument::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write the full document back. Last writer wins.
    pub async fn save(&self, document: &ConfigDocument) -> Result<(), ProfileError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        tracing::debug!(path = %self.path.display(), "Configuration saved");
        Ok(())
    }
}
