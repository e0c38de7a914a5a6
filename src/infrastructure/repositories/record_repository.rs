use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::record::{Record, RecordId};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record {0} not found")]
    NotFound(RecordId),
    #[error("invalid media file name: {0}")]
    InvalidMediaName(String),
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Access to the user's records and media folder.
///
/// Implementations are only ever touched from the owner context, so they do
/// not need to be `Sync`.
pub trait RecordStore: Send {
    /// Fetch a record; `Ok(None)` when it does not exist (or was deleted)
    fn get_record(&self, id: RecordId) -> Result<Option<Record>, StoreError>;

    /// Persist a modified record. Fails with `NotFound` if it was deleted.
    fn update_record(&mut self, record: Record) -> Result<(), StoreError>;

    /// Store a media blob and return the filename it was saved under
    fn write_media(&mut self, name: &str, data: &[u8]) -> Result<String, StoreError>;
}

/// Record store backed by a JSON array on disk and a media directory.
///
/// Without paths it keeps everything in memory.
pub struct JsonRecordStore {
    records: BTreeMap<RecordId, Record>,
    records_path: Option<PathBuf>,
    media_dir: Option<PathBuf>,
    media: HashMap<String, Vec<u8>>,
}

impl JsonRecordStore {
    /// Load records from `records_path`. A missing file is an empty collection.
    pub fn open(
        records_path: impl Into<PathBuf>,
        media_dir: impl Into<PathBuf>,
    ) -> Result<Self, StoreError> {
        let records_path = records_path.into();
        let media_dir = media_dir.into();

        let records: Vec<Record> = match fs::read(&records_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %records_path.display(), "Records file not found, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        fs::create_dir_all(&media_dir)?;

        tracing::info!(
            path = %records_path.display(),
            media_dir = %media_dir.display(),
            record_count = records.len(),
            "Record store opened"
        );

        Ok(Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
            records_path: Some(records_path),
            media_dir: Some(media_dir),
            media: HashMap::new(),
        })
    }

    pub fn in_memory(records: Vec<Record>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.id, r)).collect(),
            records_path: None,
            media_dir: None,
            media: HashMap::new(),
        }
    }

    #[cfg(test)]
    fn remove_record(&mut self, id: RecordId) -> Result<Option<Record>, StoreError> {
        let removed = self.records.remove(&id);
        self.flush()?;
        Ok(removed)
    }

    #[cfg(test)]
    fn read_media(&self, name: &str) -> Option<Vec<u8>> {
        match &self.media_dir {
            Some(dir) => fs::read(dir.join(name)).ok(),
            None => self.media.get(name).cloned(),
        }
    }

    fn media_exists(&self, name: &str) -> bool {
        match &self.media_dir {
            Some(dir) => dir.join(name).exists(),
            None => self.media.contains_key(name),
        }
    }

    /// Pick a name that does not collide with an existing media file
    fn unique_media_name(&self, name: &str) -> String {
        if !self.media_exists(name) {
            return name.to_string();
        }
        let (stem, ext) = match name.rsplit_once('.') {
            Some((stem, ext)) => (stem, format!(".{ext}")),
            None => (name, String::new()),
        };
        (1..)
            .map(|n| format!("{stem}-{n}{ext}"))
            .find(|candidate| !self.media_exists(candidate))
            .unwrap_or_else(|| name.to_string())
    }

    fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.records_path else {
            return Ok(());
        };
        let records: Vec<&Record> = self.records.values().collect();
        let bytes = serde_json::to_vec_pretty(&records)?;
        write_atomically(path, &bytes)?;
        Ok(())
    }
}

impl RecordStore for JsonRecordStore {
    fn get_record(&self, id: RecordId) -> Result<Option<Record>, StoreError> {
        Ok(self.records.get(&id).cloned())
    }

    fn update_record(&mut self, record: Record) -> Result<(), StoreError> {
        match self.records.get_mut(&record.id) {
            Some(existing) => *existing = record,
            None => return Err(StoreError::NotFound(record.id)),
        }
        self.flush()
    }

    fn write_media(&mut self, name: &str, data: &[u8]) -> Result<String, StoreError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(StoreError::InvalidMediaName(name.to_string()));
        }

        let filename = self.unique_media_name(name);
        match &self.media_dir {
            Some(dir) => fs::write(dir.join(&filename), data)?,
            None => {
                self.media.insert(filename.clone(), data.to_vec());
            }
        }

        tracing::debug!(filename = %filename, size = data.len(), "Media file written");
        Ok(filename)
    }
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}
