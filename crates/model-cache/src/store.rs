//! Durable metadata store: one JSON file, replaced wholesale on every save.

use crate::error::{CacheError, CacheResult};
use crate::metadata::ModelMetadata;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// JSON file mapping model name to its metadata record.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    path: PathBuf,
}

impl MetadataStore {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the catalogue. A missing file is an empty catalogue.
    ///
    /// # Errors
    /// `CacheError::Persistence` if the file exists but is unreadable or corrupt.
    pub fn load(&self) -> CacheResult<HashMap<String, ModelMetadata>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(CacheError::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            }
        };

        let mut entries: HashMap<String, ModelMetadata> = serde_json::from_slice(&bytes)
            .map_err(|e| {
                CacheError::Persistence(format!("failed to parse {}: {e}", self.path.display()))
            })?;

        // The map key is authoritative for the entry's name.
        for (name, meta) in &mut entries {
            if meta.name != *name {
                meta.name.clone_from(name);
            }
        }

        Ok(entries)
    }

    /// Write the full catalogue, replacing the previous file.
    ///
    /// Data goes to a sibling `.tmp` file first and is renamed over the target,
    /// so a failed write leaves the previous contents in place.
    ///
    /// # Errors
    /// `CacheError::Persistence` if serialization or any filesystem step fails.
    pub fn save(&self, entries: &HashMap<String, ModelMetadata>) -> CacheResult<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|e| CacheError::Persistence(format!("failed to serialize catalogue: {e}")))?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        std::fs::write(&tmp, &json).map_err(|e| {
            CacheError::Persistence(format!("failed to write {}: {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            CacheError::Persistence(format!(
                "failed to replace {}: {e}",
                self.path.display()
            ))
        })?;

        Ok(())
    }
}
