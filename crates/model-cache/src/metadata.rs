//! Descriptor of one on-disk model artifact plus its usage statistics.

use crate::error::{CacheError, CacheResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

/// Read size used when streaming an artifact through the hasher.
pub const HASH_CHUNK_SIZE: usize = 4096;

/// Metadata for a registered model artifact.
///
/// `size` and `content_hash` are fixed when the entry is created; only the
/// usage fields change afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Unique name of the model within its registry.
    #[serde(alias = "model_name")]
    pub name: String,
    /// Location of the artifact on disk.
    #[serde(alias = "model_path")]
    pub path: PathBuf,
    /// Size of the artifact in bytes at registration time.
    #[serde(alias = "file_size")]
    size: u64,
    /// Lowercase hex SHA-256 of the artifact at registration time.
    #[serde(alias = "file_hash")]
    content_hash: String,
    /// When the entry was added to the catalogue.
    #[serde(default = "Utc::now")]
    pub registered_at: DateTime<Utc>,
    /// First time an instance was stored in the pool.
    #[serde(default)]
    pub loaded_at: Option<DateTime<Utc>>,
    /// Last successful pool hit.
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    /// Number of successful pool hits.
    #[serde(default)]
    pub use_count: u64,
    /// Whether an instance has been stored in the pool.
    #[serde(default)]
    pub is_loaded: bool,
}

impl ModelMetadata {
    /// Build metadata for the artifact at `path`, hashing its full contents.
    ///
    /// # Errors
    /// Returns `CacheError::NotFound` if `path` is not an existing regular file,
    /// or `CacheError::Io` if it cannot be read.
    pub fn from_path(path: &Path, name: impl Into<String>) -> CacheResult<Self> {
        let size = match std::fs::metadata(path) {
            Ok(meta) if meta.is_file() => meta.len(),
            Ok(_) => return Err(CacheError::NotFound { path: path.to_path_buf() }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CacheError::NotFound { path: path.to_path_buf() });
            }
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            name: name.into(),
            path: path.to_path_buf(),
            size,
            content_hash: sha256_file(path)?,
            registered_at: Utc::now(),
            loaded_at: None,
            last_used_at: None,
            use_count: 0,
            is_loaded: false,
        })
    }

    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[must_use]
    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Count one use and stamp the time.
    pub fn record_use(&mut self) {
        self.last_used_at = Some(Utc::now());
        self.use_count += 1;
    }

    /// Flag the model as loaded. The first load timestamp is kept.
    pub fn mark_loaded(&mut self) {
        self.is_loaded = true;
        if self.loaded_at.is_none() {
            self.loaded_at = Some(Utc::now());
        }
    }

    /// Ordering key for eviction: the smallest key is evicted first.
    ///
    /// `None < Some(_)` on `Option`, so a never-used model sorts before any used one.
    #[must_use]
    pub fn eviction_key(&self) -> (u64, Option<DateTime<Utc>>, DateTime<Utc>, &str) {
        (self.use_count, self.last_used_at, self.registered_at, &self.name)
    }

    /// Re-hash the artifact and compare with the recorded hash.
    ///
    /// # Errors
    /// `NotFound` if the file is gone, `IntegrityMismatch` if its bytes changed.
    pub fn verify_integrity(&self) -> CacheResult<()> {
        if !self.path.is_file() {
            return Err(CacheError::NotFound { path: self.path.clone() });
        }

        let actual = sha256_file(&self.path)?;
        if actual != self.content_hash {
            return Err(CacheError::IntegrityMismatch {
                name: self.name.clone(),
                expected: self.content_hash.clone(),
                actual,
            });
        }
        Ok(())
    }
}

/// Stream a file through SHA-256 in `HASH_CHUNK_SIZE` reads and return the hex digest.
pub fn sha256_file(path: &Path) -> CacheResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_artifact(dir: &TempDir, file: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(file);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn test_from_path_records_size_and_hash() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "model.pt", b"abc");

        let meta = ModelMetadata::from_path(&path, "model.pt").unwrap();
        assert_eq!(meta.size(), 3);
        // SHA-256("abc")
        assert_eq!(
            meta.content_hash(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(meta.use_count, 0);
        assert!(meta.loaded_at.is_none());
        assert!(meta.last_used_at.is_none());
        assert!(!meta.is_loaded);
    }

    #[test]
    fn test_hash_spans_multiple_chunks() {
        let temp = TempDir::new().unwrap();
        let bytes: Vec<u8> = (0..HASH_CHUNK_SIZE * 3 + 17).map(|i| (i % 251) as u8).collect();
        let path = write_artifact(&temp, "big.bin", &bytes);

        let expected = hex::encode(Sha256::digest(&bytes));
        assert_eq!(sha256_file(&path).unwrap(), expected);
    }

    #[test]
    fn test_from_path_missing_file() {
        let temp = TempDir::new().unwrap();
        let result = ModelMetadata::from_path(&temp.path().join("nope.pt"), "nope");
        assert!(matches!(result, Err(CacheError::NotFound { .. })));
    }

    #[test]
    fn test_from_path_rejects_directory() {
        let temp = TempDir::new().unwrap();
        let result = ModelMetadata::from_path(temp.path(), "dir");
        assert!(matches!(result, Err(CacheError::NotFound { .. })));
    }

    #[test]
    fn test_mark_loaded_keeps_first_timestamp() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "m.pt", b"weights");
        let mut meta = ModelMetadata::from_path(&path, "m").unwrap();

        meta.mark_loaded();
        let first = meta.loaded_at;
        assert!(first.is_some());
        assert!(meta.is_loaded);

        std::thread::sleep(std::time::Duration::from_millis(5));
        meta.mark_loaded();
        assert_eq!(meta.loaded_at, first);
    }

    #[test]
    fn test_record_use() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "m.pt", b"weights");
        let mut meta = ModelMetadata::from_path(&path, "m").unwrap();

        meta.record_use();
        meta.record_use();
        assert_eq!(meta.use_count, 2);
        assert!(meta.last_used_at.is_some());
    }

    #[test]
    fn test_eviction_key_orders_unused_first() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "m.pt", b"weights");
        let unused = ModelMetadata::from_path(&path, "a").unwrap();
        let mut used = ModelMetadata::from_path(&path, "b").unwrap();
        used.record_use();

        assert!(unused.eviction_key() < used.eviction_key());
    }

    #[test]
    fn test_verify_integrity_detects_changes() {
        let temp = TempDir::new().unwrap();
        let path = write_artifact(&temp, "m.pt", b"v1");
        let meta = ModelMetadata::from_path(&path, "m").unwrap();
        assert!(meta.verify_integrity().is_ok());

        std::fs::write(&path, b"v2").unwrap();
        assert!(matches!(
            meta.verify_integrity(),
            Err(CacheError::IntegrityMismatch { .. })
        ));

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(meta.verify_integrity(), Err(CacheError::NotFound { .. })));
    }

    #[test]
    fn test_deserializes_legacy_field_names() {
        let json = r#"{
            "model_name": "legacy.pt",
            "model_path": "/models/legacy.pt",
            "file_size": 42,
            "file_hash": "deadbeef",
            "loaded_at": null,
            "last_used_at": "2024-05-01T12:00:00+00:00",
            "use_count": 7,
            "is_loaded": true
        }"#;

        let meta: ModelMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(meta.name, "legacy.pt");
        assert_eq!(meta.size(), 42);
        assert_eq!(meta.content_hash(), "deadbeef");
        assert_eq!(meta.use_count, 7);
        assert!(meta.last_used_at.is_some());
    }
}
