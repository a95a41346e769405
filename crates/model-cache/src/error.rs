use crate::config::CacheConfigError;
use std::path::PathBuf;
use thiserror::Error;

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The artifact path does not exist or is not a regular file.
    #[error("model file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// The metadata store could not be read or written.
    #[error("metadata store error: {0}")]
    Persistence(String),

    #[error("unknown model: {0}")]
    UnknownModel(String),

    #[error("failed to load model {name}: {source}")]
    Load {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("content hash mismatch for model {name}: expected {expected}, found {actual}")]
    IntegrityMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error(transparent)]
    Config(#[from] CacheConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
