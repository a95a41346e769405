//! Configuration for the model cache.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration for the model registry and its instance pool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of models kept in the catalogue (default: 3).
    #[serde(default = "default_max_models")]
    pub max_models: usize,

    /// Directory holding the metadata store (default: `.model_cache`).
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// File name of the metadata store inside `cache_dir` (default: `metadata.json`).
    #[serde(default = "default_metadata_file")]
    pub metadata_file: String,

    /// Drop the pooled instance of a model when its catalogue entry is evicted.
    ///
    /// Off by default: eviction only touches the catalogue and a live instance
    /// may stay in the pool until it is removed or cleared.
    #[serde(default)]
    pub reclaim_evicted_instances: bool,
}

fn default_max_models() -> usize {
    3
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".model_cache")
}

fn default_metadata_file() -> String {
    "metadata.json".to_string()
}

/// Errors that can occur while loading or validating cache configuration.
#[derive(Debug, Error)]
pub enum CacheConfigError {
    /// Invalid max models (must be > 0).
    #[error("Invalid max models: must be greater than 0")]
    InvalidMaxModels,

    /// Invalid metadata file name (must be a bare, non-empty file name).
    #[error("Invalid metadata file name: {0:?}")]
    InvalidMetadataFile(String),

    /// I/O error reading config file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Configuration validation error.
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_models: default_max_models(),
            cache_dir: default_cache_dir(),
            metadata_file: default_metadata_file(),
            reclaim_evicted_instances: false,
        }
    }
}

impl CacheConfig {
    /// Create a configuration rooted at `cache_dir` with the given capacity.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, max_models: usize) -> Self {
        Self {
            max_models,
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Validate the cache configuration.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), CacheConfigError> {
        if self.max_models == 0 {
            return Err(CacheConfigError::InvalidMaxModels);
        }

        let file = self.metadata_file.as_str();
        if file.is_empty() || file.contains('/') || file.contains('\\') {
            return Err(CacheConfigError::InvalidMetadataFile(self.metadata_file.clone()));
        }

        Ok(())
    }

    /// Full path of the metadata store.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.cache_dir.join(&self.metadata_file)
    }
}

/// Load cache configuration from a TOML file.
///
/// Reads the `[models.cache]` table. A missing file or a missing section
/// yields the default configuration.
///
/// # Errors
/// Returns error if the file exists but cannot be read, parsed or validated.
pub fn load_cache_config(config_path: &Path) -> Result<CacheConfig, CacheConfigError> {
    if !config_path.exists() {
        return Ok(CacheConfig::default());
    }

    let content = std::fs::read_to_string(config_path)?;
    let table: toml::Table = toml::from_str(&content)?;

    let Some(cache) = table
        .get("models")
        .and_then(toml::Value::as_table)
        .and_then(|models| models.get("cache"))
    else {
        return Ok(CacheConfig::default());
    };

    let config: CacheConfig = cache
        .clone()
        .try_into()
        .map_err(CacheConfigError::TomlParse)?;

    config
        .validate()
        .map_err(|e| CacheConfigError::Validation(format!("Invalid cache configuration: {}", e)))?;

    Ok(config)
}
