//! Bounded, durable catalogue of model artifacts.

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::metadata::ModelMetadata;
use crate::store::MetadataStore;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// What `register_entry` did with the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// A new catalogue entry was created.
    Inserted,
    /// The name was already known; nothing changed.
    AlreadyRegistered,
}

/// Result of a registration request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub outcome: RegistrationOutcome,
    /// Entry removed to make room for this one, if any.
    pub evicted: Option<String>,
}

/// Aggregate view over the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Number of registered models.
    pub total_models: usize,
    /// Number of registered models with a loaded instance.
    pub loaded_models: usize,
    /// Sum of artifact sizes in bytes.
    pub total_bytes: u64,
    /// Capacity of the catalogue.
    pub max_models: usize,
}

/// Registry of known model artifacts with a fixed capacity.
///
/// Every mutation rewrites the metadata store; a failed write is logged and
/// never rolls back or blocks the in-memory change.
#[derive(Debug)]
pub struct ModelRegistry {
    entries: Mutex<HashMap<String, ModelMetadata>>,
    store: MetadataStore,
    max_entries: usize,
}

impl ModelRegistry {
    /// Open a registry, reloading the catalogue from the metadata store.
    ///
    /// An unreadable or corrupt store is logged and the registry starts empty.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if the configuration is invalid.
    pub fn open(config: &CacheConfig) -> CacheResult<Self> {
        config.validate()?;

        if let Err(e) = std::fs::create_dir_all(&config.cache_dir) {
            warn!(
                dir = %config.cache_dir.display(),
                error = %e,
                "Failed to create model cache directory"
            );
        }

        let store = MetadataStore::new(config.metadata_path());
        let mut entries = match store.load() {
            Ok(entries) => entries,
            Err(e) => {
                error!(
                    path = %store.path().display(),
                    error = %e,
                    "Failed to load model cache metadata, starting empty"
                );
                HashMap::new()
            }
        };

        // No instance outlives the process that loaded it.
        for meta in entries.values_mut() {
            meta.is_loaded = false;
        }

        let registry = Self {
            entries: Mutex::new(HashMap::new()),
            store,
            max_entries: config.max_models,
        };

        let mut trimmed = false;
        while entries.len() > registry.max_entries {
            if let Some(name) = Self::evict_one(&mut entries) {
                warn!(model = %name, "Evicted model while reloading over-capacity catalogue");
                trimmed = true;
            }
        }
        if trimmed {
            registry.persist(&entries);
        }

        info!(
            count = entries.len(),
            max_models = registry.max_entries,
            "Loaded model cache metadata"
        );
        *registry.entries.lock() = entries;

        Ok(registry)
    }

    /// Register the artifact at `path` under `name` (default: the file name).
    ///
    /// # Errors
    /// Returns `CacheError::NotFound` if `path` is not an existing regular file.
    pub fn register(&self, path: &Path, name: Option<&str>) -> CacheResult<String> {
        self.register_entry(path, name).map(|r| r.name)
    }

    /// Like [`register`](Self::register), but also reports whether an entry
    /// was inserted and which entry, if any, was evicted for it.
    ///
    /// # Errors
    /// Returns `CacheError::NotFound` if `path` is not an existing regular file,
    /// or `CacheError::Io` if the artifact cannot be hashed.
    pub fn register_entry(&self, path: &Path, name: Option<&str>) -> CacheResult<Registration> {
        let mut entries = self.entries.lock();

        if !path.is_file() {
            return Err(CacheError::NotFound { path: path.to_path_buf() });
        }

        let name = match name {
            Some(name) => name.to_string(),
            None => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |f| f.to_string_lossy().into_owned()),
        };

        if entries.contains_key(&name) {
            debug!(model = %name, "Model already registered");
            return Ok(Registration {
                name,
                outcome: RegistrationOutcome::AlreadyRegistered,
                evicted: None,
            });
        }

        // Hash before evicting so a read failure leaves the catalogue untouched.
        let metadata = ModelMetadata::from_path(path, name.clone())?;

        let evicted = if entries.len() >= self.max_entries {
            Self::evict_one(&mut entries)
        } else {
            None
        };
        if let Some(evicted) = &evicted {
            info!(model = %evicted, "Evicting model");
        }

        entries.insert(name.clone(), metadata);
        self.persist(&entries);

        info!(model = %name, path = %path.display(), "Registered model");
        Ok(Registration {
            name,
            outcome: RegistrationOutcome::Inserted,
            evicted,
        })
    }

    /// Look up the metadata of `name`.
    #[must_use]
    pub fn get_metadata(&self, name: &str) -> Option<ModelMetadata> {
        self.entries.lock().get(name).cloned()
    }

    /// Snapshot of every entry, oldest registration first.
    #[must_use]
    pub fn list_models(&self) -> Vec<ModelMetadata> {
        let mut models: Vec<ModelMetadata> = self.entries.lock().values().cloned().collect();
        models.sort_by(|a, b| {
            a.registered_at
                .cmp(&b.registered_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        models
    }

    /// Count one use of `name`. Returns `false` if the name is not registered.
    pub fn record_use(&self, name: &str) -> bool {
        let mut entries = self.entries.lock();
        let Some(meta) = entries.get_mut(name) else {
            debug!(model = %name, "Usage recorded for unknown model, ignoring");
            return false;
        };
        meta.record_use();
        self.persist(&entries);
        true
    }

    /// Flag `name` as loaded. Returns `false` if the name is not registered.
    pub fn mark_loaded(&self, name: &str) -> bool {
        let mut entries = self.entries.lock();
        let Some(meta) = entries.get_mut(name) else {
            debug!(model = %name, "Load marked for unknown model, ignoring");
            return false;
        };
        meta.mark_loaded();
        self.persist(&entries);
        true
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.lock();
        CacheStats {
            total_models: entries.len(),
            loaded_models: entries.values().filter(|m| m.is_loaded).count(),
            total_bytes: entries.values().map(ModelMetadata::size).sum(),
            max_models: self.max_entries,
        }
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    #[must_use]
    pub fn metadata_path(&self) -> &Path {
        self.store.path()
    }

    /// Remove the entry with the smallest eviction key.
    fn evict_one(entries: &mut HashMap<String, ModelMetadata>) -> Option<String> {
        let victim = entries
            .values()
            .min_by(|a, b| a.eviction_key().cmp(&b.eviction_key()))
            .map(|meta| meta.name.clone())?;
        entries.remove(&victim);
        Some(victim)
    }

    fn persist(&self, entries: &HashMap<String, ModelMetadata>) {
        if let Err(e) = self.store.save(entries) {
            warn!(
                path = %self.store.path().display(),
                error = %e,
                "Failed to save model cache metadata"
            );
        }
    }
}
