//! `ModelCache`: one registry and one instance pool wired together.

use crate::config::CacheConfig;
use crate::engine::{InferenceEngine, ModelLoader};
use crate::error::{CacheError, CacheResult};
use crate::pool::ModelInstancePool;
use crate::registry::{CacheStats, ModelRegistry, Registration};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Model cache owning a registry and the pool bound to it.
///
/// Construct one per process (or per tenant) and share it by reference or
/// `Arc`; there is no global instance.
pub struct ModelCache<H: ?Sized + Send + Sync = dyn InferenceEngine> {
    config: CacheConfig,
    registry: Arc<ModelRegistry>,
    pool: ModelInstancePool<H>,
}

impl<H: ?Sized + Send + Sync> ModelCache<H> {
    /// Open the cache described by `config`, reloading persisted metadata.
    ///
    /// # Errors
    /// Returns `CacheError::Config` if the configuration is invalid.
    pub fn open(config: CacheConfig) -> CacheResult<Self> {
        let registry = Arc::new(ModelRegistry::open(&config)?);
        let pool = ModelInstancePool::new(Arc::clone(&registry));
        Ok(Self {
            config,
            registry,
            pool,
        })
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    #[must_use]
    pub fn pool(&self) -> &ModelInstancePool<H> {
        &self.pool
    }

    /// Register an artifact.
    ///
    /// With `reclaim_evicted_instances` set, the instance of an evicted model
    /// is dropped from the pool as well.
    ///
    /// # Errors
    /// Returns `CacheError::NotFound` if `path` is not an existing regular file.
    pub fn register(&self, path: &Path, name: Option<&str>) -> CacheResult<Registration> {
        let registration = self.registry.register_entry(path, name)?;

        if let Some(evicted) = &registration.evicted {
            if self.config.reclaim_evicted_instances {
                self.pool.remove(evicted);
            } else if self.pool.contains(evicted) {
                debug!(model = %evicted, "Evicted model still has a pooled instance");
            }
        }

        Ok(registration)
    }

    /// Return the pooled instance for `name`, loading it on a miss.
    ///
    /// The loader runs without holding any cache lock. A failed load leaves
    /// both the pool and the registry unchanged.
    ///
    /// # Errors
    /// `UnknownModel` if `name` is not registered, `Load` if the loader fails.
    pub fn acquire<L>(&self, name: &str, loader: &L) -> CacheResult<Arc<H>>
    where
        L: ModelLoader<H> + ?Sized,
    {
        if let Some(instance) = self.pool.get(name) {
            return Ok(instance);
        }

        let metadata = self
            .registry
            .get_metadata(name)
            .ok_or_else(|| CacheError::UnknownModel(name.to_string()))?;

        let instance = loader.load(&metadata).map_err(|source| {
            warn!(model = %name, error = %source, "Failed to load model");
            CacheError::Load {
                name: name.to_string(),
                source,
            }
        })?;

        info!(model = %name, path = %metadata.path.display(), "Loaded model");
        self.pool.put(name, Arc::clone(&instance));
        Ok(instance)
    }

    /// Check that the artifact behind `name` still has its registered hash.
    ///
    /// # Errors
    /// `UnknownModel` if `name` is not registered, `NotFound` if the artifact
    /// is gone, `IntegrityMismatch` if its contents changed.
    pub fn verify(&self, name: &str) -> CacheResult<()> {
        let metadata = self
            .registry
            .get_metadata(name)
            .ok_or_else(|| CacheError::UnknownModel(name.to_string()))?;

        metadata.verify_integrity().inspect_err(|e| {
            warn!(model = %name, error = %e, "Model artifact failed verification");
        })
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.registry.stats()
    }
}

impl<H: ?Sized + Send + Sync> std::fmt::Debug for ModelCache<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .field("pool", &self.pool)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ModelMetadata;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    #[derive(Debug)]
    struct Weights(Vec<u8>);

    impl InferenceEngine for Weights {}

    struct FileLoader {
        calls: AtomicUsize,
    }

    impl ModelLoader<dyn InferenceEngine> for FileLoader {
        fn load(&self, metadata: &ModelMetadata) -> anyhow::Result<Arc<dyn InferenceEngine>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let bytes = std::fs::read(&metadata.path)?;
            Ok(Arc::new(Weights(bytes)))
        }
    }

    fn artifact(temp: &TempDir, file: &str, bytes: &[u8]) -> PathBuf {
        let path = temp.path().join(file);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    fn open(temp: &TempDir, max_models: usize, reclaim: bool) -> ModelCache {
        let mut config = CacheConfig::new(temp.path().join("cache"), max_models);
        config.reclaim_evicted_instances = reclaim;
        ModelCache::open(config).unwrap()
    }

    #[test]
    fn test_acquire_loads_once_then_hits() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 2, false);
        cache.register(&artifact(&temp, "a.pt", b"a"), Some("A")).unwrap();
        let loader = FileLoader { calls: AtomicUsize::new(0) };

        let first = cache.acquire("A", &loader).unwrap();
        let second = cache.acquire("A", &loader).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

        // The load itself is not a use; only the second acquire hit the pool.
        let meta = cache.registry().get_metadata("A").unwrap();
        assert_eq!(meta.use_count, 1);
        assert!(meta.is_loaded);
    }

    #[test]
    fn test_acquire_unknown_model() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 2, false);
        let loader = FileLoader { calls: AtomicUsize::new(0) };

        let result = cache.acquire("ghost", &loader);
        assert!(matches!(result, Err(CacheError::UnknownModel(_))));
        assert_eq!(loader.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_acquire_failed_load_leaves_state_untouched() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 2, false);
        cache.register(&artifact(&temp, "a.pt", b"a"), Some("A")).unwrap();

        let failing = |_: &ModelMetadata| -> anyhow::Result<Arc<dyn InferenceEngine>> {
            anyhow::bail!("corrupt checkpoint")
        };

        let result = cache.acquire("A", &failing);
        assert!(matches!(result, Err(CacheError::Load { .. })));
        assert!(cache.pool().is_empty());
        assert!(!cache.registry().get_metadata("A").unwrap().is_loaded);
    }

    #[test]
    fn test_register_keeps_orphan_by_default() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 1, false);
        let loader = FileLoader { calls: AtomicUsize::new(0) };
        cache.register(&artifact(&temp, "a.pt", b"a"), Some("A")).unwrap();
        cache.acquire("A", &loader).unwrap();

        let r = cache.register(&artifact(&temp, "b.pt", b"b"), Some("B")).unwrap();
        assert_eq!(r.evicted.as_deref(), Some("A"));
        assert!(cache.pool().contains("A"));
    }

    #[test]
    fn test_register_reclaims_evicted_instance() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 1, true);
        let loader = FileLoader { calls: AtomicUsize::new(0) };
        cache.register(&artifact(&temp, "a.pt", b"a"), Some("A")).unwrap();
        cache.acquire("A", &loader).unwrap();

        cache.register(&artifact(&temp, "b.pt", b"b"), Some("B")).unwrap();
        assert!(!cache.pool().contains("A"));
        assert!(cache.registry().contains("B"));
    }

    #[test]
    fn test_verify() {
        let temp = TempDir::new().unwrap();
        let cache = open(&temp, 2, false);
        let path = artifact(&temp, "a.pt", b"original");
        cache.register(&path, Some("A")).unwrap();

        assert!(cache.verify("A").is_ok());
        assert!(matches!(cache.verify("B"), Err(CacheError::UnknownModel(_))));

        std::fs::write(&path, b"tampered").unwrap();
        assert!(matches!(
            cache.verify("A"),
            Err(CacheError::IntegrityMismatch { .. })
        ));
    }
}
