//! Pool of loaded model instances keyed by name.

use crate::engine::InferenceEngine;
use crate::registry::ModelRegistry;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Loaded model handles, kept in step with the registry's usage accounting.
///
/// Holds its own lock while calling into the registry; the registry never
/// calls back, so the lock order is always pool then registry.
pub struct ModelInstancePool<H: ?Sized + Send + Sync = dyn InferenceEngine> {
    registry: Arc<ModelRegistry>,
    instances: Mutex<HashMap<String, Arc<H>>>,
}

impl<H: ?Sized + Send + Sync> ModelInstancePool<H> {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Get the instance for `name`, counting a use on a hit.
    ///
    /// A miss returns `None` and leaves the registry untouched.
    pub fn get(&self, name: &str) -> Option<Arc<H>> {
        let instances = self.instances.lock();
        let Some(instance) = instances.get(name) else {
            debug!(model = %name, "Pool miss");
            return None;
        };
        self.registry.record_use(name);
        debug!(model = %name, "Pool hit");
        Some(Arc::clone(instance))
    }

    /// Store (or replace) the instance for `name` and mark it loaded.
    pub fn put(&self, name: &str, instance: Arc<H>) {
        let mut instances = self.instances.lock();
        if instances.insert(name.to_string(), instance).is_some() {
            info!(model = %name, "Replaced pooled model instance");
        } else {
            info!(model = %name, "Pooled model instance");
        }
        self.registry.mark_loaded(name);
    }

    /// Drop the instance for `name`; registry metadata is kept.
    ///
    /// Returns `true` if an instance was removed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.instances.lock().remove(name).is_some();
        if removed {
            info!(model = %name, "Removed pooled model instance");
        }
        removed
    }

    /// Drop every instance; registry metadata is kept. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut instances = self.instances.lock();
        let cleared_count = instances.len();
        instances.clear();
        info!(cleared_count, "Cleared all pooled model instances");
        cleared_count
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.instances.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.lock().is_empty()
    }

    /// Names with a live instance, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.lock().keys().cloned().collect();
        names.sort();
        names
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }
}

impl<H: ?Sized + Send + Sync> std::fmt::Debug for ModelInstancePool<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelInstancePool")
            .field("instances", &self.names())
            .finish_non_exhaustive()
    }
}
