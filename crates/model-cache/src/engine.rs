//! Seam to the inference engine that produces loaded model handles.
//!
//! The cache stores and returns handles but never calls into them.

use crate::metadata::ModelMetadata;
use std::sync::Arc;

/// Capability of a loaded model handle held by the pool.
pub trait InferenceEngine: Send + Sync {}

/// Builds a loaded handle from a registered artifact.
pub trait ModelLoader<H: ?Sized>: Send + Sync {
    /// Load the artifact described by `metadata`.
    fn load(&self, metadata: &ModelMetadata) -> anyhow::Result<Arc<H>>;
}

impl<H, F> ModelLoader<H> for F
where
    H: ?Sized,
    F: Fn(&ModelMetadata) -> anyhow::Result<Arc<H>> + Send + Sync,
{
    fn load(&self, metadata: &ModelMetadata) -> anyhow::Result<Arc<H>> {
        self(metadata)
    }
}
