//! Model Cache
//!
//! Bounded registry of file-backed model artifacts with a pool of loaded
//! instances:
//! - Registering artifacts by path, with content hashing and a capacity bound
//!   enforced by least-used eviction (`ModelRegistry`)
//! - Persisting catalogue metadata across restarts (`MetadataStore`)
//! - Reusing loaded model handles and tracking their usage (`ModelInstancePool`)
//! - Wiring both together behind an explicit handle (`ModelCache`)
//!
//! Loading artifacts and running inference belong to the caller, through the
//! `ModelLoader` and `InferenceEngine` traits.

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metadata;
pub mod pool;
pub mod registry;
pub mod store;

pub use cache::ModelCache;
pub use config::{load_cache_config, CacheConfig, CacheConfigError};
pub use engine::{InferenceEngine, ModelLoader};
pub use error::{CacheError, CacheResult};
pub use logging::init_tracing;
pub use metadata::{sha256_file, ModelMetadata, HASH_CHUNK_SIZE};
pub use pool::ModelInstancePool;
pub use registry::{CacheStats, ModelRegistry, Registration, RegistrationOutcome};
pub use store::MetadataStore;
