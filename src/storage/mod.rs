//! Persistent store: an interface over an embedded
//! sorted-KV backend, so the rest of the daemon never knows whether it's
//! talking to `sled` or to nothing at all.

pub mod backend;
pub mod error;
pub mod noop;
pub mod sled_backend;

pub use backend::{Capabilities, StorageBackend};
pub use error::StorageError;

use std::sync::Arc;

use crate::config::{ResolvedConfig, StorageBackendKind};

pub fn build_backend(config: &ResolvedConfig) -> Result<Arc<dyn StorageBackend>, StorageError> {
    if !config.storage.enabled || config.storage.backend == StorageBackendKind::Noop {
        return Ok(Arc::new(noop::NoopBackend));
    }

    let backend = sled_backend::SledBackend::open(
        &config.storage.path,
        config.storage.retention_days,
        config.storage.enable_aggregation,
    )?;
    Ok(Arc::new(backend))
}
