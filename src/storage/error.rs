//! Storage error taxonomy. Never surfaced to the probe loop —
//! the scheduler logs these at `warn` and increments `store_drops_total`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to open storage at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: sled::Error,
    },

    #[error("storage read/write failed: {0}")]
    Backend(#[from] sled::Error),

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to flush storage: {0}")]
    Flush(std::io::Error),
}
