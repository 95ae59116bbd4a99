//! Error taxonomy.
//!
//! `ConfigError` aborts startup. `ValidationError` drops a single monitor but
//! load continues. `ProbeError` never panics its caller — probes convert it
//! into a `down` `CheckResult` instead of propagating it. `StorageError`
//! lives in `storage::error` since it is scoped to that module's boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("duplicate monitor name '{0}' across groups")]
    DuplicateMonitorName(String),

    #[error("invalid duration '{0}': expected suffix of s, m, or h")]
    InvalidDuration(String),

    #[error("invalid storage configuration: {0}")]
    InvalidStorage(String),
}

/// Raised by the monitor manager for a single malformed monitor entry. The
/// entry is skipped; load continues with the remainder.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("monitor '{name}': {reason}")]
    InvalidMonitor { name: String, reason: String },
}

/// Failure classification for a single probe execution. Probes
/// never return this to a caller that could panic on it — it is always
/// converted into a `down` `CheckResult` with a descriptive message.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("connection failed: {0}")]
    Connection(String),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ProbeError {
    pub fn into_message(self) -> String {
        self.to_string()
    }
}
