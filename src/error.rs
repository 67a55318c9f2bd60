//! Error types for registry persistence and remote status fetches.

use thiserror::Error;

/// Errors that can occur when persisting the game registry.
///
/// Returned by [`RegistryStore::save`](crate::RegistryStore::save). The
/// roster façade absorbs it (logging at error level) so none of its
/// operations has an error path.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to write the registry to the durable slot.
    #[error("failed to write registry slot")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The registry could not be serialized to JSON.
    #[error("failed to serialize registry")]
    Serialize {
        /// Underlying serialization error.
        #[source]
        source: serde_json::Error,
    },
}

/// Errors a [`StatusFetcher`](crate::StatusFetcher) implementation can report.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The fetch was aborted because the cancellation scope was torn down.
    /// Expected during shutdown; never logged or surfaced.
    #[error("status fetch cancelled")]
    Cancelled,

    /// Transport-level failure (network unreachable, timeout, bad response).
    /// Logged and retryable; never causes registry data loss.
    #[error("status fetch transport failure: {0}")]
    Transport(String),
}

impl FetchError {
    /// True for the cancellation variant, which reconciliation suppresses.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FetchError::Cancelled)
    }
}
