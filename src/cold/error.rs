//! Cold tier error taxonomy

use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::event_store::EventStoreError;
use crate::types::SortableIdError;

/// Result type for cold tier operations
pub type ColdResult<T> = Result<T, ColdError>;

#[derive(Debug, Error)]
pub enum ColdError {
    /// Cold tier not configured at all; never retryable
    #[error("cold event store is not supported: {0}")]
    NotSupported(String),

    #[error("cold event store is disabled")]
    Disabled,

    #[error("lease '{lease_id}' is held by another owner")]
    LeaseContended { lease_id: String },

    #[error("lease '{lease_id}' is not held by the presented token")]
    LeaseNotHeld { lease_id: String },

    #[error("object not found: {path}")]
    NotFound { path: String },

    #[error("precondition failed for {path}: etag mismatch")]
    PreconditionFailed { path: String },

    #[error("corrupted object {path}: {source}")]
    Corruption {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("corrupted segment {path} at line {line}: {source}")]
    CorruptSegment {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("manifest conflict for service '{service_id}': {reason}")]
    ManifestConflict { service_id: String, reason: String },

    /// Network, throttling or other transient object storage failure
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("hot store error: {0}")]
    HotStore(#[from] EventStoreError),

    #[error("invalid sortable id: {0}")]
    InvalidSortableId(#[from] SortableIdError),

    #[error("invalid cold options: {0}")]
    InvalidOptions(String),

    #[error("operation cancelled")]
    Cancelled,
}

impl ColdError {
    /// Whether retrying the same operation later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ColdError::LeaseContended { .. }
            | ColdError::PreconditionFailed { .. }
            | ColdError::ManifestConflict { .. }
            | ColdError::Storage(_)
            | ColdError::Io(_)
            | ColdError::Cancelled => true,
            ColdError::HotStore(e) => {
                matches!(e, EventStoreError::Backend(_) | EventStoreError::Io(_))
            }
            _ => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ColdError::NotFound { .. })
    }
}

/// Bail out between suspension points once the caller has cancelled
pub(crate) fn check_cancelled(cancel: &CancellationToken) -> ColdResult<()> {
    if cancel.is_cancelled() {
        Err(ColdError::Cancelled)
    } else {
        Ok(())
    }
}
