//! Manifest and checkpoint persistence
//!
//! Control documents are small JSON objects read together with their ETag so
//! the next write can be made conditional on nothing having changed.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::error::{ColdError, ColdResult};
use super::paths::{checkpoint_path, manifest_path};
use super::storage::{get_optional, ColdObjectStorage};
use crate::types::{ColdCheckpoint, ColdManifest};

/// A decoded document plus the ETag it was read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub etag: String,
}

async fn load<T: DeserializeOwned>(
    storage: &dyn ColdObjectStorage,
    path: String,
    cancel: &CancellationToken,
) -> ColdResult<Option<Versioned<T>>> {
    let Some(object) = get_optional(storage, &path, cancel).await? else {
        return Ok(None);
    };
    let value =
        serde_json::from_slice(&object.data).map_err(|source| ColdError::Corruption { path, source })?;
    Ok(Some(Versioned {
        value,
        etag: object.etag,
    }))
}

pub async fn load_manifest(
    storage: &dyn ColdObjectStorage,
    service_id: &str,
    cancel: &CancellationToken,
) -> ColdResult<Option<Versioned<ColdManifest>>> {
    load(storage, manifest_path(service_id), cancel).await
}

pub async fn load_checkpoint(
    storage: &dyn ColdObjectStorage,
    service_id: &str,
    cancel: &CancellationToken,
) -> ColdResult<Option<Versioned<ColdCheckpoint>>> {
    load(storage, checkpoint_path(service_id), cancel).await
}

/// Write a control document.
///
/// `previous_etag` is the ETag the caller read; `None` means the caller saw
/// no document and the write must create it.
pub async fn store<T: Serialize>(
    storage: &dyn ColdObjectStorage,
    path: &str,
    value: &T,
    previous_etag: Option<&str>,
    cancel: &CancellationToken,
) -> ColdResult<String> {
    let data = serde_json::to_vec_pretty(value).map_err(|source| ColdError::Corruption {
        path: path.to_string(),
        source,
    })?;
    match previous_etag {
        Some(etag) => storage.put(path, data, Some(etag), cancel).await,
        None => storage.create(path, data, cancel).await,
    }
}
