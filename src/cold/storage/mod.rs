//! Cold object storage abstraction
//!
//! A minimal blob contract with ETag-based optimistic concurrency. Backends:
//! - `InMemoryColdObjectStorage`: map in memory, counter ETags
//! - `FileSystemColdObjectStorage`: files under a root directory, SHA-256 ETags
//!
//! Cloud blob backends only need to implement the trait.

mod filesystem;
mod memory;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::error::{ColdError, ColdResult};

pub use filesystem::FileSystemColdObjectStorage;
pub use memory::InMemoryColdObjectStorage;

/// Object bytes plus the version tag they were read at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColdStorageObject {
    pub data: Vec<u8>,
    pub etag: String,
}

#[async_trait]
pub trait ColdObjectStorage: Send + Sync {
    /// Read an object; `ColdError::NotFound` if absent
    async fn get(&self, path: &str, cancel: &CancellationToken) -> ColdResult<ColdStorageObject>;

    /// Write an object and return its new ETag.
    ///
    /// With `expected_etag` the write only succeeds if the stored object
    /// currently has that ETag, otherwise `PreconditionFailed`. Without it
    /// the write is unconditional.
    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
        cancel: &CancellationToken,
    ) -> ColdResult<String>;

    /// Write only if no object exists at `path`, otherwise `PreconditionFailed`
    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ColdResult<String>;

    /// Keys starting with `prefix`, sorted
    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> ColdResult<Vec<String>>;

    /// Remove an object; returns whether it existed
    async fn delete(&self, path: &str, cancel: &CancellationToken) -> ColdResult<bool>;
}

/// `get` that maps `NotFound` to `None`
pub async fn get_optional(
    storage: &dyn ColdObjectStorage,
    path: &str,
    cancel: &CancellationToken,
) -> ColdResult<Option<ColdStorageObject>> {
    match storage.get(path, cancel).await {
        Ok(object) => Ok(Some(object)),
        Err(ColdError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}
