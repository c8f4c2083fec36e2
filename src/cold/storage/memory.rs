use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use super::{ColdObjectStorage, ColdStorageObject};
use crate::cold::error::{check_cancelled, ColdError, ColdResult};

/// In-memory object storage for tests and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryColdObjectStorage {
    objects: RwLock<BTreeMap<String, ColdStorageObject>>,
    next_etag: AtomicU64,
}

impl InMemoryColdObjectStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_etag(&self) -> String {
        format!("\"{}\"", self.next_etag.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

#[async_trait]
impl ColdObjectStorage for InMemoryColdObjectStorage {
    async fn get(&self, path: &str, cancel: &CancellationToken) -> ColdResult<ColdStorageObject> {
        check_cancelled(cancel)?;
        self.objects
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| ColdError::NotFound {
                path: path.to_string(),
            })
    }

    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        check_cancelled(cancel)?;
        let mut objects = self.objects.write().await;

        if let Some(expected) = expected_etag {
            let current = objects.get(path).map(|o| o.etag.as_str());
            if current != Some(expected) {
                return Err(ColdError::PreconditionFailed {
                    path: path.to_string(),
                });
            }
        }

        let etag = self.fresh_etag();
        objects.insert(
            path.to_string(),
            ColdStorageObject {
                data,
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        check_cancelled(cancel)?;
        let mut objects = self.objects.write().await;
        if objects.contains_key(path) {
            return Err(ColdError::PreconditionFailed {
                path: path.to_string(),
            });
        }

        let etag = self.fresh_etag();
        objects.insert(
            path.to_string(),
            ColdStorageObject {
                data,
                etag: etag.clone(),
            },
        );
        Ok(etag)
    }

    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> ColdResult<Vec<String>> {
        check_cancelled(cancel)?;
        Ok(self
            .objects
            .read()
            .await
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> ColdResult<bool> {
        check_cancelled(cancel)?;
        Ok(self.objects.write().await.remove(path).is_some())
    }
}
