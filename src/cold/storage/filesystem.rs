use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ColdObjectStorage, ColdStorageObject};
use crate::cold::error::{check_cancelled, ColdError, ColdResult};
use crate::utils::atomic::{atomic_write, cleanup_temp_files, TEMP_SUFFIX};

/// Object storage rooted at a local directory.
///
/// Keys map to relative file paths. Writes go through temp-file + rename so
/// readers never observe a partial object. The ETag is the SHA-256 of the
/// content, so an unchanged rewrite keeps its ETag.
///
/// Conditional `put` and `create` are only atomic within one process. Two
/// processes sharing a root can both pass the ETag check, so an
/// `ObjectStorageLeaseManager` on this store does not exclude exporters in
/// other processes. Run one exporter process per root.
#[derive(Debug)]
pub struct FileSystemColdObjectStorage {
    root: PathBuf,
    /// Serializes conditional writes within this process
    write_lock: Mutex<()>,
}

impl FileSystemColdObjectStorage {
    /// Open (creating if needed) and remove temp files left by crashes
    pub fn open<P: AsRef<Path>>(root: P) -> ColdResult<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        let cleaned = cleanup_temp_files(&root)?;
        if cleaned > 0 {
            info!(root = %root.display(), cleaned, "removed leftover temp files");
        }
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> ColdResult<PathBuf> {
        let relative = Path::new(key);
        let valid = !key.is_empty()
            && !key.ends_with(TEMP_SUFFIX)
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !valid {
            return Err(ColdError::Storage(format!("invalid object key: {}", key)));
        }
        Ok(self.root.join(relative))
    }

    fn etag_of(data: &[u8]) -> String {
        hex::encode(Sha256::digest(data))
    }

    async fn read_current(&self, path: &Path) -> ColdResult<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_file(&self, path: PathBuf, data: Vec<u8>) -> ColdResult<String> {
        let etag = Self::etag_of(&data);
        tokio::task::spawn_blocking(move || atomic_write(path, &data))
            .await
            .map_err(|e| ColdError::Storage(e.to_string()))??;
        Ok(etag)
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> std::io::Result<()> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                self.collect_keys(&path, keys)?;
                continue;
            }
            if path.to_string_lossy().ends_with(TEMP_SUFFIX) {
                continue;
            }
            if let Ok(relative) = path.strip_prefix(&self.root) {
                let key = relative
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy())
                    .collect::<Vec<_>>()
                    .join("/");
                keys.push(key);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ColdObjectStorage for FileSystemColdObjectStorage {
    async fn get(&self, path: &str, cancel: &CancellationToken) -> ColdResult<ColdStorageObject> {
        check_cancelled(cancel)?;
        let file = self.resolve(path)?;
        match self.read_current(&file).await? {
            Some(data) => Ok(ColdStorageObject {
                etag: Self::etag_of(&data),
                data,
            }),
            None => Err(ColdError::NotFound {
                path: path.to_string(),
            }),
        }
    }

    async fn put(
        &self,
        path: &str,
        data: Vec<u8>,
        expected_etag: Option<&str>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        check_cancelled(cancel)?;
        let file = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;

        if let Some(expected) = expected_etag {
            let current = self.read_current(&file).await?;
            if current.as_deref().map(Self::etag_of).as_deref() != Some(expected) {
                return Err(ColdError::PreconditionFailed {
                    path: path.to_string(),
                });
            }
        }

        let etag = self.write_file(file, data).await?;
        debug!(key = path, etag = %etag, "stored object");
        Ok(etag)
    }

    async fn create(
        &self,
        path: &str,
        data: Vec<u8>,
        cancel: &CancellationToken,
    ) -> ColdResult<String> {
        check_cancelled(cancel)?;
        let file = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;

        if tokio::fs::try_exists(&file).await? {
            return Err(ColdError::PreconditionFailed {
                path: path.to_string(),
            });
        }
        self.write_file(file, data).await
    }

    async fn list(&self, prefix: &str, cancel: &CancellationToken) -> ColdResult<Vec<String>> {
        check_cancelled(cancel)?;
        let mut keys = Vec::new();
        self.collect_keys(&self.root, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, path: &str, cancel: &CancellationToken) -> ColdResult<bool> {
        check_cancelled(cancel)?;
        let file = self.resolve(path)?;
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&file).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
