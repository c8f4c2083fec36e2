//! Cold export leases
//!
//! At most one exporter per service may run at a time. A lease is held until
//! it expires or is released; the token proves ownership for renew/release.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::error::{check_cancelled, ColdError, ColdResult};
use super::paths::lease_path;
use super::storage::{get_optional, ColdObjectStorage};
use crate::types::ColdLease;
use crate::utils::time::{to_chrono, Clock};
use crate::utils::system_clock;

#[async_trait]
pub trait ColdLeaseManager: Send + Sync {
    /// Take the lease if it is free or expired, else `LeaseContended`
    async fn acquire(
        &self,
        lease_id: &str,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease>;

    /// Extend a lease we still hold, else `LeaseNotHeld`
    async fn renew(
        &self,
        lease: &ColdLease,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease>;

    /// Give the lease up, else `LeaseNotHeld`
    async fn release(&self, lease: &ColdLease, cancel: &CancellationToken) -> ColdResult<()>;
}

fn new_lease(lease_id: &str, now: DateTime<Utc>, duration: Duration) -> ColdLease {
    ColdLease {
        lease_id: lease_id.to_string(),
        token: Uuid::new_v4().to_string(),
        expires_at: now + to_chrono(duration),
    }
}

fn not_held(lease_id: &str) -> ColdError {
    ColdError::LeaseNotHeld {
        lease_id: lease_id.to_string(),
    }
}

fn contended(lease_id: &str) -> ColdError {
    ColdError::LeaseContended {
        lease_id: lease_id.to_string(),
    }
}

/// Process-local leases
pub struct InMemoryColdLeaseManager {
    leases: Mutex<HashMap<String, ColdLease>>,
    clock: Arc<dyn Clock>,
}

impl Default for InMemoryColdLeaseManager {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryColdLeaseManager {
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            leases: Mutex::new(HashMap::new()),
            clock,
        }
    }
}

#[async_trait]
impl ColdLeaseManager for InMemoryColdLeaseManager {
    async fn acquire(
        &self,
        lease_id: &str,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease> {
        check_cancelled(cancel)?;
        let now = self.clock.now();
        let mut leases = self.leases.lock();
        if let Some(existing) = leases.get(lease_id) {
            if !existing.is_expired_at(now) {
                return Err(contended(lease_id));
            }
        }
        let lease = new_lease(lease_id, now, duration);
        leases.insert(lease_id.to_string(), lease.clone());
        Ok(lease)
    }

    async fn renew(
        &self,
        lease: &ColdLease,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease> {
        check_cancelled(cancel)?;
        let now = self.clock.now();
        let mut leases = self.leases.lock();
        match leases.get_mut(&lease.lease_id) {
            Some(held) if held.token == lease.token && !held.is_expired_at(now) => {
                held.expires_at = now + to_chrono(duration);
                Ok(held.clone())
            }
            _ => Err(not_held(&lease.lease_id)),
        }
    }

    async fn release(&self, lease: &ColdLease, cancel: &CancellationToken) -> ColdResult<()> {
        check_cancelled(cancel)?;
        let mut leases = self.leases.lock();
        match leases.get(&lease.lease_id) {
            Some(held) if held.token == lease.token => {
                leases.remove(&lease.lease_id);
                Ok(())
            }
            _ => Err(not_held(&lease.lease_id)),
        }
    }
}

/// Leases stored as `leases/{leaseId}.json` objects, guarded by ETags.
///
/// Exclusion across processes is only as strong as the storage's
/// conditional writes; `FileSystemColdObjectStorage` enforces them within
/// one process only.
pub struct ObjectStorageLeaseManager {
    storage: Arc<dyn ColdObjectStorage>,
    clock: Arc<dyn Clock>,
}

impl ObjectStorageLeaseManager {
    pub fn new(storage: Arc<dyn ColdObjectStorage>) -> Self {
        Self::with_clock(storage, system_clock())
    }

    pub fn with_clock(storage: Arc<dyn ColdObjectStorage>, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    async fn load(
        &self,
        lease_id: &str,
        cancel: &CancellationToken,
    ) -> ColdResult<Option<(ColdLease, String)>> {
        let path = lease_path(lease_id);
        let Some(object) = get_optional(self.storage.as_ref(), &path, cancel).await? else {
            return Ok(None);
        };
        let lease = serde_json::from_slice(&object.data)
            .map_err(|source| ColdError::Corruption { path, source })?;
        Ok(Some((lease, object.etag)))
    }

    fn encode(lease: &ColdLease) -> ColdResult<Vec<u8>> {
        serde_json::to_vec(lease).map_err(|source| ColdError::Corruption {
            path: lease_path(&lease.lease_id),
            source,
        })
    }
}

#[async_trait]
impl ColdLeaseManager for ObjectStorageLeaseManager {
    async fn acquire(
        &self,
        lease_id: &str,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease> {
        let now = self.clock.now();
        let lease = new_lease(lease_id, now, duration);
        let data = Self::encode(&lease)?;
        let path = lease_path(lease_id);

        let written = match self.load(lease_id, cancel).await? {
            None => self.storage.create(&path, data, cancel).await,
            Some((existing, _)) if !existing.is_expired_at(now) => {
                return Err(contended(lease_id));
            }
            Some((_, etag)) => self.storage.put(&path, data, Some(&etag), cancel).await,
        };

        match written {
            Ok(_) => {
                debug!(lease_id, expires_at = %lease.expires_at, "acquired lease");
                Ok(lease)
            }
            // Someone else won the race
            Err(ColdError::PreconditionFailed { .. }) => Err(contended(lease_id)),
            Err(e) => Err(e),
        }
    }

    async fn renew(
        &self,
        lease: &ColdLease,
        duration: Duration,
        cancel: &CancellationToken,
    ) -> ColdResult<ColdLease> {
        let now = self.clock.now();
        let etag = match self.load(&lease.lease_id, cancel).await? {
            Some((held, etag)) if held.token == lease.token && !held.is_expired_at(now) => etag,
            _ => return Err(not_held(&lease.lease_id)),
        };

        let renewed = ColdLease {
            expires_at: now + to_chrono(duration),
            ..lease.clone()
        };
        let path = lease_path(&lease.lease_id);
        match self
            .storage
            .put(&path, Self::encode(&renewed)?, Some(&etag), cancel)
            .await
        {
            Ok(_) => Ok(renewed),
            Err(ColdError::PreconditionFailed { .. }) => Err(not_held(&lease.lease_id)),
            Err(e) => Err(e),
        }
    }

    /// Expires the record in place, conditional on the ETag we read; a lease
    /// taken over since then is left alone.
    async fn release(&self, lease: &ColdLease, cancel: &CancellationToken) -> ColdResult<()> {
        let (held, etag) = match self.load(&lease.lease_id, cancel).await? {
            Some((held, etag)) if held.token == lease.token => (held, etag),
            _ => return Err(not_held(&lease.lease_id)),
        };

        let now = self.clock.now();
        let expired = ColdLease {
            expires_at: held.expires_at.min(now),
            ..held
        };
        let path = lease_path(&lease.lease_id);
        match self
            .storage
            .put(&path, Self::encode(&expired)?, Some(&etag), cancel)
            .await
        {
            Ok(_) => {
                debug!(lease_id = %lease.lease_id, "released lease");
                Ok(())
            }
            Err(ColdError::PreconditionFailed { .. }) => Err(not_held(&lease.lease_id)),
            Err(e) => Err(e),
        }
    }
}
