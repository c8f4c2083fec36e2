//! Local caching of a remote event store

mod sync;

pub use sync::{
    CacheStatistics, CacheSyncAction, CacheSyncOptions, CacheSyncResult, EventStoreCacheSync,
};
