//! Cold tier: archival of settled events into immutable segments
//!
//! - `exporter`: moves events out of the hot store under a lease
//! - `hybrid`: reads both tiers as one ordered stream
//! - `catalog`: status and range summaries from the manifest
//! - `storage` / `lease`: pluggable object storage and lease backends

pub mod catalog;
pub mod control;
mod error;
pub mod exporter;
pub mod hybrid;
pub mod lease;
mod options;
pub mod paths;
pub mod safe_window;
pub mod scheduler;
pub mod segment;
mod service_id;
pub mod splitter;
pub mod storage;

pub use catalog::ColdCatalogReader;
pub use error::{ColdError, ColdResult};
pub use exporter::{ColdExporter, MAX_MANIFEST_RETRIES};
pub use hybrid::{HotOnlyReason, HybridEventStore, ReadPath};
pub use lease::{ColdLeaseManager, InMemoryColdLeaseManager, ObjectStorageLeaseManager};
pub use options::ColdEventStoreOptions;
pub use scheduler::run_export_loop;
pub use service_id::{
    DefaultServiceIdProvider, FixedServiceIdProvider, ServiceIdProvider, DEFAULT_SERVICE_ID,
};
pub use storage::{
    ColdObjectStorage, ColdStorageObject, FileSystemColdObjectStorage, InMemoryColdObjectStorage,
};
