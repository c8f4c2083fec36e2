//! Data types for the tiered event store
//!
//! This module contains the event model, the sortable ID, and the cold tier
//! catalog and status types shared by every component.

mod cache;
mod cold;
mod event;
mod sortable_id;

pub use cache::CacheMetadata;
pub use cold::{
    ColdCheckpoint, ColdDataRangeSummary, ColdFeatureStatus, ColdLease, ColdManifest,
    ColdSegmentInfo, ColdSegmentSummary, ColdStoreProgress, ExportResult,
    INITIAL_MANIFEST_VERSION,
};
pub use event::{Event, EventMetadata, InvalidTag, SerializableEvent, Tag};
pub use sortable_id::{compare_ids, timestamp_of, SortableIdError, SortableUniqueId};
