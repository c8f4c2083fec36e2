//! Safe window filter
//!
//! Hot stores may still receive events whose IDs land slightly in the past
//! (clock skew, in-flight commits). Only events at or before the cutoff are
//! considered settled and eligible for archival.

use chrono::{DateTime, Utc};

use crate::types::{SerializableEvent, SortableIdError};
use crate::utils::time::to_chrono;

/// Result of partitioning a batch around the cutoff
#[derive(Debug, Default)]
pub struct SafeWindowSplit {
    pub safe: Vec<SerializableEvent>,
    pub pending: Vec<SerializableEvent>,
}

/// Cutoff for a given "now" and window length
pub fn cutoff(now: DateTime<Utc>, safe_window: std::time::Duration) -> DateTime<Utc> {
    now - to_chrono(safe_window)
}

/// Partition events into safe (timestamp <= cutoff) and pending, keeping
/// input order within each side
pub fn partition(
    events: Vec<SerializableEvent>,
    cutoff: DateTime<Utc>,
) -> Result<SafeWindowSplit, SortableIdError> {
    let mut split = SafeWindowSplit::default();
    for event in events {
        if event.timestamp()? <= cutoff {
            split.safe.push(event);
        } else {
            split.pending.push(event);
        }
    }
    Ok(split)
}

/// Keep only the events eligible for archival
pub fn apply(
    events: Vec<SerializableEvent>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<SerializableEvent>, SortableIdError> {
    Ok(partition(events, cutoff)?.safe)
}
