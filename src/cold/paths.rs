//! Object key layout in cold storage
//!
//! ```text
//! control/{serviceId}/manifest.json
//! control/{serviceId}/checkpoint.json
//! segments/{serviceId}/{fromId}_{toId}_{seq}.jsonl
//! leases/{leaseId}.json
//! ```

pub fn manifest_path(service_id: &str) -> String {
    format!("control/{}/manifest.json", service_id)
}

pub fn checkpoint_path(service_id: &str) -> String {
    format!("control/{}/checkpoint.json", service_id)
}

pub fn segment_prefix(service_id: &str) -> String {
    format!("segments/{}/", service_id)
}

/// Segment key: bounds plus the chunk index within one export cycle.
///
/// Re-exporting the same chunk after a crash yields the same key, so a retry
/// overwrites its own orphan instead of adding another.
pub fn segment_path(service_id: &str, from: &str, to: &str, seq: usize) -> String {
    format!("{}{}_{}_{:04}.jsonl", segment_prefix(service_id), from, to, seq)
}

pub fn lease_path(lease_id: &str) -> String {
    format!("leases/{}.json", lease_id)
}

pub fn export_lease_id(service_id: &str) -> String {
    format!("cold-export-{}", service_id)
}
