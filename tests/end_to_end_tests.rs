//! File-backed hot store and file-backed cold archive working together

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use common::{fixed_now, minutes_before, names};
use tiered_event_store::cold::{
    ColdCatalogReader, ColdEventStoreOptions, ColdExporter, ColdObjectStorage,
    FileSystemColdObjectStorage, HybridEventStore, ObjectStorageLeaseManager, ReadPath,
};
use tiered_event_store::event_store::{EventStore, JsonlEventStore, JsonlEventStoreConfig};
use tiered_event_store::utils::{Clock, ManualClock};

struct Tiers {
    dir: TempDir,
    hot: Arc<JsonlEventStore>,
    cold: Arc<dyn ColdObjectStorage>,
    options: ColdEventStoreOptions,
}

async fn tiers() -> Tiers {
    let dir = TempDir::new().unwrap();
    let hot = Arc::new(JsonlEventStore::new(JsonlEventStoreConfig::new(
        dir.path().join("hot"),
    )));
    let cold: Arc<dyn ColdObjectStorage> =
        Arc::new(FileSystemColdObjectStorage::open(dir.path().join("cold")).unwrap());
    let options = ColdEventStoreOptions::enabled().with_segment_limits(2, 1024 * 1024);

    hot.write_serializable_events(vec![
        minutes_before(30, "opened"),
        minutes_before(20, "deposited"),
        minutes_before(15, "withdrawn"),
        minutes_before(10, "deposited-again"),
        minutes_before(1, "pending"),
    ])
    .await
    .unwrap();

    Tiers {
        dir,
        hot,
        cold,
        options,
    }
}

fn exporter(tiers: &Tiers) -> ColdExporter {
    let clock: Arc<dyn Clock> = Arc::new(ManualClock::new(fixed_now()));
    ColdExporter::new(
        tiers.hot.clone(),
        tiers.cold.clone(),
        Arc::new(ObjectStorageLeaseManager::with_clock(
            tiers.cold.clone(),
            clock.clone(),
        )),
        tiers.options.clone(),
    )
    .with_clock(clock)
}

#[tokio::test]
async fn test_export_then_hybrid_read_returns_full_log() {
    let tiers = tiers().await;
    let cancel = CancellationToken::new();

    let result = exporter(&tiers)
        .export_incremental("default", &cancel)
        .await
        .unwrap();
    assert_eq!(result.exported_event_count, 4);
    assert_eq!(result.new_segments.len(), 2);

    let hybrid = HybridEventStore::new(
        tiers.hot.clone(),
        Some(tiers.cold.clone()),
        tiers.options.clone(),
    );
    let events = hybrid.read_all_serializable_events(None, None).await.unwrap();
    assert_eq!(
        names(&events),
        vec!["opened", "deposited", "withdrawn", "deposited-again", "pending"]
    );
    assert_eq!(
        hybrid.last_read_path(),
        Some(ReadPath::Hybrid { segments_read: 2 })
    );
}

#[tokio::test]
async fn test_catalog_reflects_export() {
    let tiers = tiers().await;
    let cancel = CancellationToken::new();
    exporter(&tiers)
        .export_incremental("default", &cancel)
        .await
        .unwrap();

    let catalog = ColdCatalogReader::new(Some(tiers.cold.clone()), tiers.options.clone());
    let status = catalog.get_status(&cancel).await.unwrap();
    assert!(status.is_supported && status.is_enabled);

    let summary = catalog
        .get_data_range_summary("default", &cancel)
        .await
        .unwrap();
    assert_eq!(summary.total_event_count, 4);
    assert_eq!(summary.segment_count, 2);
    assert_eq!(summary.segments[0].event_count, 2);
    assert!(summary.oldest_sortable_unique_id < summary.latest_sortable_unique_id);
}

#[tokio::test]
async fn test_archive_survives_reopen() {
    let tiers = tiers().await;
    let cancel = CancellationToken::new();
    exporter(&tiers)
        .export_incremental("default", &cancel)
        .await
        .unwrap();

    let reopened: Arc<dyn ColdObjectStorage> = Arc::new(
        FileSystemColdObjectStorage::open(tiers.dir.path().join("cold")).unwrap(),
    );
    let hybrid = HybridEventStore::new(tiers.hot.clone(), Some(reopened), tiers.options.clone());
    let events = hybrid
        .read_all_serializable_events(None, Some(3))
        .await
        .unwrap();
    assert_eq!(names(&events), vec!["opened", "deposited", "withdrawn"]);
}

#[tokio::test]
async fn test_later_cycle_picks_up_settled_tail() {
    let tiers = tiers().await;
    let cancel = CancellationToken::new();
    let clock = Arc::new(ManualClock::new(fixed_now()));
    let exporter = ColdExporter::new(
        tiers.hot.clone(),
        tiers.cold.clone(),
        Arc::new(ObjectStorageLeaseManager::with_clock(
            tiers.cold.clone(),
            clock.clone(),
        )),
        tiers.options.clone(),
    )
    .with_clock(clock.clone());

    assert_eq!(
        exporter
            .export_incremental("default", &cancel)
            .await
            .unwrap()
            .exported_event_count,
        4
    );

    // Lets the pending event settle past the safe window
    clock.advance(chrono::Duration::minutes(5));
    let second = exporter.export_incremental("default", &cancel).await.unwrap();
    assert_eq!(second.exported_event_count, 1);
    assert_eq!(second.updated_manifest_version, "2");

    let progress = exporter.get_progress("default", &cancel).await.unwrap();
    assert_eq!(progress.manifest_version, "2");
    assert_eq!(
        progress.latest_exported_sortable_unique_id,
        progress.latest_safe_sortable_unique_id
    );
}
