//! Periodic export loop, one per service

use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::ColdError;
use super::exporter::ColdExporter;

/// Run `export_incremental` every `pull_interval` until `cancel` fires.
///
/// Returns the number of cycles that committed at least one event.
pub async fn run_export_loop(
    exporter: Arc<ColdExporter>,
    service_id: String,
    cancel: CancellationToken,
) -> u64 {
    let mut ticker = interval(exporter.options().pull_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut committed = 0u64;

    info!(service_id = %service_id, "export loop started");
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(service_id = %service_id, committed, "export loop cancelled");
                break;
            }
            _ = ticker.tick() => {
                match exporter.export_incremental(&service_id, &cancel).await {
                    Ok(result) if result.exported_event_count > 0 => committed += 1,
                    Ok(_) => {}
                    Err(ColdError::Cancelled) => {
                        debug!(service_id = %service_id, "export cycle cancelled");
                        break;
                    }
                    Err(ColdError::Disabled) => {
                        warn!(service_id = %service_id, "cold export disabled, stopping loop");
                        break;
                    }
                    // Already logged by the exporter; try again next tick
                    Err(_) => {}
                }
            }
        }
    }
    committed
}
