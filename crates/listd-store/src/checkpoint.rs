// ABOUTME: Background task that periodically snapshots the live store.
// ABOUTME: Skips saves when nothing was journaled since the last one; save errors are logged, not fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};

use crate::service::ListService;
use crate::snapshot::SnapshotStore;

/// Save a snapshot unless the watermark equals `last_saved`. Returns the
/// watermark now on disk (or `last_saved` if the save failed or was skipped).
pub fn checkpoint_if_changed(
    service: &ListService,
    snapshots: &SnapshotStore,
    last_saved: Option<DateTime<Utc>>,
) -> Option<DateTime<Utc>> {
    if last_saved == Some(service.watermark()) {
        tracing::debug!("no operations since last snapshot, skipping");
        return last_saved;
    }

    match service.snapshot(snapshots) {
        Ok(saved) => Some(saved),
        Err(e) => {
            tracing::warn!(error = %e, "failed to save snapshot, previous snapshot remains valid");
            last_saved
        }
    }
}

/// Spawn the periodic snapshot loop. It stops when `shutdown` flips to
/// true or its sender is dropped.
pub fn spawn_snapshot_task(
    service: Arc<ListService>,
    snapshots: SnapshotStore,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; recovery state needs no save.
        ticker.tick().await;

        tracing::info!(interval_secs = period.as_secs_f64(), "snapshot task started");
        let mut last_saved = None;

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("snapshot task shutting down");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    let service = Arc::clone(&service);
                    let snapshots = snapshots.clone();
                    let result = tokio::task::spawn_blocking(move || {
                        checkpoint_if_changed(&service, &snapshots, last_saved)
                    })
                    .await;
                    match result {
                        Ok(saved) => last_saved = saved,
                        Err(e) => tracing::error!(error = %e, "snapshot worker panicked"),
                    }
                }
            }
        }
    })
}
