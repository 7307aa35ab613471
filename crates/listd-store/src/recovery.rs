// ABOUTME: Startup recovery: load the latest snapshot, then replay newer operation log entries.
// ABOUTME: Snapshot failures abort startup; log read failures degrade to serving what was recovered.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use listd_core::{ListState, ListStore, OpKind};
use thiserror::Error;

use crate::oplog::{LogEntry, OperationLog};
use crate::snapshot::{SnapshotError, SnapshotStore};

/// Errors that abort recovery.
#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Counters describing one replay pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Append/Remove entries applied to the store.
    pub applied: usize,
    /// Get/Size entries, which only advance the watermark.
    pub observed: usize,
    /// Entries already reflected in a list's snapshot contents.
    pub skipped: usize,
    /// Entries that could not be applied (e.g. Remove on an empty list).
    pub failed: usize,
    /// Log lines rejected by the parser.
    pub malformed: usize,
}

/// Outcome of a successful recovery.
#[derive(Debug)]
pub struct Recovered {
    pub store: ListStore,
    pub watermark: DateTime<Utc>,
    pub stats: ReplayStats,
}

/// Rebuilds the live store from a snapshot file and an operation log.
#[derive(Debug, Clone)]
pub struct RecoveryCoordinator {
    snapshots: SnapshotStore,
    log_path: PathBuf,
}

impl RecoveryCoordinator {
    pub fn new(snapshots: SnapshotStore, log_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshots,
            log_path: log_path.into(),
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Recovery sequence:
    /// 1. Load the snapshot (fatal on error; missing means empty at epoch)
    /// 2. Read log entries strictly after the snapshot watermark
    ///    (on error: warn and continue with none)
    /// 3. Replay them in order without journaling again
    /// 4. Return the store and the final watermark
    pub fn recover(&self) -> Result<Recovered, RecoveryError> {
        let (store, snapshot_mark) = self.snapshots.load()?;

        let scan = match OperationLog::read_since(&self.log_path, snapshot_mark) {
            Ok(scan) => {
                if scan.truncated {
                    tracing::warn!(
                        path = %self.log_path.display(),
                        entries = scan.entries.len(),
                        "operation log only partially readable, replaying readable prefix"
                    );
                }
                scan
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.log_path.display(),
                    error = %e,
                    "failed to read operation log, serving snapshot state only"
                );
                Default::default()
            }
        };

        let (watermark, mut stats) = replay(&store, &scan.entries, snapshot_mark);
        stats.malformed = scan.malformed;

        tracing::info!(
            lists = store.len(),
            applied = stats.applied,
            observed = stats.observed,
            skipped = stats.skipped,
            failed = stats.failed,
            malformed = stats.malformed,
            watermark = %watermark.to_rfc3339(),
            "recovery complete"
        );

        Ok(Recovered {
            store,
            watermark,
            stats,
        })
    }
}

fn already_reflected(state: &ListState, ts: DateTime<Utc>) -> bool {
    state.last_logged().is_some_and(|logged| ts <= logged)
}

/// Apply `entries` to `store` in order, starting from `watermark`.
///
/// Append/Remove mutate the store directly; Get/Size only advance the
/// watermark. An entry at or before a list's `last_logged` stamp is already
/// in that list's contents and is skipped. Returns the final watermark.
pub fn replay(
    store: &ListStore,
    entries: &[LogEntry],
    mut watermark: DateTime<Utc>,
) -> (DateTime<Utc>, ReplayStats) {
    let mut stats = ReplayStats::default();

    for entry in entries {
        if entry.timestamp > watermark {
            watermark = entry.timestamp;
        }

        match entry.kind {
            OpKind::Observe => stats.observed += 1,
            OpKind::Append => {
                let Some(value) = entry.payload else {
                    tracing::warn!(list_id = %entry.list_id, "append entry without value, ignoring");
                    stats.failed += 1;
                    continue;
                };
                let list = store.ensure_list(&entry.list_id);
                let mut state = list.lock();
                if already_reflected(&state, entry.timestamp) {
                    stats.skipped += 1;
                    continue;
                }
                state.push(value);
                state.mark_logged(entry.timestamp);
                stats.applied += 1;
            }
            OpKind::Remove => {
                let list = match store.lookup(&entry.list_id) {
                    Ok(list) => list,
                    Err(e) => {
                        tracing::warn!(error = %e, "remove entry did not replay");
                        stats.failed += 1;
                        continue;
                    }
                };
                let mut state = list.lock();
                if already_reflected(&state, entry.timestamp) {
                    stats.skipped += 1;
                    continue;
                }
                match state.pop(&entry.list_id) {
                    Ok(_) => {
                        state.mark_logged(entry.timestamp);
                        stats.applied += 1;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "remove entry did not replay");
                        stats.failed += 1;
                    }
                }
            }
        }
    }

    (watermark, stats)
}
