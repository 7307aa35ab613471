// ABOUTME: Filesystem layout of a listd home directory and the one-call startup path.
// ABOUTME: Creates logs/ and snapshots/, runs recovery, and hands back a ready ListService.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::oplog::{OpLogError, OperationLog};
use crate::recovery::{RecoveryCoordinator, RecoveryError, ReplayStats};
use crate::service::ListService;
use crate::snapshot::SnapshotStore;

const LOGS_DIR: &str = "logs";
const LOG_FILE: &str = "operations.log";
const SNAPSHOTS_DIR: &str = "snapshots";
const SNAPSHOT_FILE: &str = "list_store.json.gz";

/// Errors that can occur while preparing storage for serving.
#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("operation log error: {0}")]
    OpLog(#[from] OpLogError),
}

/// Manages the listd home directory:
///
/// ```text
/// <home>/logs/operations.log
/// <home>/snapshots/list_store.json.gz
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    home: PathBuf,
}

impl StorageLayout {
    /// Create a layout rooted at `home`, creating the subdirectories.
    pub fn new(home: PathBuf) -> Result<Self, LayoutError> {
        fs::create_dir_all(home.join(LOGS_DIR))?;
        fs::create_dir_all(home.join(SNAPSHOTS_DIR))?;
        Ok(Self { home })
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn log_path(&self) -> PathBuf {
        self.home.join(LOGS_DIR).join(LOG_FILE)
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.home.join(SNAPSHOTS_DIR).join(SNAPSHOT_FILE)
    }

    pub fn snapshots(&self) -> SnapshotStore {
        SnapshotStore::new(self.snapshot_path())
    }

    /// Recover state from disk and open the log for new writes.
    pub fn open_service(&self) -> Result<(ListService, ReplayStats), LayoutError> {
        let recovered = RecoveryCoordinator::new(self.snapshots(), self.log_path()).recover()?;
        let log = OperationLog::open(&self.log_path())?;
        let service = ListService::new(recovered.store, log, recovered.watermark);
        Ok((service, recovered.stats))
    }
}
