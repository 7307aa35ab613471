// ABOUTME: Persistence layer for listd, making the in-memory list store survive restarts.
// ABOUTME: Provides the operation log, gzip snapshots, startup recovery, the journaled service, and the snapshot task.

pub mod checkpoint;
pub mod layout;
pub mod oplog;
pub mod recovery;
pub mod service;
pub mod snapshot;
pub mod watermark;

pub use checkpoint::{checkpoint_if_changed, spawn_snapshot_task};
pub use layout::{LayoutError, StorageLayout};
pub use oplog::{LogEntry, LogLineError, LogScan, OpLogError, OperationLog, parse_line};
pub use recovery::{Recovered, RecoveryCoordinator, RecoveryError, ReplayStats, replay};
pub use service::ListService;
pub use snapshot::{ListSnapshot, SnapshotData, SnapshotError, SnapshotStore};
pub use watermark::Watermark;
