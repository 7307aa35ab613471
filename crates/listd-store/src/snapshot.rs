// ABOUTME: Gzip-compressed JSON snapshots of the whole list store plus a watermark timestamp.
// ABOUTME: Written atomically (tmp file, fsync, rename) over one fixed path; absence means an empty store.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use listd_core::ListStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur during snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persisted contents of one list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSnapshot {
    pub elements: Vec<i64>,
    /// Timestamp of the last journal entry already reflected in `elements`.
    /// Replay skips entries for this list at or before it. Missing in
    /// snapshots that only carry the global watermark.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_logged: Option<DateTime<Utc>>,
}

/// A full snapshot: every list plus the watermark such that all journal
/// entries at or before it are reflected in the contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotData {
    pub watermark: DateTime<Utc>,
    pub saved_at: DateTime<Utc>,
    pub lists: BTreeMap<String, ListSnapshot>,
}

impl SnapshotData {
    /// Copy the store's contents. The store lock is held only long enough to
    /// collect handles; each list is then copied under its own lock.
    pub fn capture(store: &ListStore, watermark: DateTime<Utc>) -> Self {
        let lists = store
            .entries()
            .into_iter()
            .map(|(id, list)| {
                let (elements, last_logged) = list.capture();
                (id, ListSnapshot {
                    elements,
                    last_logged,
                })
            })
            .collect();

        Self {
            watermark,
            saved_at: Utc::now(),
            lists,
        }
    }

    /// Rebuild a live store. Locks are created fresh; only contents persist.
    pub fn into_store(self) -> (ListStore, DateTime<Utc>) {
        let store = ListStore::from_lists(
            self.lists
                .into_iter()
                .map(|(id, snap)| (id, snap.elements, snap.last_logged)),
        );
        (store, self.watermark)
    }
}

/// Reads and writes the snapshot file at a fixed path. Each save replaces
/// the previous snapshot wholesale. Clones share one write lock, so saves
/// from the timer and from an on-demand request never overlap on the
/// temp file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl SnapshotStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Capture `store` and persist it with `watermark`.
    ///
    /// `watermark` must be read before calling this so that every entry at
    /// or before it is already applied to the lists being captured.
    pub fn save(&self, store: &ListStore, watermark: DateTime<Utc>) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock();
        let data = SnapshotData::capture(store, watermark);
        self.write_file(&data)?;
        tracing::info!(
            path = %self.path.display(),
            lists = data.lists.len(),
            watermark = %data.watermark.to_rfc3339(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Write snapshot data using atomic write (write to .tmp, fsync, rename).
    /// Creates the parent directory if it does not exist.
    pub fn write(&self, data: &SnapshotData) -> Result<(), SnapshotError> {
        let _guard = self.write_lock.lock();
        self.write_file(data)
    }

    /// Caller holds `write_lock`.
    fn write_file(&self, data: &SnapshotData) -> Result<(), SnapshotError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = self.tmp_path();
        let file = File::create(&tmp_path)?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        serde_json::to_writer(&mut encoder, data)?;
        let file = encoder
            .finish()?
            .into_inner()
            .map_err(|e| e.into_error())?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp_path, &self.path)?;

        // Best-effort: the rename already succeeded, this only makes the
        // directory entry durable.
        if let Some(parent) = self.path.parent()
            && let Ok(dir) = File::open(parent)
        {
            let _ = dir.sync_all();
        }

        Ok(())
    }

    /// Read the snapshot file. Returns None if it does not exist.
    pub fn read(&self) -> Result<Option<SnapshotData>, SnapshotError> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let decoder = GzDecoder::new(BufReader::new(file));
        let data: SnapshotData = serde_json::from_reader(decoder)?;
        Ok(Some(data))
    }

    /// Load the store and watermark. A missing snapshot yields an empty
    /// store and the Unix epoch, meaning "replay the whole log".
    pub fn load(&self) -> Result<(ListStore, DateTime<Utc>), SnapshotError> {
        match self.read()? {
            Some(data) => {
                tracing::info!(
                    path = %self.path.display(),
                    lists = data.lists.len(),
                    watermark = %data.watermark.to_rfc3339(),
                    "snapshot loaded"
                );
                Ok(data.into_store())
            }
            None => {
                tracing::info!(path = %self.path.display(), "no snapshot found, starting from empty store");
                Ok((ListStore::new(), DateTime::<Utc>::UNIX_EPOCH))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn sample_store() -> ListStore {
        let store = ListStore::new();
        store.append("a", 1);
        store.append("a", 2);
        store.append("b", -5);
        store
    }

    #[test]
    fn save_and_load_restores_lists_and_watermark() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("list_store.json.gz"));
        let watermark = Utc::now();

        snapshots.save(&sample_store(), watermark).unwrap();
        let (store, loaded_mark) = snapshots.load().unwrap();

        assert_eq!(loaded_mark, watermark);
        assert_eq!(store.ids(), vec!["a", "b"]);
        assert_eq!(store.get("a", 0).unwrap(), 1);
        assert_eq!(store.get("a", 1).unwrap(), 2);
        assert_eq!(store.remove("b").unwrap(), -5);
        assert!(!snapshots.tmp_path().exists());
    }

    #[test]
    fn load_missing_snapshot_is_empty_at_epoch() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("none.json.gz"));

        let (store, mark) = snapshots.load().unwrap();
        assert!(store.is_empty());
        assert_eq!(mark, DateTime::<Utc>::UNIX_EPOCH);
    }

    #[test]
    fn save_overwrites_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("list_store.json.gz"));
        let store = sample_store();

        snapshots.save(&store, Utc::now()).unwrap();
        store.append("c", 9);
        let second = Utc::now();
        snapshots.save(&store, second).unwrap();

        let data = snapshots.read().unwrap().unwrap();
        assert_eq!(data.watermark, second);
        assert_eq!(data.lists.len(), 3);
    }

    #[test]
    fn save_creates_parent_directory() {
        let dir = TempDir::new().unwrap();
        let nested = dir.path().join("deep").join("snapshots").join("s.json.gz");
        let snapshots = SnapshotStore::new(&nested);

        snapshots.save(&sample_store(), Utc::now()).unwrap();
        assert!(nested.exists());
    }

    #[test]
    fn file_is_gzip_compressed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list_store.json.gz");
        SnapshotStore::new(&path).save(&sample_store(), Utc::now()).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn concurrent_saves_from_clones_all_succeed() {
        let dir = TempDir::new().unwrap();
        let snapshots = SnapshotStore::new(dir.path().join("list_store.json.gz"));
        let store = sample_store();

        std::thread::scope(|s| {
            for t in 0..4i64 {
                let snapshots = snapshots.clone();
                let store = &store;
                s.spawn(move || {
                    for i in 0..50 {
                        store.append("c", t * 100 + i);
                        snapshots.save(store, Utc::now()).unwrap();
                    }
                });
            }
        });
        snapshots.save(&store, Utc::now()).unwrap();

        let (loaded, _) = snapshots.load().unwrap();
        assert_eq!(loaded.size("c").unwrap(), 200);
        assert!(!snapshots.tmp_path().exists());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list_store.json.gz");
        fs::write(&path, b"definitely not gzip").unwrap();

        assert!(SnapshotStore::new(&path).load().is_err());
    }

    #[test]
    fn undecodable_json_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list_store.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder.write_all(br#"{"watermark": "not a time"}"#).unwrap();
        encoder.finish().unwrap();

        assert!(matches!(
            SnapshotStore::new(&path).load(),
            Err(SnapshotError::Json(_))
        ));
    }

    #[test]
    fn capture_keeps_per_list_log_stamps() {
        let store = sample_store();
        let stamp = Utc::now();
        store.lookup("a").unwrap().lock().mark_logged(stamp);

        let data = SnapshotData::capture(&store, DateTime::<Utc>::UNIX_EPOCH);
        assert_eq!(data.lists["a"].last_logged, Some(stamp));
        assert_eq!(data.lists["b"].last_logged, None);

        let (restored, _) = data.into_store();
        assert_eq!(restored.lookup("a").unwrap().capture().1, Some(stamp));
    }

    #[test]
    fn snapshot_without_list_stamps_still_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("list_store.json.gz");
        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        encoder
            .write_all(
                br#"{"watermark":"2024-05-01T10:00:00Z","saved_at":"2024-05-01T10:00:01Z","lists":{"a":{"elements":[1,2]}}}"#,
            )
            .unwrap();
        encoder.finish().unwrap();

        let (store, mark) = SnapshotStore::new(&path).load().unwrap();
        assert_eq!(mark.to_rfc3339(), "2024-05-01T10:00:00+00:00");
        assert_eq!(store.size("a").unwrap(), 2);
    }
}
