//! Local table snapshots.
//!
//! Each synchronized table is persisted as one binary file,
//! `<dir>/<table>.snapshot`, holding the full row set plus the watermark it
//! was synchronized up to. Writes go through a temporary sibling that is
//! renamed over the target, so a crash never leaves a truncated snapshot.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::{data::Value, frame::Frame};

const SNAPSHOT_VERSION: u32 = 1;
const SNAPSHOT_EXTENSION: &str = "snapshot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    version: u32,
    pub table: String,
    pub watermark: Option<Value>,
    pub synced_at: DateTime<Utc>,
    pub frame: Frame,
}

impl Snapshot {
    pub fn new(table: impl Into<String>, frame: Frame, watermark: Option<Value>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            table: table.into(),
            watermark,
            synced_at: Utc::now(),
            frame,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{table}.{SNAPSHOT_EXTENSION}"))
    }

    pub fn exists(&self, table: &str) -> bool {
        self.path_for(table).is_file()
    }

    /// Reads the snapshot of `table`. A missing file yields `Ok(None)`.
    pub fn load(&self, table: &str) -> Result<Option<Snapshot>> {
        let path = self.path_for(table);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("Opening snapshot {path:?}"))?;
        let (snapshot, _): (Snapshot, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
                .with_context(|| format!("Decoding snapshot {path:?}"))?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(anyhow!(
                "Unsupported snapshot version {} in {path:?} (expected {SNAPSHOT_VERSION})",
                snapshot.version
            ));
        }
        debug!(
            "Loaded snapshot '{}' with {} row(s)",
            snapshot.table,
            snapshot.frame.height()
        );
        Ok(Some(snapshot))
    }

    /// Like [`SnapshotStore::load`], but an unreadable snapshot is reported
    /// and treated as absent so the caller falls back to a full download.
    pub fn load_or_discard(&self, table: &str) -> Option<Snapshot> {
        match self.load(table) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!("Ignoring unreadable snapshot for '{table}': {err:#}");
                None
            }
        }
    }

    pub fn save(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Creating snapshot directory {:?}", self.dir))?;
        let target = self.path_for(&snapshot.table);
        let staging = target.with_extension(format!("{SNAPSHOT_EXTENSION}.tmp"));
        {
            let file = File::create(&staging)
                .with_context(|| format!("Creating snapshot file {staging:?}"))?;
            let mut writer = BufWriter::new(file);
            bincode::serde::encode_into_std_write(
                snapshot,
                &mut writer,
                bincode::config::standard(),
            )
            .with_context(|| format!("Writing snapshot {staging:?}"))?;
            writer.flush().context("Flushing snapshot")?;
        }
        fs::rename(&staging, &target)
            .with_context(|| format!("Replacing snapshot {target:?}"))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Column;
    use tempfile::tempdir;

    fn sample_frame() -> Frame {
        Frame::from_columns(vec![
            Column::new(
                "fecha",
                vec![
                    Some(Value::Text("2023-01-01".into())),
                    Some(Value::Text("2023-01-02".into())),
                ],
            ),
            Column::new("v", vec![Some(Value::Integer(3)), None]),
        ])
        .unwrap()
    }

    #[test]
    fn save_then_load_preserves_rows_and_watermark() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("raw"));
        let snapshot = Snapshot::new(
            "ventas_diarias",
            sample_frame(),
            Some(Value::Text("2023-01-02".into())),
        );
        let path = store.save(&snapshot).unwrap();
        assert!(path.ends_with("ventas_diarias.snapshot"));
        let loaded = store.load("ventas_diarias").unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert!(!dir.path().join("raw/ventas_diarias.snapshot.tmp").exists());
    }

    #[test]
    fn missing_snapshot_loads_as_none() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(store.load("absent").unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_discarded() {
        let dir = tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        fs::write(store.path_for("broken"), b"not a snapshot").unwrap();
        assert!(store.load("broken").is_err());
        assert!(store.load_or_discard("broken").is_none());
    }
}
