//! Watermark-driven table synchronization.
//!
//! A table is downloaded in full when no usable local snapshot exists (or a
//! refresh is forced); otherwise only rows strictly newer than the local
//! watermark are fetched and merged. Remote failures never abort a sync:
//! whatever was retrieved before the failure is kept and the error is
//! recorded on the [`SyncRecord`].

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    data::{Value, compare_values},
    frame::{Frame, Record},
    remote::{PageQuery, RemoteError, TableSource},
    snapshot::{Snapshot, SnapshotStore},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncKind {
    Full,
    Incremental,
    UpToDate,
}

impl SyncKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncKind::Full => "Full",
            SyncKind::Incremental => "Incremental",
            SyncKind::UpToDate => "Up to date",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRecord {
    pub table: String,
    pub kind: SyncKind,
    pub new_rows: usize,
    pub total_rows: usize,
    pub watermark: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub frame: Frame,
    pub record: SyncRecord,
}

struct Download {
    rows: Vec<Record>,
    error: Option<RemoteError>,
}

pub struct TableSynchronizer<'a, S: TableSource + ?Sized> {
    source: &'a S,
    store: &'a SnapshotStore,
    page_size: usize,
}

impl<'a, S: TableSource + ?Sized> TableSynchronizer<'a, S> {
    pub fn new(source: &'a S, store: &'a SnapshotStore, page_size: usize) -> Self {
        Self {
            source,
            store,
            page_size: page_size.max(1),
        }
    }

    pub fn sync(&self, table: &str, date_column: &str, full_refresh: bool) -> Result<SyncOutcome> {
        let existing = if full_refresh {
            None
        } else {
            self.store
                .load_or_discard(table)
                .filter(|s| !s.frame.is_empty() && s.frame.has_column(date_column))
        };
        match existing {
            None => self.full_download(table, date_column),
            Some(snapshot) => self.incremental(table, date_column, snapshot),
        }
    }

    fn full_download(&self, table: &str, date_column: &str) -> Result<SyncOutcome> {
        info!("Full download of '{table}'");
        let download = self.download(table, date_column, None);
        if download.rows.is_empty()
            && let Some(error) = download.error
        {
            // Nothing retrieved: keep serving the previous snapshot, if any.
            let frame = self
                .store
                .load_or_discard(table)
                .map(|s| s.frame)
                .unwrap_or_default();
            let watermark = watermark_of(&frame, date_column);
            return Ok(self.outcome(table, SyncKind::Full, 0, frame, watermark, Some(error)));
        }
        let mut frame = Frame::from_records(&download.rows);
        if frame.has_column(date_column) {
            frame.sort_by_column(date_column)?;
        }
        let watermark = watermark_of(&frame, date_column);
        self.persist(table, &frame, &watermark)?;
        let fetched = frame.height();
        info!("'{table}': downloaded {fetched} row(s)");
        Ok(self.outcome(
            table,
            SyncKind::Full,
            fetched,
            frame,
            watermark,
            download.error,
        ))
    }

    fn incremental(
        &self,
        table: &str,
        date_column: &str,
        snapshot: Snapshot,
    ) -> Result<SyncOutcome> {
        let local_max = watermark_of(&snapshot.frame, date_column);
        let remote_max = match self.source.max_value(table, date_column) {
            Ok(max) => max,
            Err(err) => {
                warn!("Could not query remote watermark of '{table}': {err}");
                return Ok(self.outcome(
                    table,
                    SyncKind::UpToDate,
                    0,
                    snapshot.frame,
                    local_max,
                    Some(err),
                ));
            }
        };
        let newer = match (&remote_max, &local_max) {
            (Some(remote), Some(local)) => compare_values(remote, local).is_gt(),
            (Some(_), None) => true,
            (None, _) => false,
        };
        if !newer {
            info!(
                "'{table}' is up to date ({} row(s))",
                snapshot.frame.height()
            );
            return Ok(self.outcome(
                table,
                SyncKind::UpToDate,
                0,
                snapshot.frame,
                local_max,
                None,
            ));
        }

        info!(
            "Incremental download of '{table}' after {}",
            local_max
                .as_ref()
                .map(Value::as_display)
                .unwrap_or_default()
        );
        let download = self.download(table, date_column, local_max.clone());
        let fresh = Frame::from_records(&download.rows);
        let new_rows = fresh.height();
        if new_rows == 0 {
            return Ok(self.outcome(
                table,
                SyncKind::Incremental,
                0,
                snapshot.frame,
                local_max,
                download.error,
            ));
        }
        let mut merged = snapshot
            .frame
            .vstack(&fresh)
            .dedup_keep_last(date_column)
            .with_context(|| format!("Merging new rows into '{table}'"))?;
        merged.sort_by_column(date_column)?;
        let watermark = watermark_of(&merged, date_column);
        self.persist(table, &merged, &watermark)?;
        info!(
            "'{table}': merged {new_rows} new row(s), {} total",
            merged.height()
        );
        Ok(self.outcome(
            table,
            SyncKind::Incremental,
            new_rows,
            merged,
            watermark,
            download.error,
        ))
    }

    fn download(&self, table: &str, date_column: &str, after: Option<Value>) -> Download {
        let mut rows = Vec::new();
        let mut offset = 0;
        loop {
            let mut query = PageQuery::new(table, self.page_size)
                .ordered_by(date_column)
                .at_offset(offset);
            if let Some(threshold) = &after {
                query = query.after(date_column, threshold.clone());
            }
            match self.source.fetch_page(&query) {
                Ok(page) => {
                    let received = page.len();
                    rows.extend(page);
                    if received < self.page_size {
                        break;
                    }
                    offset += self.page_size;
                }
                Err(err) => {
                    warn!(
                        "Download of '{table}' stopped at offset {offset} after {} row(s): {err}",
                        rows.len()
                    );
                    return Download {
                        rows,
                        error: Some(err),
                    };
                }
            }
        }
        Download { rows, error: None }
    }

    fn persist(&self, table: &str, frame: &Frame, watermark: &Option<Value>) -> Result<()> {
        let snapshot = Snapshot::new(table, frame.clone(), watermark.clone());
        self.store
            .save(&snapshot)
            .with_context(|| format!("Persisting snapshot of '{table}'"))?;
        Ok(())
    }

    fn outcome(
        &self,
        table: &str,
        kind: SyncKind,
        new_rows: usize,
        frame: Frame,
        watermark: Option<Value>,
        error: Option<RemoteError>,
    ) -> SyncOutcome {
        let record = SyncRecord {
            table: table.to_string(),
            kind,
            new_rows,
            total_rows: frame.height(),
            watermark: watermark.as_ref().map(Value::as_display),
            timestamp: Utc::now(),
            error: error.map(|e| e.to_string()),
        };
        SyncOutcome { frame, record }
    }
}

/// Maximum non-missing value of the date column.
pub fn watermark_of(frame: &Frame, date_column: &str) -> Option<Value> {
    frame
        .column(date_column)?
        .values
        .iter()
        .flatten()
        .max_by(|a, b| compare_values(a, b))
        .cloned()
}
