//! Row-level cleaning applied to each table before reindexing: name
//! standardization, schema enforcement, deduplication, minimum-date filtering
//! and sentinel normalization.

use std::collections::{BTreeMap, HashSet};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    config::QualityConfig,
    contract::TableContract,
    data::{Value, normalize_column_name},
    frame::{Column, ColumnKind, Frame},
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CleanStats {
    pub duplicates_removed: usize,
    pub rows_filtered: usize,
}

/// Applies `rename_map`, then snake-cases every column name.
pub fn standardize_names(frame: &mut Frame, rename_map: &BTreeMap<String, String>) -> Result<()> {
    for name in frame.column_names() {
        let renamed = rename_map.get(&name).cloned().unwrap_or_else(|| name.clone());
        let normalized = normalize_column_name(&renamed);
        frame
            .rename_column(&name, &normalized)
            .with_context(|| format!("Standardizing column '{name}'"))?;
    }
    Ok(())
}

/// Keeps only the contracted columns (contract keys go through the same
/// renaming as the data). Returns the removed column names. Without a
/// contract the frame is left untouched.
pub fn enforce_schema(
    frame: &mut Frame,
    contract: Option<&TableContract>,
    rename_map: &BTreeMap<String, String>,
) -> Vec<String> {
    let Some(contract) = contract else {
        return Vec::new();
    };
    let expected: HashSet<String> = contract
        .keys()
        .map(|key| normalize_column_name(rename_map.get(key).unwrap_or(key)))
        .collect();
    let removed = frame
        .column_names()
        .into_iter()
        .filter(|name| !expected.contains(name))
        .collect::<Vec<_>>();
    for name in &removed {
        frame.remove_column(name);
    }
    removed
}

/// Drops exact duplicate rows, resolves duplicate dates keeping the last
/// occurrence in date order, and filters rows dated before `min_date`.
/// The date column is converted to native dates on the way.
pub fn clean_rows(frame: &Frame, date_column: &str, min_date: NaiveDate) -> Result<(Frame, CleanStats)> {
    let initial = frame.height();
    let mut seen = HashSet::new();
    let unique = (0..initial)
        .filter(|&row| seen.insert(frame.row_key(row)))
        .collect::<Vec<_>>();
    let mut cleaned = frame.take_rows(&unique);

    if !cleaned.has_column(date_column) {
        let stats = CleanStats {
            duplicates_removed: initial - cleaned.height(),
            rows_filtered: 0,
        };
        return Ok((cleaned, stats));
    }

    let dates = cleaned.dates(date_column).unwrap_or_default();
    cleaned.push_column(Column::new(
        date_column,
        dates.iter().map(|d| d.map(Value::Date)).collect(),
    ))?;
    cleaned.sort_by_column(date_column)?;
    let cleaned = cleaned.dedup_keep_last(date_column)?;
    let after_dedup = cleaned.height();

    let keep = cleaned
        .dates(date_column)
        .unwrap_or_default()
        .iter()
        .enumerate()
        .filter(|(_, date)| date.is_some_and(|d| d >= min_date))
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    let filtered = cleaned.take_rows(&keep);
    let stats = CleanStats {
        duplicates_removed: initial - after_dedup,
        rows_filtered: after_dedup - filtered.height(),
    };
    Ok((filtered, stats))
}

/// Replaces configured placeholder literals with missing cells: numeric
/// sentinels in numeric columns, text sentinels in text columns. Declared
/// exemptions keep their value. Returns the number of replaced cells.
pub fn normalize_sentinels(frame: &mut Frame, table: &str, quality: &QualityConfig) -> usize {
    let numeric = &quality.sentinel_values.numeric;
    let text = &quality.sentinel_values.text;
    let mut replaced = 0;
    for column in frame.columns_mut() {
        let kind = column.kind();
        let name = column.name.clone();
        for cell in column.values.iter_mut() {
            let is_sentinel = match (kind, cell.as_ref()) {
                (kind, Some(value)) if kind.is_numeric() => value.as_f64().is_some_and(|v| {
                    numeric
                        .iter()
                        .any(|s| *s == v && !quality.is_exempt(table, &name, *s))
                }),
                (ColumnKind::Text, Some(Value::Text(s))) => text.contains(s),
                _ => false,
            };
            if is_sentinel {
                *cell = None;
                replaced += 1;
            }
        }
    }
    replaced
}
