//! Master-series assembly: left joins on the primary table's months and the
//! closing gap-fill pass.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use log::{info, warn};

use crate::{
    data::Value,
    frame::{Column, Frame},
    impute::interpolate_linear,
    reindex::month_start,
};

/// Left-joins every `other` monthly frame onto `primary` by month. Every
/// month of the primary frame is kept; colliding column names from the
/// right side are prefixed with their table name.
pub fn unify(primary: &Frame, others: &[(String, Frame)], date_column: &str) -> Result<Frame> {
    let months = primary
        .dates(date_column)
        .ok_or_else(|| anyhow!("Primary table has no '{date_column}' column"))?;
    let mut master = primary.clone();
    let mut seen: HashSet<String> = master.column_names().into_iter().collect();

    for (table, frame) in others {
        let Some(right_months) = frame.dates(date_column) else {
            warn!("Skipping '{table}' in merge: no '{date_column}' column");
            continue;
        };
        let lookup: HashMap<NaiveDate, usize> = right_months
            .iter()
            .enumerate()
            .filter_map(|(row, month)| month.map(|m| (m, row)))
            .collect();
        for column in frame.columns().iter().filter(|c| c.name != date_column) {
            let mut candidate = column.name.clone();
            if seen.contains(&candidate) {
                let base = format!("{table}_{}", column.name);
                candidate = base.clone();
                let mut counter = 1usize;
                while seen.contains(&candidate) {
                    candidate = format!("{base}_{counter}");
                    counter += 1;
                }
            }
            seen.insert(candidate.clone());
            let values = months
                .iter()
                .map(|month| {
                    month
                        .and_then(|m| lookup.get(&m))
                        .and_then(|&row| column.values[row].clone())
                })
                .collect();
            master.push_column(Column::new(candidate, values))?;
        }
    }
    info!(
        "Master series: {} row(s) x {} column(s)",
        master.height(),
        master.width()
    );
    Ok(master)
}

fn forward_fill(values: &mut [Option<Value>]) {
    let mut last: Option<Value> = None;
    for cell in values.iter_mut() {
        match cell {
            Some(value) => last = Some(value.clone()),
            None => *cell = last.clone(),
        }
    }
}

fn back_fill(values: &mut [Option<Value>]) {
    let mut next: Option<Value> = None;
    for cell in values.iter_mut().rev() {
        match cell {
            Some(value) => next = Some(value.clone()),
            None => *cell = next.clone(),
        }
    }
}

/// Interpolates numeric columns along the time axis, then forward- and
/// back-fills every column. Returns the number of cells still missing.
pub fn close_gaps(master: &mut Frame, date_column: &str) -> usize {
    for column in master.columns_mut() {
        if column.name == date_column || column.null_count() == 0 {
            continue;
        }
        if column.kind().is_numeric() {
            let interpolated = interpolate_linear(&column.numeric(), true);
            for (cell, value) in column.values.iter_mut().zip(interpolated) {
                if cell.is_none() {
                    *cell = value.map(Value::Float);
                }
            }
        }
        forward_fill(&mut column.values);
        back_fill(&mut column.values);
    }
    let residual = master.total_nulls();
    if residual > 0 {
        warn!("{residual} missing value(s) remain in the master series after gap closing");
    } else {
        info!("Master series has no missing values");
    }
    residual
}

/// Drops the last row when it belongs to the month of `today`, which is
/// still incomplete. Returns whether a row was dropped.
pub fn drop_incomplete_month(master: &mut Frame, date_column: &str, today: NaiveDate) -> bool {
    let height = master.height();
    let last = master
        .dates(date_column)
        .and_then(|dates| dates.last().copied().flatten());
    match last {
        Some(month) if month_start(month) == month_start(today) => {
            let keep = (0..height - 1).collect::<Vec<_>>();
            *master = master.take_rows(&keep);
            info!("Dropped incomplete month {}", month.format("%Y-%m"));
            true
        }
        _ => false,
    }
}
