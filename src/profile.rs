//! Statistical profiling of a single table.
//!
//! [`profile`] is a pure function of the frame and its [`ProfileOptions`];
//! every check is computed independently and lands in its own report
//! section.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDate;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, DateRange, SentinelValues},
    data::Value,
    frame::{Column, ColumnKind, Frame},
    frequency::{CategoricalSummary, FrequencyAccumulator},
    stats::{ColumnStats, NumericSummary, OutlierSummary},
};

#[derive(Debug, Clone)]
pub struct ProfileOptions {
    pub date_column: String,
    /// Count missing calendar days between the first and last date.
    pub check_gaps: bool,
    pub high_cardinality_threshold: f64,
    pub zero_presence_threshold: f64,
    pub sentinels: SentinelValues,
    /// Minimum months of history; only set for the primary table.
    pub min_history_months: Option<u32>,
    pub black_swan: Option<DateRange>,
}

impl ProfileOptions {
    pub fn for_table(config: &Config, table: &str) -> Self {
        Self {
            date_column: config.data.date_column.clone(),
            check_gaps: config.is_high_frequency(table),
            high_cardinality_threshold: config.quality.high_cardinality_threshold,
            zero_presence_threshold: config.quality.zero_presence_threshold,
            sentinels: config.quality.sentinel_values.clone(),
            min_history_months: (table == config.primary_table())
                .then_some(config.data.min_history_months),
            black_swan: config.business_calendar.black_swan,
        }
    }
}

impl Default for ProfileOptions {
    fn default() -> Self {
        Self {
            date_column: "fecha".to_string(),
            check_gaps: false,
            high_cardinality_threshold: 0.9,
            zero_presence_threshold: 0.3,
            sentinels: SentinelValues::default(),
            min_history_months: None,
            black_swan: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalSummary {
    pub min: Option<NaiveDate>,
    pub max: Option<NaiveDate>,
    pub nulls: usize,
    pub duplicate_dates: usize,
    pub gaps_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatioEntry {
    pub column: String,
    pub ratio: f64,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentinelHit {
    pub column: String,
    pub value: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryCheck {
    pub months: f64,
    pub minimum_months: u32,
    pub passed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileReport {
    pub rows: usize,
    pub columns: usize,
    pub numerical_stats: BTreeMap<String, NumericSummary>,
    pub temporal_stats: BTreeMap<String, TemporalSummary>,
    pub categorical_stats: BTreeMap<String, CategoricalSummary>,
    pub outliers: BTreeMap<String, OutlierSummary>,
    pub zero_variance: Vec<String>,
    pub high_cardinality: Vec<RatioEntry>,
    pub high_zeros: Vec<RatioEntry>,
    pub duplicate_rows: usize,
    pub null_stats: Vec<RatioEntry>,
    pub sentinel_values: Vec<SentinelHit>,
    pub black_swan_rows: Option<usize>,
    pub history: Option<HistoryCheck>,
}

pub fn profile(frame: &Frame, options: &ProfileOptions) -> ProfileReport {
    let rows = frame.height();
    let kinds: Vec<(&Column, ColumnKind)> = frame.columns().iter().map(|c| (c, c.kind())).collect();
    let temporal_columns: BTreeSet<&str> = kinds
        .iter()
        .filter(|(column, kind)| is_temporal(column, *kind))
        .map(|(column, _)| column.name.as_str())
        .collect();

    let mut report = ProfileReport {
        rows,
        columns: frame.width(),
        numerical_stats: BTreeMap::new(),
        temporal_stats: BTreeMap::new(),
        categorical_stats: BTreeMap::new(),
        outliers: BTreeMap::new(),
        zero_variance: Vec::new(),
        high_cardinality: Vec::new(),
        high_zeros: Vec::new(),
        duplicate_rows: duplicate_rows(frame),
        null_stats: Vec::new(),
        sentinel_values: Vec::new(),
        black_swan_rows: None,
        history: None,
    };

    for (column, kind) in &kinds {
        let name = column.name.clone();
        let distinct = column.distinct_count();

        if kind.is_numeric() {
            let mut stats = ColumnStats::from_column(column);
            report.numerical_stats.insert(name.clone(), stats.summary());
            if name != "id"
                && let Some(outliers) = stats.outliers(rows)
            {
                report.outliers.insert(name.clone(), outliers);
            }
            let zeros = column
                .numeric()
                .into_iter()
                .filter(|v| *v == Some(0.0))
                .count();
            if let Some(ratio) = ratio(zeros, rows)
                && ratio > options.zero_presence_threshold
            {
                report.high_zeros.push(RatioEntry {
                    column: name.clone(),
                    ratio,
                    count: zeros,
                });
            }
            for sentinel in &options.sentinels.numeric {
                let count = column
                    .numeric()
                    .into_iter()
                    .filter(|v| *v == Some(*sentinel))
                    .count();
                if count > 0 {
                    report.sentinel_values.push(SentinelHit {
                        column: name.clone(),
                        value: crate::stats::format_number(*sentinel),
                        count,
                    });
                }
            }
        }

        if temporal_columns.contains(name.as_str()) {
            report
                .temporal_stats
                .insert(name.clone(), temporal_summary(column, options.check_gaps));
        } else if *kind == ColumnKind::Text {
            report
                .categorical_stats
                .insert(name.clone(), FrequencyAccumulator::from_column(column).summary());
            for sentinel in &options.sentinels.text {
                let count = column
                    .values
                    .iter()
                    .flatten()
                    .filter(|v| matches!(v, Value::Text(s) if s == sentinel))
                    .count();
                if count > 0 {
                    report.sentinel_values.push(SentinelHit {
                        column: name.clone(),
                        value: sentinel.clone(),
                        count,
                    });
                }
            }
        }

        if distinct <= 1 {
            report.zero_variance.push(name.clone());
        }
        if let Some(ratio) = ratio(distinct, rows)
            && ratio > options.high_cardinality_threshold
        {
            report.high_cardinality.push(RatioEntry {
                column: name.clone(),
                ratio,
                count: distinct,
            });
        }
        let nulls = column.null_count();
        if nulls > 0 {
            report.null_stats.push(RatioEntry {
                column: name,
                ratio: ratio(nulls, rows).unwrap_or_default(),
                count: nulls,
            });
        }
    }

    let dates = frame
        .dates(&options.date_column)
        .map(|dates| dates.into_iter().flatten().collect::<Vec<_>>())
        .unwrap_or_default();
    if let Some(range) = &options.black_swan {
        report.black_swan_rows = Some(dates.iter().filter(|d| range.contains(**d)).count());
    }
    if let Some(minimum) = options.min_history_months
        && let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max())
    {
        let months = (*last - *first).num_days() as f64 / 30.0;
        report.history = Some(HistoryCheck {
            months,
            minimum_months: minimum,
            passed: months >= f64::from(minimum),
        });
    }

    debug!(
        "Profiled {rows} row(s): {} numeric, {} temporal, {} categorical column(s)",
        report.numerical_stats.len(),
        report.temporal_stats.len(),
        report.categorical_stats.len()
    );
    report
}

fn ratio(count: usize, rows: usize) -> Option<f64> {
    (rows > 0).then(|| count as f64 / rows as f64)
}

/// Native temporal columns, plus text columns named like a date whose
/// values all parse.
fn is_temporal(column: &Column, kind: ColumnKind) -> bool {
    match kind {
        ColumnKind::DateTime => true,
        ColumnKind::Text => {
            let lowered = column.name.to_lowercase();
            (lowered.contains("fecha") || lowered.contains("date"))
                && column
                    .values
                    .iter()
                    .flatten()
                    .all(|v| v.as_datetime().is_some())
        }
        _ => false,
    }
}

fn temporal_summary(column: &Column, check_gaps: bool) -> TemporalSummary {
    let parsed = column.dates();
    let dates: Vec<NaiveDate> = parsed.iter().flatten().copied().collect();
    let distinct: BTreeSet<NaiveDate> = dates.iter().copied().collect();
    let min = distinct.first().copied();
    let max = distinct.last().copied();
    let gaps_count = match (check_gaps, min, max) {
        (true, Some(min), Some(max)) => {
            let expected = (max - min).num_days() as usize + 1;
            Some(expected - distinct.len())
        }
        _ => None,
    };
    TemporalSummary {
        min,
        max,
        nulls: parsed.iter().filter(|d| d.is_none()).count(),
        duplicate_dates: dates.len() - distinct.len(),
        gaps_count,
    }
}

fn duplicate_rows(frame: &Frame) -> usize {
    let mut seen = HashSet::new();
    (0..frame.height())
        .filter(|&row| !seen.insert(frame.row_key(row)))
        .count()
}
