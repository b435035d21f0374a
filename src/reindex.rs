//! Gap-free date indexes.
//!
//! Every table is laid onto the complete calendar sequence between the
//! configured minimum date and the global horizon at its declared
//! frequency. Missing periods become rows of missing cells for the
//! imputer to fill.

use std::collections::HashMap;

use anyhow::{Result, anyhow};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{
    data::Value,
    frame::{Column, Frame},
};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum Frequency {
    #[default]
    #[serde(rename = "D", alias = "daily")]
    Daily,
    #[serde(rename = "MS", alias = "monthly", alias = "M")]
    MonthStart,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Daily => "D",
            Frequency::MonthStart => "MS",
        }
    }

    /// Snaps a date onto this frequency's grid.
    pub fn align(self, date: NaiveDate) -> NaiveDate {
        match self {
            Frequency::Daily => date,
            Frequency::MonthStart => month_start(date),
        }
    }
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// All grid points of `frequency` in `[start, end]`. For month-start the
/// first point is the first month start on or after `start`.
pub fn date_range(start: NaiveDate, end: NaiveDate, frequency: Frequency) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut current = match frequency {
        Frequency::Daily => Some(start),
        Frequency::MonthStart if start.day() == 1 => Some(start),
        Frequency::MonthStart => month_start(start).checked_add_months(Months::new(1)),
    };
    while let Some(date) = current
        && date <= end
    {
        dates.push(date);
        current = match frequency {
            Frequency::Daily => date.succ_opt(),
            Frequency::MonthStart => date.checked_add_months(Months::new(1)),
        };
    }
    dates
}

/// Latest date present in any of the frames.
pub fn global_horizon<'a>(
    frames: impl IntoIterator<Item = &'a Frame>,
    date_column: &str,
) -> Option<NaiveDate> {
    frames
        .into_iter()
        .filter_map(|frame| frame.dates(date_column))
        .flat_map(|dates| dates.into_iter().flatten())
        .max()
}

#[derive(Debug, Clone)]
pub struct Reindexed {
    pub frame: Frame,
    pub rows_added: usize,
}

/// Reindexes `frame` onto `date_range(start, horizon, frequency)`.
/// Duplicate grid dates collapse to their last row; rows whose date falls
/// off the grid are dropped.
pub fn reindex(
    frame: &Frame,
    date_column: &str,
    frequency: Frequency,
    start: NaiveDate,
    horizon: NaiveDate,
) -> Result<Reindexed> {
    let dates = frame
        .dates(date_column)
        .ok_or_else(|| anyhow!("Date column '{date_column}' not found"))?;
    let mut latest: HashMap<NaiveDate, usize> = HashMap::new();
    for (row, date) in dates.iter().enumerate() {
        if let Some(date) = date {
            latest.insert(frequency.align(*date), row);
        }
    }
    let original_rows = latest.len();

    let index = date_range(start, horizon, frequency);
    let source_rows: Vec<Option<usize>> = index.iter().map(|d| latest.get(d).copied()).collect();
    let mut columns = vec![Column::new(
        date_column,
        index.iter().map(|d| Some(Value::Date(*d))).collect(),
    )];
    for column in frame.columns().iter().filter(|c| c.name != date_column) {
        let values = source_rows
            .iter()
            .map(|row| row.and_then(|row| column.values[row].clone()))
            .collect();
        columns.push(Column::new(column.name.clone(), values));
    }
    let reindexed = Frame::from_columns(columns)?;
    let rows_added = reindexed.height().saturating_sub(original_rows);
    Ok(Reindexed {
        frame: reindexed,
        rows_added,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sample() -> Frame {
        Frame::from_columns(vec![
            Column::new(
                "fecha",
                ["2023-01-01", "2023-01-03", "2023-01-03"]
                    .iter()
                    .map(|s| Some(Value::Text(s.to_string())))
                    .collect(),
            ),
            Column::from_f64("v", vec![Some(1.0), Some(2.0), Some(3.0)]),
        ])
        .unwrap()
    }

    #[test]
    fn daily_reindex_fills_gaps_and_collapses_duplicates() {
        let out = reindex(&sample(), "fecha", Frequency::Daily, date(2023, 1, 1), date(2023, 1, 4))
            .unwrap();
        assert_eq!(out.frame.height(), 4);
        assert_eq!(out.rows_added, 2);
        assert_eq!(
            out.frame.numeric("v").unwrap(),
            vec![Some(1.0), None, Some(3.0), None]
        );
    }

    #[test]
    fn month_start_range_skips_partial_first_month() {
        let range = date_range(date(2023, 1, 15), date(2023, 4, 1), Frequency::MonthStart);
        assert_eq!(range, vec![date(2023, 2, 1), date(2023, 3, 1), date(2023, 4, 1)]);
    }

    #[test]
    fn monthly_tables_are_snapped_to_month_start() {
        let frame = Frame::from_columns(vec![
            Column::new("fecha", vec![Some(Value::Text("2023-02-28".into()))]),
            Column::from_f64("v", vec![Some(7.0)]),
        ])
        .unwrap();
        let out = reindex(&frame, "fecha", Frequency::MonthStart, date(2023, 1, 1), date(2023, 3, 1))
            .unwrap();
        assert_eq!(out.frame.numeric("v").unwrap(), vec![None, Some(7.0), None]);
    }

    #[test]
    fn horizon_is_latest_date_across_frames() {
        let other = Frame::from_columns(vec![Column::new(
            "fecha",
            vec![Some(Value::Date(date(2024, 5, 1)))],
        )])
        .unwrap();
        let frames = [sample(), other];
        assert_eq!(global_horizon(frames.iter(), "fecha"), Some(date(2024, 5, 1)));
    }

    proptest! {
        #[test]
        fn reindexed_index_is_contiguous(offsets in proptest::collection::vec(0i64..120, 1..40), monthly in any::<bool>()) {
            let base = date(2022, 1, 1);
            let frequency = if monthly { Frequency::MonthStart } else { Frequency::Daily };
            let values = offsets
                .iter()
                .map(|o| Some(Value::Date(base + chrono::Duration::days(*o))))
                .collect();
            let frame = Frame::from_columns(vec![Column::new("fecha", values)]).unwrap();
            let horizon = global_horizon([&frame], "fecha").unwrap();
            let out = reindex(&frame, "fecha", frequency, base, horizon).unwrap();
            let dates: Vec<NaiveDate> = out.frame.dates("fecha").unwrap().into_iter().flatten().collect();
            prop_assert_eq!(dates.len(), out.frame.height());
            for pair in dates.windows(2) {
                let expected = match frequency {
                    Frequency::Daily => pair[0].succ_opt().unwrap(),
                    Frequency::MonthStart => pair[0].checked_add_months(Months::new(1)).unwrap(),
                };
                prop_assert_eq!(pair[1], expected);
            }
        }
    }
}
