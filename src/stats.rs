//! Descriptive statistics and IQR outlier detection for numeric columns.

use serde::{Deserialize, Serialize};

use crate::frame::Column;

/// Summary of one numeric column. Percentiles interpolate linearly between
/// the closest ranks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NumericSummary {
    pub count: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub min: Option<f64>,
    pub p25: Option<f64>,
    pub median: Option<f64>,
    pub p75: Option<f64>,
    pub max: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutlierSummary {
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub count: usize,
    pub ratio: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ColumnStats {
    values: Vec<f64>,
    sum: f64,
    sum_squares: f64,
    min: Option<f64>,
    max: Option<f64>,
    sorted: bool,
}

impl ColumnStats {
    pub fn from_column(column: &Column) -> Self {
        let mut stats = ColumnStats::default();
        for value in column.numeric().into_iter().flatten() {
            stats.add_value(value);
        }
        stats
    }

    pub fn add_value(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        self.sum += value;
        self.sum_squares += value * value;
        self.min = Some(self.min.map_or(value, |current| current.min(value)));
        self.max = Some(self.max.map_or(value, |current| current.max(value)));
        self.values.push(value);
        self.sorted = false;
    }

    pub fn count(&self) -> usize {
        self.values.len()
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.sum / self.count() as f64)
        }
    }

    /// Sample standard deviation (n - 1 denominator).
    pub fn std_dev(&self) -> Option<f64> {
        let count = self.count();
        if count < 2 {
            return None;
        }
        let mean = self.mean()?;
        let variance = (self.sum_squares - count as f64 * mean * mean) / (count as f64 - 1.0);
        Some(variance.max(0.0).sqrt())
    }

    fn ensure_sorted(&mut self) {
        if !self.sorted {
            self.values.sort_by(f64::total_cmp);
            self.sorted = true;
        }
    }

    /// Quantile `q` in `[0, 1]` using linear interpolation.
    pub fn quantile(&mut self, q: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        self.ensure_sorted();
        let rank = q.clamp(0.0, 1.0) * (self.values.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let fraction = rank - lower as f64;
        Some(self.values[lower] + (self.values[upper] - self.values[lower]) * fraction)
    }

    pub fn summary(&mut self) -> NumericSummary {
        NumericSummary {
            count: self.count(),
            mean: self.mean(),
            std_dev: self.std_dev(),
            min: self.min,
            p25: self.quantile(0.25),
            median: self.quantile(0.5),
            p75: self.quantile(0.75),
            max: self.max,
        }
    }

    /// Values outside `[Q1 - 1.5 IQR, Q3 + 1.5 IQR]`. The ratio is taken over
    /// all rows of the column, missing cells included.
    pub fn outliers(&mut self, total_rows: usize) -> Option<OutlierSummary> {
        let q1 = self.quantile(0.25)?;
        let q3 = self.quantile(0.75)?;
        let iqr = q3 - q1;
        let lower_bound = q1 - 1.5 * iqr;
        let upper_bound = q3 + 1.5 * iqr;
        let count = self
            .values
            .iter()
            .filter(|v| **v < lower_bound || **v > upper_bound)
            .count();
        let ratio = if total_rows == 0 {
            0.0
        } else {
            count as f64 / total_rows as f64
        };
        Some(OutlierSummary {
            lower_bound,
            upper_bound,
            count,
            ratio,
        })
    }
}

pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{value:.0}")
    } else {
        format!("{value:.4}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_of(values: &[f64]) -> ColumnStats {
        let mut stats = ColumnStats::default();
        for value in values {
            stats.add_value(*value);
        }
        stats
    }

    #[test]
    fn summary_matches_hand_computed_values() {
        let mut stats = stats_of(&[4.0, 1.0, 3.0, 2.0]);
        let summary = stats.summary();
        assert_eq!(summary.count, 4);
        assert_eq!(summary.mean, Some(2.5));
        assert_eq!(summary.min, Some(1.0));
        assert_eq!(summary.max, Some(4.0));
        assert_eq!(summary.median, Some(2.5));
        assert_eq!(summary.p25, Some(1.75));
        assert_eq!(summary.p75, Some(3.25));
        let std = summary.std_dev.unwrap();
        assert!((std - 1.290_994).abs() < 1e-6);
    }

    #[test]
    fn single_value_has_no_std_dev() {
        let mut stats = stats_of(&[7.0]);
        assert_eq!(stats.summary().std_dev, None);
        assert_eq!(stats.quantile(0.9), Some(7.0));
    }

    #[test]
    fn iqr_rule_flags_extreme_values() {
        let mut stats = stats_of(&[10.0, 11.0, 12.0, 13.0, 14.0, 100.0]);
        let outliers = stats.outliers(8).unwrap();
        assert_eq!(outliers.count, 1);
        assert_eq!(outliers.ratio, 1.0 / 8.0);
    }

    #[test]
    fn empty_column_has_no_outlier_summary() {
        let mut stats = ColumnStats::default();
        assert!(stats.outliers(3).is_none());
        assert_eq!(stats.summary().mean, None);
    }
}
