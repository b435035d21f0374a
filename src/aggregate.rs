//! Month-start resampling with per-column aggregation rules.

use std::collections::BTreeMap;

use anyhow::{Result, anyhow};
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    config::{Config, TableRole},
    data::Value,
    frame::{Column, Frame},
    reindex::{Frequency, date_range, month_start},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AggregationRule {
    Sum,
    First,
    Last,
    Mean,
    Min,
    Max,
}

impl AggregationRule {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationRule::Sum => "sum",
            AggregationRule::First => "first",
            AggregationRule::Last => "last",
            AggregationRule::Mean => "mean",
            AggregationRule::Min => "min",
            AggregationRule::Max => "max",
        }
    }

    /// Reduces one month of cells. Sums of an empty month are zero; the
    /// other numeric reductions are missing.
    fn reduce<'a>(self, cells: impl Iterator<Item = &'a Option<Value>>) -> Option<Value> {
        let mut present = cells.flatten();
        match self {
            AggregationRule::First => present.next().cloned(),
            AggregationRule::Last => present.last().cloned(),
            AggregationRule::Sum => Some(Value::Float(
                present.filter_map(Value::as_f64).sum::<f64>(),
            )),
            AggregationRule::Mean => {
                let numbers = present.filter_map(Value::as_f64).collect::<Vec<_>>();
                (!numbers.is_empty())
                    .then(|| Value::Float(numbers.iter().sum::<f64>() / numbers.len() as f64))
            }
            AggregationRule::Min => present
                .filter_map(Value::as_f64)
                .reduce(f64::min)
                .map(Value::Float),
            AggregationRule::Max => present
                .filter_map(Value::as_f64)
                .reduce(f64::max)
                .map(Value::Float),
        }
    }
}

/// Per-table aggregation overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableAggregation {
    /// Rule applied to every non-date column, before `rules`.
    #[serde(default)]
    pub default_rule: Option<AggregationRule>,
    #[serde(default)]
    pub rules: BTreeMap<String, AggregationRule>,
    /// Output renames applied after aggregation.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
}

/// Resolved aggregation of one table. With no rules, every numeric column
/// is summed; otherwise only ruled columns are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MonthlyPlan {
    pub rules: Vec<(String, AggregationRule)>,
    pub rename: BTreeMap<String, String>,
}

impl MonthlyPlan {
    pub fn resolve(config: &Config, table: &str, frame: &Frame) -> Self {
        let date_column = &config.data.date_column;
        let columns = frame
            .column_names()
            .into_iter()
            .filter(|c| c != date_column)
            .collect::<Vec<_>>();
        let mut rules: BTreeMap<String, AggregationRule> = columns
            .iter()
            .filter_map(|c| {
                config
                    .preprocessing
                    .aggregation_rules
                    .get(c)
                    .map(|r| (c.clone(), *r))
            })
            .collect();
        let mut rename = BTreeMap::new();

        match config.role_of(table) {
            TableRole::Promotion => {
                let flag = &config.preprocessing.columns.promo_flag;
                if frame.has_column(flag) {
                    rules.insert(flag.clone(), AggregationRule::Sum);
                    rename.insert(flag.clone(), config.preprocessing.columns.promo_days.clone());
                }
            }
            TableRole::Macro => {
                rules = columns
                    .iter()
                    .map(|c| (c.clone(), AggregationRule::First))
                    .collect();
            }
            _ => {}
        }

        if let Some(custom) = config.preprocessing.table_aggregation.get(table) {
            if let Some(rule) = custom.default_rule {
                rules = columns.iter().map(|c| (c.clone(), rule)).collect();
            }
            for (column, rule) in &custom.rules {
                if columns.contains(column) {
                    rules.insert(column.clone(), *rule);
                }
            }
            rename.extend(custom.rename.clone());
        }

        // Keep frame column order.
        let ordered = columns
            .iter()
            .filter_map(|c| rules.get(c).map(|r| (c.clone(), *r)))
            .collect();
        Self {
            rules: ordered,
            rename,
        }
    }
}

/// Resamples `frame` to month-start. The output covers every month from the
/// first to the last dated row; rows without a date are ignored.
pub fn aggregate_monthly(frame: &Frame, date_column: &str, plan: &MonthlyPlan) -> Result<Frame> {
    let dates = frame
        .dates(date_column)
        .ok_or_else(|| anyhow!("Date column '{date_column}' not found"))?;
    let groups = dates
        .iter()
        .enumerate()
        .filter_map(|(row, date)| date.map(|d| (month_start(d), row)))
        .into_group_map();
    let (Some(first), Some(last)) = (groups.keys().min().copied(), groups.keys().max().copied())
    else {
        return empty_like(date_column, plan, frame);
    };
    let months = date_range(first, last, Frequency::MonthStart);

    let rules = if plan.rules.is_empty() {
        frame
            .numeric_column_names()
            .into_iter()
            .filter(|c| c != date_column)
            .map(|c| (c, AggregationRule::Sum))
            .collect()
    } else {
        plan.rules.clone()
    };

    let mut columns = vec![Column::new(
        date_column,
        months.iter().map(|m| Some(Value::Date(*m))).collect(),
    )];
    for (name, rule) in &rules {
        let Some(source) = frame.column(name) else {
            continue;
        };
        let values = months
            .iter()
            .map(|month| {
                let rows = groups.get(month).map(Vec::as_slice).unwrap_or_default();
                rule.reduce(rows.iter().map(|&row| &source.values[row]))
            })
            .collect();
        let output = plan.rename.get(name).cloned().unwrap_or_else(|| name.clone());
        columns.push(Column::new(output, values));
    }
    Frame::from_columns(columns)
}

fn empty_like(date_column: &str, plan: &MonthlyPlan, frame: &Frame) -> Result<Frame> {
    let mut columns = vec![Column::new(date_column, Vec::new())];
    let names: Vec<String> = if plan.rules.is_empty() {
        frame
            .numeric_column_names()
            .into_iter()
            .filter(|c| c != date_column)
            .collect()
    } else {
        plan.rules.iter().map(|(c, _)| c.clone()).collect()
    };
    for name in names {
        let output = plan.rename.get(&name).cloned().unwrap_or(name);
        columns.push(Column::new(output, Vec::new()));
    }
    Frame::from_columns(columns)
}
