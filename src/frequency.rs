use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::frame::Column;

pub const TOP_VALUES: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValueShare {
    pub value: String,
    pub count: usize,
    pub proportion: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoricalSummary {
    pub distinct: usize,
    pub top: Vec<ValueShare>,
}

/// Counts the non-missing values of a column. Proportions are relative to
/// the non-missing total; ties are broken by value so output is stable.
#[derive(Debug, Default)]
pub struct FrequencyAccumulator {
    total: usize,
    counts: HashMap<String, usize>,
}

impl FrequencyAccumulator {
    pub fn from_column(column: &Column) -> Self {
        let mut acc = FrequencyAccumulator::default();
        for value in column.values.iter().flatten() {
            acc.ingest(value.as_display());
        }
        acc
    }

    pub fn ingest(&mut self, value: String) {
        self.total += 1;
        *self.counts.entry(value).or_insert(0) += 1;
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn top(&self, top: usize) -> Vec<ValueShare> {
        if self.total == 0 {
            return Vec::new();
        }
        let mut items = self
            .counts
            .iter()
            .map(|(value, count)| (value.clone(), *count))
            .collect::<Vec<_>>();
        items.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        if top > 0 && items.len() > top {
            items.truncate(top);
        }
        items
            .into_iter()
            .map(|(value, count)| ValueShare {
                value,
                count,
                proportion: count as f64 / self.total as f64,
            })
            .collect()
    }

    pub fn summary(&self) -> CategoricalSummary {
        CategoricalSummary {
            distinct: self.distinct(),
            top: self.top(TOP_VALUES),
        }
    }
}
