//! Columnar in-memory table used by every pipeline stage.
//!
//! A [`Frame`] is an ordered list of named [`Column`]s of equal height. Cells
//! are `Option<Value>`; `None` is a missing value. Column kinds are not
//! declared: they are inferred from the values actually present, the same way
//! a schema probe samples a file.

use std::collections::{HashMap, HashSet};

use anyhow::{Result, anyhow, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::data::{Value, compare_cells};

/// A remote row: column name to JSON scalar.
/// One remote row. Keys keep the order the source sent them in.
pub type Record = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Integer,
    Float,
    Boolean,
    DateTime,
    Text,
    Empty,
}

impl ColumnKind {
    pub fn is_numeric(self) -> bool {
        matches!(self, ColumnKind::Integer | ColumnKind::Float)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnKind::Integer => "integer",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Text => "text",
            ColumnKind::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone)]
struct KindCandidate {
    possible_integer: bool,
    possible_float: bool,
    possible_boolean: bool,
    possible_datetime: bool,
    observed: usize,
}

impl KindCandidate {
    fn new() -> Self {
        Self {
            possible_integer: true,
            possible_float: true,
            possible_boolean: true,
            possible_datetime: true,
            observed: 0,
        }
    }

    fn observe(&mut self, value: &Value) {
        self.observed += 1;
        if !matches!(value, Value::Integer(_)) {
            self.possible_integer = false;
        }
        if !value.is_numeric() {
            self.possible_float = false;
        }
        if !matches!(value, Value::Boolean(_)) {
            self.possible_boolean = false;
        }
        if !matches!(value, Value::Date(_) | Value::DateTime(_)) {
            self.possible_datetime = false;
        }
    }

    fn decide(&self) -> ColumnKind {
        if self.observed == 0 {
            ColumnKind::Empty
        } else if self.possible_integer {
            ColumnKind::Integer
        } else if self.possible_float {
            ColumnKind::Float
        } else if self.possible_boolean {
            ColumnKind::Boolean
        } else if self.possible_datetime {
            ColumnKind::DateTime
        } else {
            ColumnKind::Text
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<Value>>,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<Option<Value>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn from_f64(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, values.into_iter().map(|v| v.map(Value::Float)).collect())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn kind(&self) -> ColumnKind {
        let mut candidate = KindCandidate::new();
        for value in self.values.iter().flatten() {
            candidate.observe(value);
        }
        candidate.decide()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    pub fn numeric(&self) -> Vec<Option<f64>> {
        self.values
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_f64))
            .collect()
    }

    pub fn dates(&self) -> Vec<Option<NaiveDate>> {
        self.values
            .iter()
            .map(|v| v.as_ref().and_then(Value::as_date))
            .collect()
    }

    pub fn distinct_count(&self) -> usize {
        self.values
            .iter()
            .flatten()
            .map(Value::group_key)
            .collect::<HashSet<_>>()
            .len()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    columns: Vec<Column>,
}

impl Frame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_columns(columns: Vec<Column>) -> Result<Self> {
        let mut frame = Frame::new();
        for column in columns {
            frame.push_column(column)?;
        }
        Ok(frame)
    }

    /// Builds a frame from remote rows. Columns appear in first-seen order;
    /// keys absent from a row become missing cells.
    pub fn from_records(records: &[Record]) -> Self {
        let mut order: Vec<String> = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        for record in records {
            for key in record.keys() {
                if seen.insert(key.as_str()) {
                    order.push(key.clone());
                }
            }
        }
        let columns = order
            .into_iter()
            .map(|name| {
                let values = records
                    .iter()
                    .map(|record| record.get(&name).and_then(Value::from_json))
                    .collect();
                Column::new(name, values)
            })
            .collect();
        Frame { columns }
    }

    pub fn height(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.name == name)
    }

    pub fn columns_mut(&mut self) -> impl Iterator<Item = &mut Column> {
        self.columns.iter_mut()
    }

    /// Appends a column, or replaces the column with the same name in place.
    pub fn push_column(&mut self, column: Column) -> Result<()> {
        if !self.columns.is_empty() {
            ensure!(
                column.len() == self.height(),
                "Column '{}' has {} row(s) but frame has {}",
                column.name,
                column.len(),
                self.height()
            );
        }
        match self.column_index(&column.name) {
            Some(idx) => self.columns[idx] = column,
            None => self.columns.push(column),
        }
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.column_index(name)?;
        Some(self.columns.remove(idx))
    }

    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        if self.has_column(to) {
            return Err(anyhow!("Cannot rename '{from}' to existing column '{to}'"));
        }
        let column = self
            .column_mut(from)
            .ok_or_else(|| anyhow!("Column '{from}' not found"))?;
        column.name = to.to_string();
        Ok(())
    }

    pub fn numeric(&self, name: &str) -> Option<Vec<Option<f64>>> {
        self.column(name).map(Column::numeric)
    }

    /// Writes a numeric column as floats, creating it when absent.
    pub fn set_numeric(&mut self, name: &str, values: Vec<Option<f64>>) -> Result<()> {
        self.push_column(Column::from_f64(name, values))
    }

    pub fn dates(&self, name: &str) -> Option<Vec<Option<NaiveDate>>> {
        self.column(name).map(Column::dates)
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&Value> {
        self.column(name)
            .and_then(|c| c.values.get(row))
            .and_then(|v| v.as_ref())
    }

    pub fn numeric_column_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.kind().is_numeric())
            .map(|c| c.name.clone())
            .collect()
    }

    /// Grouping key of a whole row; used for exact duplicate detection.
    pub fn row_key(&self, row: usize) -> String {
        self.columns
            .iter()
            .map(|c| match c.values.get(row).and_then(|v| v.as_ref()) {
                Some(value) => value.group_key(),
                None => "\u{0}".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\u{1f}")
    }

    pub fn take_rows(&self, indices: &[usize]) -> Frame {
        let columns = self
            .columns
            .iter()
            .map(|c| {
                Column::new(
                    c.name.clone(),
                    indices
                        .iter()
                        .map(|&idx| c.values.get(idx).cloned().flatten())
                        .collect(),
                )
            })
            .collect();
        Frame { columns }
    }

    pub fn select(&self, names: &[String]) -> Frame {
        let columns = self
            .columns
            .iter()
            .filter(|c| names.contains(&c.name))
            .cloned()
            .collect();
        Frame { columns }
    }

    /// Appends the rows of `other` below `self`; columns are unioned and
    /// missing cells padded.
    pub fn vstack(&self, other: &Frame) -> Frame {
        let mut names = self.column_names();
        for name in other.column_names() {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        let top = self.height();
        let bottom = other.height();
        let columns = names
            .into_iter()
            .map(|name| {
                let mut values = match self.column(&name) {
                    Some(c) => c.values.clone(),
                    None => vec![None; top],
                };
                match other.column(&name) {
                    Some(c) => values.extend(c.values.iter().cloned()),
                    None => values.extend(std::iter::repeat_n(None, bottom)),
                }
                Column::new(name, values)
            })
            .collect();
        Frame { columns }
    }

    /// Stable ascending sort on one column; missing keys sort first.
    pub fn sort_by_column(&mut self, name: &str) -> Result<()> {
        let key = self
            .column(name)
            .ok_or_else(|| anyhow!("Sort column '{name}' not found"))?;
        let mut order: Vec<usize> = (0..self.height()).collect();
        order.sort_by(|&a, &b| compare_cells(key.values[a].as_ref(), key.values[b].as_ref()));
        *self = self.take_rows(&order);
        Ok(())
    }

    /// Keeps the last row for every distinct value of `name`, preserving the
    /// relative order of survivors. Rows with a missing key are kept.
    pub fn dedup_keep_last(&self, name: &str) -> Result<Frame> {
        let key = self
            .column(name)
            .ok_or_else(|| anyhow!("Key column '{name}' not found"))?;
        let mut last: HashMap<String, usize> = HashMap::new();
        for (idx, value) in key.values.iter().enumerate() {
            if let Some(value) = value {
                last.insert(value.group_key(), idx);
            }
        }
        let keep = key
            .values
            .iter()
            .enumerate()
            .filter(|(idx, value)| match value {
                Some(value) => last.get(&value.group_key()) == Some(idx),
                None => true,
            })
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        Ok(self.take_rows(&keep))
    }

    pub fn total_nulls(&self) -> usize {
        self.columns.iter().map(Column::null_count).sum()
    }
}
