//! Declared column contracts and their validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::frame::{Column, ColumnKind, Frame};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogicalType {
    #[serde(alias = "integer", alias = "int64")]
    Int,
    #[serde(alias = "float64", alias = "double", alias = "numeric")]
    Float,
    #[serde(alias = "date", alias = "timestamp", alias = "datetime64")]
    Datetime,
}

impl LogicalType {
    pub fn as_str(self) -> &'static str {
        match self {
            LogicalType::Int => "int",
            LogicalType::Float => "float",
            LogicalType::Datetime => "datetime",
        }
    }

    /// Whether the observed column satisfies this logical type. Columns with
    /// no values satisfy every type.
    pub fn accepts(self, column: &Column) -> bool {
        let kind = column.kind();
        match (self, kind) {
            (_, ColumnKind::Empty) => true,
            (LogicalType::Int, ColumnKind::Integer) => true,
            (LogicalType::Float, kind) => kind.is_numeric(),
            (LogicalType::Datetime, ColumnKind::DateTime) => true,
            (LogicalType::Datetime, ColumnKind::Text) => column
                .values
                .iter()
                .flatten()
                .all(|v| v.as_datetime().is_some()),
            _ => false,
        }
    }
}

/// Expected column types of one table.
pub type TableContract = BTreeMap<String, LogicalType>;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct DataContract(BTreeMap<String, TableContract>);

impl DataContract {
    pub fn new(tables: BTreeMap<String, TableContract>) -> Self {
        Self(tables)
    }

    pub fn table(&self, name: &str) -> Option<&TableContract> {
        self.0.get(name)
    }

    pub fn tables(&self) -> impl Iterator<Item = (&String, &TableContract)> {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContractStatus {
    Pass,
    Warning,
    Fail,
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractReport {
    pub status: ContractStatus,
    pub missing_columns: Vec<String>,
    pub extra_columns: Vec<String>,
    pub type_mismatches: Vec<String>,
}

impl ContractStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Pass => "PASS",
            ContractStatus::Warning => "WARNING",
            ContractStatus::Fail => "FAIL",
            ContractStatus::Skipped => "SKIPPED",
        }
    }
}

impl ContractReport {
    fn skipped() -> Self {
        Self {
            status: ContractStatus::Skipped,
            missing_columns: Vec::new(),
            extra_columns: Vec::new(),
            type_mismatches: Vec::new(),
        }
    }
}

pub fn validate(frame: &Frame, table: &str, contract: &DataContract) -> ContractReport {
    let Some(expected) = contract.table(table) else {
        return ContractReport::skipped();
    };

    let missing_columns = expected
        .keys()
        .filter(|name| !frame.has_column(name))
        .cloned()
        .collect::<Vec<_>>();
    let extra_columns = frame
        .column_names()
        .into_iter()
        .filter(|name| !expected.contains_key(name))
        .collect::<Vec<_>>();
    let type_mismatches = expected
        .iter()
        .filter_map(|(name, logical)| {
            let column = frame.column(name)?;
            (!logical.accepts(column)).then(|| {
                format!(
                    "column '{name}': expected {}, found {}",
                    logical.as_str(),
                    column.kind().as_str()
                )
            })
        })
        .collect::<Vec<_>>();

    let status = if !missing_columns.is_empty() || !type_mismatches.is_empty() {
        ContractStatus::Fail
    } else if !extra_columns.is_empty() {
        ContractStatus::Warning
    } else {
        ContractStatus::Pass
    };

    ContractReport {
        status,
        missing_columns,
        extra_columns,
        type_mismatches,
    }
}
