//! Report artifacts of the two pipeline phases.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    contract::ContractReport, financial::FinancialReport, io_utils::write_json_pretty,
    profile::ProfileReport, sync::SyncRecord,
};

pub const DISCOVERY_REPORT_FILE: &str = "phase_01_discovery.json";
pub const PREPROCESS_REPORT_FILE: &str = "phase_02_preprocessing.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TableAnalysis {
    pub profile: ProfileReport,
    pub contract: ContractReport,
    pub financial: FinancialReport,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryReport {
    pub phase: String,
    pub timestamp: DateTime<Utc>,
    pub sync: Vec<SyncRecord>,
    pub analysis: BTreeMap<String, TableAnalysis>,
}

impl DiscoveryReport {
    pub fn new(sync: Vec<SyncRecord>, analysis: BTreeMap<String, TableAnalysis>) -> Self {
        Self {
            phase: "discovery".to_string(),
            timestamp: Utc::now(),
            sync,
            analysis,
        }
    }

    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(DISCOVERY_REPORT_FILE);
        write_json_pretty(self, &path)?;
        Ok(path)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationStatus {
    Success,
    WarningWithNulls,
}

/// Per-table counters of the preprocessing stages.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TableCleaning {
    pub input_rows: usize,
    pub columns_removed: Vec<String>,
    pub duplicates_removed: usize,
    pub rows_filtered: usize,
    pub sentinels_replaced: usize,
    pub rows_reindexed: usize,
    pub cells_imputed: usize,
    pub financial_rows_recalculated: usize,
    pub monthly_rows: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ImputationMetrics {
    pub financial_rows_recalculated: usize,
    pub cells_imputed: usize,
    pub residual_nulls: usize,
    pub incomplete_month_dropped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemporalCoverage {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub frequency: String,
    pub total_months: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtifactDetails {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
    pub rows: usize,
    pub columns: usize,
    pub coverage: TemporalCoverage,
    pub column_names: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PreprocessReport {
    pub phase: String,
    pub timestamp: DateTime<Utc>,
    pub validation_status: ValidationStatus,
    pub global_horizon: NaiveDate,
    pub primary_table: String,
    pub cleaning: BTreeMap<String, TableCleaning>,
    pub imputation: ImputationMetrics,
    pub artifact: ArtifactDetails,
}

impl PreprocessReport {
    pub fn write(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(PREPROCESS_REPORT_FILE);
        write_json_pretty(self, &path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discovery_report_is_written_as_pretty_json() {
        let dir = tempdir().unwrap();
        let report = DiscoveryReport::new(Vec::new(), BTreeMap::new());
        let path = report.write(dir.path()).unwrap();
        assert!(path.ends_with(DISCOVERY_REPORT_FILE));
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"phase\": \"discovery\""));
        let parsed: DiscoveryReport = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed.phase, "discovery");
    }

    #[test]
    fn validation_status_uses_screaming_case() {
        let json = serde_json::to_string(&ValidationStatus::WarningWithNulls).unwrap();
        assert_eq!(json, "\"WARNING_WITH_NULLS\"");
    }
}
