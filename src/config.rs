//! Pipeline configuration.
//!
//! The YAML document is deserialized once into [`Config`]; every optional
//! field carries a serde default, and [`Config::validate`] rejects
//! inconsistent combinations up front so later stages can read fields
//! directly.

use std::{
    collections::BTreeMap,
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, ensure};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    aggregate::{AggregationRule, TableAggregation},
    contract::DataContract,
    impute::FillStep,
    reindex::Frequency,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub data: DataConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub data_contract: DataContract,
    #[serde(default)]
    pub financial_health: FinancialHealthConfig,
    #[serde(default)]
    pub preprocessing: PreprocessingConfig,
    #[serde(default)]
    pub business_calendar: BusinessCalendar,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    pub source_tables: Vec<String>,
    #[serde(default)]
    pub primary_table: Option<String>,
    #[serde(default = "DataConfig::default_date_column")]
    pub date_column: String,
    #[serde(default, alias = "full_refresh")]
    pub full_update: bool,
    #[serde(default = "DataConfig::default_min_history_months")]
    pub min_history_months: u32,
    #[serde(default = "DataConfig::default_page_size")]
    pub page_size: usize,
    #[serde(default)]
    pub roles: BTreeMap<String, TableRole>,
}

impl DataConfig {
    fn default_date_column() -> String {
        "fecha".to_string()
    }

    const fn default_min_history_months() -> u32 {
        36
    }

    const fn default_page_size() -> usize {
        1000
    }
}

/// Business identity of a source table. Selects the default imputation and
/// aggregation policies.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TableRole {
    Sales,
    Marketing,
    Promotion,
    Macro,
    Other,
}

impl TableRole {
    pub fn from_canonical_name(table: &str) -> TableRole {
        match table {
            "ventas_diarias" => TableRole::Sales,
            "redes_sociales" => TableRole::Marketing,
            "promocion_diaria" => TableRole::Promotion,
            "macro_economia" => TableRole::Macro,
            _ => TableRole::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TableRole::Sales => "sales",
            TableRole::Marketing => "marketing",
            TableRole::Promotion => "promotion",
            TableRole::Macro => "macro",
            TableRole::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "RemoteConfig::default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "RemoteConfig::default_timeout_secs")]
    pub timeout_secs: u64,
}

impl RemoteConfig {
    fn default_api_key_env() -> String {
        "SUPABASE_KEY".to_string()
    }

    const fn default_timeout_secs() -> u64 {
        30
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            api_key_env: Self::default_api_key_env(),
            timeout_secs: Self::default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "PathsConfig::default_snapshots")]
    pub snapshots: PathBuf,
    #[serde(default = "PathsConfig::default_cleansed")]
    pub cleansed: PathBuf,
    #[serde(default = "PathsConfig::default_reports")]
    pub reports: PathBuf,
    /// Master-series file name inside `cleansed`.
    #[serde(default = "PathsConfig::default_master_file")]
    pub master_file: String,
}

impl PathsConfig {
    fn default_snapshots() -> PathBuf {
        PathBuf::from("data/01_raw")
    }

    fn default_cleansed() -> PathBuf {
        PathBuf::from("data/02_cleansed")
    }

    fn default_reports() -> PathBuf {
        PathBuf::from("outputs/reports")
    }

    fn default_master_file() -> String {
        "master_monthly.csv".to_string()
    }

    pub fn master_path(&self) -> PathBuf {
        self.cleansed.join(&self.master_file)
    }

    /// Resolves relative paths against `base` (the configuration file's
    /// directory).
    pub fn rebase(&mut self, base: &Path) {
        for path in [&mut self.snapshots, &mut self.cleansed, &mut self.reports] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            snapshots: Self::default_snapshots(),
            cleansed: Self::default_cleansed(),
            reports: Self::default_reports(),
            master_file: Self::default_master_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentinelValues {
    #[serde(default)]
    pub numeric: Vec<f64>,
    #[serde(default, alias = "categorical")]
    pub text: Vec<String>,
}

/// A column that legitimately carries one of the numeric sentinel literals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SentinelExemption {
    pub table: String,
    pub column: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    #[serde(default)]
    pub sentinel_values: SentinelValues,
    #[serde(default = "QualityConfig::default_exemptions")]
    pub sentinel_exemptions: Vec<SentinelExemption>,
    #[serde(default = "QualityConfig::default_high_cardinality")]
    pub high_cardinality_threshold: f64,
    #[serde(default = "QualityConfig::default_zero_presence")]
    pub zero_presence_threshold: f64,
    /// Tables whose date column is checked for missing calendar days. When
    /// empty, every table declared with daily frequency is checked.
    #[serde(default)]
    pub high_frequency_tables: Vec<String>,
}

impl QualityConfig {
    fn default_exemptions() -> Vec<SentinelExemption> {
        vec![SentinelExemption {
            table: "macro_economia".to_string(),
            column: "confianza_consumidor".to_string(),
            value: -1.0,
        }]
    }

    const fn default_high_cardinality() -> f64 {
        0.9
    }

    const fn default_zero_presence() -> f64 {
        0.3
    }

    pub fn is_exempt(&self, table: &str, column: &str, value: f64) -> bool {
        self.sentinel_exemptions
            .iter()
            .any(|e| e.table == table && e.column == column && e.value == value)
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            sentinel_values: SentinelValues::default(),
            sentinel_exemptions: Self::default_exemptions(),
            high_cardinality_threshold: Self::default_high_cardinality(),
            zero_presence_threshold: Self::default_zero_presence(),
            high_frequency_tables: Vec::new(),
        }
    }
}

/// Column names of the sales table's quantity and money fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SalesColumns {
    pub total_units: String,
    pub normal_units: String,
    pub paid_promo_units: String,
    pub bonus_promo_units: String,
    pub unit_price: String,
    pub unit_cost: String,
    pub total_revenue: String,
    pub total_cost: String,
    pub profit: String,
}

impl Default for SalesColumns {
    fn default() -> Self {
        Self {
            total_units: "total_unidades_entregadas".to_string(),
            normal_units: "unidades_precio_normal".to_string(),
            paid_promo_units: "unidades_promo_pagadas".to_string(),
            bonus_promo_units: "unidades_promo_bonificadas".to_string(),
            unit_price: "precio_unitario_full".to_string(),
            unit_cost: "costo_unitario".to_string(),
            total_revenue: "ingresos_totales".to_string(),
            total_cost: "costo_total".to_string(),
            profit: "utilidad".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialHealthConfig {
    #[serde(default)]
    pub target_files: Vec<String>,
    #[serde(default)]
    pub columns: SalesColumns,
    /// Absolute tolerance for unit-count equalities.
    #[serde(default = "FinancialHealthConfig::default_unit_tolerance")]
    pub unit_tolerance: f64,
    /// Absolute tolerance for currency equalities.
    #[serde(default = "FinancialHealthConfig::default_currency_tolerance")]
    pub currency_tolerance: f64,
}

impl FinancialHealthConfig {
    const fn default_unit_tolerance() -> f64 {
        0.001
    }

    const fn default_currency_tolerance() -> f64 {
        0.01
    }
}

impl Default for FinancialHealthConfig {
    fn default() -> Self {
        Self {
            target_files: Vec::new(),
            columns: SalesColumns::default(),
            unit_tolerance: Self::default_unit_tolerance(),
            currency_tolerance: Self::default_currency_tolerance(),
        }
    }
}

/// Column names used by the marketing and promotion policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChannelColumns {
    /// Candidates for the campaign label column; the first present wins.
    pub campaign_label: Vec<String>,
    pub spend_channels: Vec<String>,
    /// Candidates for the total-spend column; the first present wins.
    pub spend_total: Vec<String>,
    pub promo_flag: String,
    pub promo_days: String,
}

impl Default for ChannelColumns {
    fn default() -> Self {
        Self {
            campaign_label: vec!["ciclo".to_string(), "campana".to_string()],
            spend_channels: vec![
                "inversion_facebook".to_string(),
                "inversion_instagram".to_string(),
            ],
            spend_total: vec![
                "inversion_marketing_total".to_string(),
                "inversion_total_diaria".to_string(),
            ],
            promo_flag: "es_promo".to_string(),
            promo_days: "dias_en_promo".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filters {
    #[serde(default = "Filters::default_min_date")]
    pub min_date: NaiveDate,
}

impl Filters {
    fn default_min_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap_or_default()
    }
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            min_date: Self::default_min_date(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    #[serde(default)]
    pub rename_map: BTreeMap<String, String>,
    #[serde(default)]
    pub data_frequency: BTreeMap<String, Frequency>,
    #[serde(default)]
    pub filters: Filters,
    #[serde(default)]
    pub recalc_financials: bool,
    #[serde(default)]
    pub aggregation_rules: BTreeMap<String, AggregationRule>,
    #[serde(default)]
    pub table_aggregation: BTreeMap<String, TableAggregation>,
    /// Per-table fill plans replacing the role defaults.
    #[serde(default)]
    pub imputation: BTreeMap<String, Vec<FillStep>>,
    #[serde(default)]
    pub drop_incomplete_month: bool,
    #[serde(default)]
    pub columns: ChannelColumns,
}

/// Month/day bounds of an active campaign window, inclusive on both ends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeasonWindow {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

impl SeasonWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        let key = (date.month(), date.day());
        key >= self.start && key <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignSeason {
    pub label: String,
    /// Months in which positive spend implies this campaign label.
    pub label_months: Vec<u32>,
    /// Months in which a missing promotion flag defaults to active.
    pub promo_months: Vec<u32>,
    pub window: SeasonWindow,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessCalendar {
    #[serde(default = "BusinessCalendar::default_seasons")]
    pub campaign_seasons: Vec<CampaignSeason>,
    #[serde(default = "BusinessCalendar::default_no_campaign_label")]
    pub no_campaign_label: String,
    #[serde(default, alias = "pandemic")]
    pub black_swan: Option<DateRange>,
}

impl BusinessCalendar {
    fn default_seasons() -> Vec<CampaignSeason> {
        vec![
            CampaignSeason {
                label: "Ciclo Abr-May".to_string(),
                label_months: vec![3, 4, 5],
                promo_months: vec![4, 5],
                window: SeasonWindow {
                    start: (3, 15),
                    end: (5, 25),
                },
            },
            CampaignSeason {
                label: "Ciclo Sep-Oct".to_string(),
                label_months: vec![8, 9, 10],
                promo_months: vec![9, 10],
                window: SeasonWindow {
                    start: (8, 15),
                    end: (10, 25),
                },
            },
        ]
    }

    fn default_no_campaign_label() -> String {
        "Sin Campaña".to_string()
    }

    pub fn promo_months(&self) -> Vec<u32> {
        let mut months = self
            .campaign_seasons
            .iter()
            .flat_map(|s| s.promo_months.iter().copied())
            .collect::<Vec<_>>();
        months.sort_unstable();
        months.dedup();
        months
    }

    pub fn in_active_window(&self, date: NaiveDate) -> bool {
        self.campaign_seasons.iter().any(|s| s.window.contains(date))
    }
}

impl Default for BusinessCalendar {
    fn default() -> Self {
        Self {
            campaign_seasons: Self::default_seasons(),
            no_campaign_label: Self::default_no_campaign_label(),
            black_swan: None,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening config file {path:?}"))?;
        let reader = BufReader::new(file);
        let mut config: Config =
            serde_yaml::from_reader(reader).context("Parsing configuration YAML")?;
        if let Some(base) = path.parent() {
            config.paths.rebase(base);
        }
        config
            .validate()
            .with_context(|| format!("Validating configuration {path:?}"))?;
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(raw).context("Parsing configuration YAML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.data.source_tables.is_empty(),
            "data.source_tables must list at least one table"
        );
        ensure!(self.data.page_size > 0, "data.page_size must be positive");
        ensure!(
            !self.data.date_column.trim().is_empty(),
            "data.date_column cannot be empty"
        );
        if let Some(primary) = &self.data.primary_table {
            ensure!(
                self.data.source_tables.contains(primary),
                "Primary table '{primary}' is not among data.source_tables"
            );
        }
        for (label, value) in [
            (
                "quality.high_cardinality_threshold",
                self.quality.high_cardinality_threshold,
            ),
            (
                "quality.zero_presence_threshold",
                self.quality.zero_presence_threshold,
            ),
        ] {
            ensure!(
                (0.0..=1.0).contains(&value),
                "{label} must be within [0, 1], found {value}"
            );
        }
        ensure!(
            self.financial_health.unit_tolerance >= 0.0
                && self.financial_health.currency_tolerance >= 0.0,
            "financial_health tolerances cannot be negative"
        );
        for season in &self.business_calendar.campaign_seasons {
            for month in season.label_months.iter().chain(&season.promo_months) {
                ensure!(
                    (1..=12).contains(month),
                    "Campaign season '{}' lists invalid month {month}",
                    season.label
                );
            }
            for (month, day) in [season.window.start, season.window.end] {
                ensure!(
                    (1..=12).contains(&month) && (1..=31).contains(&day),
                    "Campaign season '{}' has invalid window bound {month:02}-{day:02}",
                    season.label
                );
            }
            ensure!(
                season.window.start <= season.window.end,
                "Campaign season '{}' window starts after it ends",
                season.label
            );
        }
        if let Some(range) = &self.business_calendar.black_swan {
            ensure!(
                range.start <= range.end,
                "business_calendar.black_swan starts after it ends"
            );
        }
        for table in self.preprocessing.imputation.keys() {
            if !self.data.source_tables.contains(table) {
                return Err(anyhow!(
                    "preprocessing.imputation references unknown table '{table}'"
                ));
            }
        }
        Ok(())
    }

    pub fn role_of(&self, table: &str) -> TableRole {
        self.data
            .roles
            .get(table)
            .copied()
            .unwrap_or_else(|| TableRole::from_canonical_name(table))
    }

    /// The table whose monthly index anchors the master series.
    pub fn primary_table(&self) -> &str {
        if let Some(primary) = &self.data.primary_table {
            return primary;
        }
        self.data
            .source_tables
            .iter()
            .find(|t| self.role_of(t) == TableRole::Sales)
            .or_else(|| self.data.source_tables.first())
            .map(String::as_str)
            .unwrap_or_default()
    }

    pub fn frequency_of(&self, table: &str) -> Frequency {
        self.preprocessing
            .data_frequency
            .get(table)
            .copied()
            .unwrap_or_default()
    }

    pub fn is_high_frequency(&self, table: &str) -> bool {
        if self.quality.high_frequency_tables.is_empty() {
            self.frequency_of(table) == Frequency::Daily
        } else {
            self.quality.high_frequency_tables.iter().any(|t| t == table)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
data:
  source_tables: [ventas_diarias, macro_economia]
"#;

    #[test]
    fn minimal_config_resolves_defaults() {
        let config = Config::from_yaml_str(MINIMAL).expect("parse config");
        assert_eq!(config.data.date_column, "fecha");
        assert_eq!(config.data.page_size, 1000);
        assert_eq!(config.data.min_history_months, 36);
        assert_eq!(config.quality.high_cardinality_threshold, 0.9);
        assert_eq!(config.quality.zero_presence_threshold, 0.3);
        assert_eq!(config.primary_table(), "ventas_diarias");
        assert_eq!(config.role_of("macro_economia"), TableRole::Macro);
        assert_eq!(config.frequency_of("ventas_diarias"), Frequency::Daily);
        assert_eq!(config.business_calendar.promo_months(), vec![4, 5, 9, 10]);
        assert!(config.quality.is_exempt("macro_economia", "confianza_consumidor", -1.0));
    }

    #[test]
    fn primary_table_must_be_a_source() {
        let raw = r#"
data:
  source_tables: [a]
  primary_table: b
"#;
        let err = Config::from_yaml_str(raw).unwrap_err();
        assert!(err.to_string().contains("Primary table 'b'"));
    }

    #[test]
    fn thresholds_outside_unit_interval_are_rejected() {
        let raw = r#"
data:
  source_tables: [a]
quality:
  zero_presence_threshold: 1.5
"#;
        assert!(Config::from_yaml_str(raw).is_err());
    }

    #[test]
    fn season_window_bounds_are_inclusive() {
        let window = SeasonWindow {
            start: (3, 15),
            end: (5, 25),
        };
        let day = |m, d| NaiveDate::from_ymd_opt(2023, m, d).unwrap();
        assert!(window.contains(day(3, 15)));
        assert!(window.contains(day(5, 25)));
        assert!(!window.contains(day(3, 14)));
        assert!(!window.contains(day(5, 26)));
    }

    #[test]
    fn categorical_alias_feeds_text_sentinels() {
        let raw = r#"
data:
  source_tables: [a]
quality:
  sentinel_values:
    numeric: [-1, 999]
    categorical: ["NULL"]
"#;
        let config = Config::from_yaml_str(raw).unwrap();
        assert_eq!(config.quality.sentinel_values.text, vec!["NULL"]);
        assert_eq!(config.quality.sentinel_values.numeric, vec![-1.0, 999.0]);
    }
}
