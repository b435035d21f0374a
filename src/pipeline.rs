//! The two pipeline phases.
//!
//! Discovery synchronizes every source table and certifies it (profile,
//! contract, financial health). Preprocessing consolidates the local
//! snapshots into the master series. Per-table work returns its own
//! result; the phase functions combine them, and the final join only runs
//! once every table is done.

use std::{collections::BTreeMap, fs};

use anyhow::{Context, Result, anyhow, bail};
use chrono::NaiveDate;
use log::{debug, info, warn};

use crate::{
    aggregate::{MonthlyPlan, aggregate_monthly},
    clean::{clean_rows, enforce_schema, normalize_sentinels, standardize_names},
    config::{Config, TableRole},
    contract,
    data::normalize_column_name,
    financial,
    frame::Frame,
    impute::{FillContext, apply_policy, policy_for, recalculate_financials},
    io_utils::{printable_delimiter, resolve_output_delimiter, sha256_file, write_frame_csv},
    profile::{ProfileOptions, profile},
    reindex::{Frequency, global_horizon, reindex},
    remote::TableSource,
    report::{
        ArtifactDetails, DiscoveryReport, ImputationMetrics, PreprocessReport, TableAnalysis,
        TableCleaning, TemporalCoverage, ValidationStatus,
    },
    snapshot::SnapshotStore,
    sync::TableSynchronizer,
    unify::{close_gaps, drop_incomplete_month, unify},
};

/// Profile, contract and financial checks of one raw table.
pub fn analyze_table(config: &Config, table: &str, frame: &Frame) -> TableAnalysis {
    let profile = profile(frame, &ProfileOptions::for_table(config, table));
    let contract = contract::validate(frame, table, &config.data_contract);
    let financial = financial::check(frame, table, &config.financial_health);
    info!(
        "'{table}': {} row(s), contract {}, financial health {}",
        profile.rows,
        contract.status.as_str(),
        financial.status.as_str()
    );
    TableAnalysis {
        profile,
        contract,
        financial,
    }
}

/// Synchronizes (when a source is given) and analyzes every source table,
/// then writes the discovery report. Without a source the existing
/// snapshots are analyzed as they are.
pub fn discover(
    config: &Config,
    source: Option<&dyn TableSource>,
    full_refresh: bool,
) -> Result<DiscoveryReport> {
    let store = SnapshotStore::new(&config.paths.snapshots);
    let date_column = &config.data.date_column;
    let full_refresh = full_refresh || config.data.full_update;
    let mut records = Vec::new();
    let mut analysis = BTreeMap::new();

    for table in &config.data.source_tables {
        let frame = match source {
            Some(source) => {
                let synchronizer = TableSynchronizer::new(source, &store, config.data.page_size);
                let outcome = synchronizer
                    .sync(table, date_column, full_refresh)
                    .with_context(|| format!("Synchronizing '{table}'"))?;
                records.push(outcome.record);
                outcome.frame
            }
            None => match store.load_or_discard(table) {
                Some(snapshot) => snapshot.frame,
                None => {
                    warn!("No local snapshot for '{table}'; skipping analysis");
                    continue;
                }
            },
        };
        analysis.insert(table.clone(), analyze_table(config, table, &frame));
    }

    let report = DiscoveryReport::new(records, analysis);
    let path = report.write(&config.paths.reports)?;
    info!("Discovery report written to {path:?}");
    Ok(report)
}

/// A table after cleaning, ready to be laid on the global date index.
#[derive(Debug, Clone)]
pub struct CleanedTable {
    pub name: String,
    pub frame: Frame,
    pub stats: TableCleaning,
}

/// A table reduced to month-start rows.
#[derive(Debug, Clone)]
pub struct MonthlyTable {
    pub name: String,
    pub frame: Frame,
    pub stats: TableCleaning,
}

/// Contract gate, name standardization, schema enforcement, row cleaning
/// and sentinel normalization of one raw table.
pub fn clean_table(config: &Config, table: &str, raw: &Frame) -> Result<CleanedTable> {
    let gate = contract::validate(raw, table, &config.data_contract);
    if !gate.missing_columns.is_empty() {
        bail!(
            "Table '{table}' is missing contracted column(s): {}",
            gate.missing_columns.join(", ")
        );
    }

    let rename_map = &config.preprocessing.rename_map;
    let mut frame = raw.clone();
    standardize_names(&mut frame, rename_map)?;
    let columns_removed = enforce_schema(&mut frame, config.data_contract.table(table), rename_map);

    let date_column = normalize_column_name(&config.data.date_column);
    if !frame.has_column(&date_column) {
        return Err(anyhow!("Table '{table}' has no '{date_column}' column"));
    }
    let (mut frame, counts) =
        clean_rows(&frame, &date_column, config.preprocessing.filters.min_date)
            .with_context(|| format!("Cleaning rows of '{table}'"))?;
    let sentinels_replaced = normalize_sentinels(&mut frame, table, &config.quality);
    info!(
        "'{table}': {} duplicate(s) removed, {} row(s) before {} filtered, {sentinels_replaced} sentinel(s) replaced",
        counts.duplicates_removed, counts.rows_filtered, config.preprocessing.filters.min_date
    );

    Ok(CleanedTable {
        name: table.to_string(),
        frame,
        stats: TableCleaning {
            input_rows: raw.height(),
            columns_removed,
            duplicates_removed: counts.duplicates_removed,
            rows_filtered: counts.rows_filtered,
            sentinels_replaced,
            ..TableCleaning::default()
        },
    })
}

/// Reindexes a cleaned table up to `horizon`, imputes it by its policy,
/// optionally recomputes imputed financial rows, and aggregates it to
/// months.
pub fn consolidate_table(
    config: &Config,
    cleaned: CleanedTable,
    horizon: NaiveDate,
) -> Result<MonthlyTable> {
    let CleanedTable {
        name: table,
        frame,
        mut stats,
    } = cleaned;
    let date_column = normalize_column_name(&config.data.date_column);
    let frequency = config.frequency_of(&table);
    let role = config.role_of(&table);

    let reindexed = reindex(
        &frame,
        &date_column,
        frequency,
        config.preprocessing.filters.min_date,
        horizon,
    )
    .with_context(|| format!("Reindexing '{table}'"))?;
    stats.rows_reindexed = reindexed.rows_added;
    let mut frame = reindexed.frame;

    let sales = &config.financial_health.columns;
    let imputed_rows: Vec<bool> = match frame.column(&sales.total_units) {
        Some(column) if role == TableRole::Sales => {
            column.values.iter().map(Option::is_none).collect()
        }
        _ => Vec::new(),
    };

    let ctx = FillContext {
        date_column: &date_column,
        calendar: &config.business_calendar,
    };
    stats.cells_imputed = apply_policy(&mut frame, &policy_for(config, &table), &ctx)
        .with_context(|| format!("Imputing '{table}'"))?;
    if config.preprocessing.recalc_financials && !imputed_rows.is_empty() {
        stats.financial_rows_recalculated = recalculate_financials(&mut frame, &imputed_rows, sales)?;
    }
    warn_on_required_nulls(&frame, &table, role, config);

    let plan = MonthlyPlan::resolve(config, &table, &frame);
    let monthly = aggregate_monthly(&frame, &date_column, &plan)
        .with_context(|| format!("Aggregating '{table}' to months"))?;
    stats.monthly_rows = monthly.height();
    info!(
        "'{table}' ({}): {} period(s) added by reindexing, {} cell(s) imputed, {} month(s)",
        frequency.as_str(),
        stats.rows_reindexed,
        stats.cells_imputed,
        stats.monthly_rows
    );
    Ok(MonthlyTable {
        name: table,
        frame: monthly,
        stats,
    })
}

fn warn_on_required_nulls(frame: &Frame, table: &str, role: TableRole, config: &Config) {
    let required: Vec<String> = match role {
        TableRole::Sales => vec![config.financial_health.columns.total_units.clone()],
        TableRole::Macro => frame.numeric_column_names(),
        _ => Vec::new(),
    };
    for name in required {
        if let Some(column) = frame.column(&name)
            && column.null_count() > 0
        {
            warn!(
                "'{table}.{name}' still has {} missing value(s) after imputation",
                column.null_count()
            );
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PreprocessOptions {
    /// Reference date for the incomplete-month trim.
    pub today: NaiveDate,
    /// Master-series delimiter; inferred from the file extension when unset.
    pub delimiter: Option<u8>,
}

impl Default for PreprocessOptions {
    fn default() -> Self {
        Self {
            today: chrono::Local::now().date_naive(),
            delimiter: None,
        }
    }
}

/// Consolidates every local snapshot into the master series, writes it
/// with its fingerprint and writes the preprocessing report. A missing
/// snapshot is fatal.
pub fn preprocess(config: &Config, options: &PreprocessOptions) -> Result<PreprocessReport> {
    let store = SnapshotStore::new(&config.paths.snapshots);
    let date_column = normalize_column_name(&config.data.date_column);

    let mut cleaned = Vec::with_capacity(config.data.source_tables.len());
    for table in &config.data.source_tables {
        let snapshot = store
            .load(table)
            .with_context(|| format!("Reading snapshot of '{table}'"))?
            .ok_or_else(|| {
                anyhow!(
                    "Snapshot for '{table}' not found at {:?}; run discovery first",
                    store.path_for(table)
                )
            })?;
        cleaned.push(clean_table(config, table, &snapshot.frame)?);
    }

    let horizon = global_horizon(cleaned.iter().map(|t| &t.frame), &date_column)
        .ok_or_else(|| anyhow!("No dated rows remain after cleaning"))?;
    info!("Global horizon: {horizon}");

    let monthly = cleaned
        .into_iter()
        .map(|table| consolidate_table(config, table, horizon))
        .collect::<Result<Vec<_>>>()?;

    let primary_name = config.primary_table();
    let primary = monthly
        .iter()
        .find(|t| t.name == primary_name)
        .ok_or_else(|| anyhow!("Primary table '{primary_name}' was not consolidated"))?;
    let others = monthly
        .iter()
        .filter(|t| t.name != primary_name)
        .map(|t| (t.name.clone(), t.frame.clone()))
        .collect::<Vec<_>>();
    let mut master = unify(&primary.frame, &others, &date_column)?;
    let residual_nulls = close_gaps(&mut master, &date_column);
    let incomplete_month_dropped = config.preprocessing.drop_incomplete_month
        && drop_incomplete_month(&mut master, &date_column, options.today);

    let artifact = write_master(config, &master, &date_column, options.delimiter)?;
    let cleaning: BTreeMap<String, TableCleaning> = monthly
        .into_iter()
        .map(|t| (t.name, t.stats))
        .collect();
    let imputation = ImputationMetrics {
        financial_rows_recalculated: cleaning
            .values()
            .map(|s| s.financial_rows_recalculated)
            .sum(),
        cells_imputed: cleaning.values().map(|s| s.cells_imputed).sum(),
        residual_nulls,
        incomplete_month_dropped,
    };
    let report = PreprocessReport {
        phase: "preprocessing".to_string(),
        timestamp: chrono::Utc::now(),
        validation_status: if residual_nulls == 0 {
            ValidationStatus::Success
        } else {
            ValidationStatus::WarningWithNulls
        },
        global_horizon: horizon,
        primary_table: primary_name.to_string(),
        cleaning,
        imputation,
        artifact,
    };
    let path = report.write(&config.paths.reports)?;
    info!("Preprocessing report written to {path:?}");
    Ok(report)
}

fn write_master(
    config: &Config,
    master: &Frame,
    date_column: &str,
    delimiter: Option<u8>,
) -> Result<ArtifactDetails> {
    let path = config.paths.master_path();
    let delimiter = resolve_output_delimiter(&path, delimiter);
    debug!("Writing master series with delimiter '{}'", printable_delimiter(delimiter));
    write_frame_csv(master, &path, delimiter)?;
    let size_bytes = fs::metadata(&path)
        .with_context(|| format!("Reading metadata of {path:?}"))?
        .len();
    let sha256 = sha256_file(&path)?;
    let months = master.dates(date_column).unwrap_or_default();
    let coverage = TemporalCoverage {
        start: months.iter().flatten().min().copied(),
        end: months.iter().flatten().max().copied(),
        frequency: Frequency::MonthStart.as_str().to_string(),
        total_months: months.iter().flatten().count(),
    };
    info!(
        "Master series written to {path:?} ({} x {}, sha256 {sha256})",
        master.height(),
        master.width()
    );
    Ok(ArtifactDetails {
        path,
        size_bytes,
        sha256,
        rows: master.height(),
        columns: master.width(),
        coverage,
        column_names: master.column_names(),
    })
}
