mod common;

use std::path::Path;

use common::{
    MACRO, PROMO, SALES, SOCIAL, TestWorkspace, business_client, date, macro_rows, promo_rows,
    sales_rows, social_rows,
};
use series_consolidate::{
    config::Config,
    io_utils::sha256_file,
    pipeline::{self, PreprocessOptions},
    remote::{MemoryTableClient, TableSource},
    report::ValidationStatus,
};
use serde_json::json;

fn seed(config: &Config, client: &MemoryTableClient) {
    pipeline::discover(config, Some(client as &dyn TableSource), false).expect("discovery");
}

fn options(today: chrono::NaiveDate) -> PreprocessOptions {
    PreprocessOptions {
        today,
        delimiter: None,
    }
}

fn read_master(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut reader = csv::Reader::from_path(path).expect("open master");
    let headers = reader
        .headers()
        .expect("headers")
        .iter()
        .map(str::to_string)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.expect("row").iter().map(str::to_string).collect())
        .collect();
    (headers, rows)
}

fn column<'a>(headers: &[String], rows: &'a [Vec<String>], name: &str) -> Vec<&'a str> {
    let idx = headers
        .iter()
        .position(|h| h == name)
        .unwrap_or_else(|| panic!("column {name} missing"));
    rows.iter().map(|row| row[idx].as_str()).collect()
}

#[test]
fn consolidates_all_tables_into_a_gap_free_monthly_master() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    seed(&config, &business_client());

    let report = pipeline::preprocess(&config, &options(date(2023, 5, 10))).unwrap();
    assert_eq!(report.validation_status, ValidationStatus::Success);
    assert_eq!(report.imputation.residual_nulls, 0);
    assert_eq!(report.global_horizon, date(2023, 3, 31));
    assert_eq!(report.primary_table, SALES);
    assert_eq!(report.artifact.rows, 3);
    assert_eq!(report.artifact.coverage.total_months, 3);
    assert_eq!(report.artifact.coverage.start, Some(date(2023, 1, 1)));
    assert_eq!(report.artifact.coverage.frequency, "MS");
    assert_eq!(report.cleaning[SALES].rows_reindexed, 0);
    assert_eq!(report.cleaning[SALES].monthly_rows, 3);

    let master_path = config.paths.master_path();
    assert_eq!(report.artifact.path, master_path);
    assert_eq!(report.artifact.sha256, sha256_file(&master_path).unwrap());

    let (headers, rows) = read_master(&master_path);
    assert_eq!(headers[0], "fecha");
    for expected in ["ipc", "confianza_consumidor", "dias_en_promo", "inversion_marketing_total"] {
        assert!(headers.iter().any(|h| h == expected), "missing {expected}");
    }
    assert!(rows.iter().flatten().all(|cell| !cell.is_empty()));
    assert_eq!(
        column(&headers, &rows, "fecha"),
        vec!["2023-01-01", "2023-02-01", "2023-03-01"]
    );

    let january: i64 = sales_rows(date(2023, 1, 1), 31)
        .iter()
        .map(|row| row["total_unidades_entregadas"].as_i64().unwrap())
        .sum();
    assert_eq!(
        column(&headers, &rows, "total_unidades_entregadas")[0],
        january.to_string()
    );
    // The exempt consumer-confidence reading survives sentinel cleaning.
    assert_eq!(column(&headers, &rows, "confianza_consumidor")[0], "-1");
    assert!(config.paths.reports.join("phase_02_preprocessing.json").is_file());
}

#[test]
fn missing_sales_days_are_imputed_and_their_financials_recalculated() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    let mut sales = sales_rows(date(2023, 1, 1), 90);
    sales.drain(9..12);
    let client = business_client().with_table(SALES, sales);
    seed(&config, &client);

    let report = pipeline::preprocess(&config, &options(date(2023, 5, 10))).unwrap();
    let stats = &report.cleaning[SALES];
    assert_eq!(stats.rows_reindexed, 3);
    assert_eq!(stats.financial_rows_recalculated, 3);
    assert!(stats.cells_imputed > 0);
    assert_eq!(report.imputation.financial_rows_recalculated, 3);
    assert_eq!(report.validation_status, ValidationStatus::Success);

    let (_, rows) = read_master(&config.paths.master_path());
    assert!(rows.iter().flatten().all(|cell| !cell.is_empty()));
}

#[test]
fn sentinels_are_replaced_then_filled() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    let mut macro_table = macro_rows(&[date(2023, 1, 1), date(2023, 2, 1), date(2023, 3, 1)]);
    macro_table[1].insert("ipc".into(), json!(999));
    let client = business_client().with_table(MACRO, macro_table);
    seed(&config, &client);

    let report = pipeline::preprocess(&config, &options(date(2023, 5, 10))).unwrap();
    assert_eq!(report.cleaning[MACRO].sentinels_replaced, 1);
    assert_eq!(report.cleaning[MACRO].cells_imputed, 1);

    let (headers, rows) = read_master(&config.paths.master_path());
    // Rolling mean of the single preceding month.
    assert_eq!(column(&headers, &rows, "ipc"), vec!["100", "100", "102"]);
}

#[test]
fn current_month_is_dropped_when_requested() {
    let workspace = TestWorkspace::new();
    let yaml = format!("{}  drop_incomplete_month: true\n", common::PIPELINE_CONFIG);
    let (_, config) = workspace.config(&yaml);
    seed(&config, &business_client());

    let report = pipeline::preprocess(&config, &options(date(2023, 3, 20))).unwrap();
    assert!(report.imputation.incomplete_month_dropped);
    assert_eq!(report.artifact.rows, 2);
    assert_eq!(report.artifact.coverage.end, Some(date(2023, 2, 1)));
}

#[test]
fn tab_delimited_master_follows_the_requested_delimiter() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    seed(&config, &business_client());

    let options = PreprocessOptions {
        today: date(2023, 5, 10),
        delimiter: Some(b'\t'),
    };
    pipeline::preprocess(&config, &options).unwrap();
    let contents = std::fs::read_to_string(config.paths.master_path()).unwrap();
    assert!(contents.lines().next().unwrap().starts_with("fecha\t"));
}

#[test]
fn missing_snapshot_is_fatal() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    let start = date(2023, 1, 1);
    let client = MemoryTableClient::new()
        .with_table(SALES, sales_rows(start, 90))
        .with_table(PROMO, promo_rows(start, 90))
        .with_table(SOCIAL, social_rows(start, 90));
    seed(&config, &client);

    let err = pipeline::preprocess(&config, &options(date(2023, 5, 10))).unwrap_err();
    assert!(err.to_string().contains("Snapshot for 'macro_economia' not found"));
    assert!(!config.paths.master_path().exists());
}

#[test]
fn missing_contracted_column_stops_preprocessing() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    let mut sales = sales_rows(date(2023, 1, 1), 90);
    for row in &mut sales {
        row.remove("utilidad");
    }
    seed(&config, &business_client().with_table(SALES, sales));

    let err = pipeline::preprocess(&config, &options(date(2023, 5, 10))).unwrap_err();
    assert!(err.to_string().contains("missing contracted column(s): utilidad"));
}
