mod common;

use common::{SALES, TestWorkspace, business_client, date, sales_rows};
use series_consolidate::{
    pipeline,
    remote::{MemoryTableClient, TableSource},
    snapshot::SnapshotStore,
    sync::{SyncKind, TableSynchronizer},
};

const SALES_ONLY: &str = r#"
data:
  source_tables: [ventas_diarias]
  page_size: 20
paths:
  snapshots: raw
  reports: reports
"#;

#[test]
fn first_discovery_downloads_every_table_in_full() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(common::PIPELINE_CONFIG);
    let client = business_client();

    let report = pipeline::discover(&config, Some(&client as &dyn TableSource), false)
        .expect("discovery");

    assert_eq!(report.sync.len(), 4);
    for record in &report.sync {
        assert_eq!(record.kind, SyncKind::Full, "{}", record.table);
        assert!(record.error.is_none());
    }
    let sales = report.sync.iter().find(|r| r.table == SALES).unwrap();
    assert_eq!(sales.new_rows, 90);
    assert_eq!(sales.watermark.as_deref(), Some("2023-03-31"));
    let store = SnapshotStore::new(&config.paths.snapshots);
    for table in &config.data.source_tables {
        assert!(store.exists(table), "missing snapshot for {table}");
    }
    assert!(config.paths.reports.join("phase_01_discovery.json").is_file());
}

#[test]
fn repeated_discovery_without_new_rows_is_up_to_date() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(SALES_ONLY);
    let client = MemoryTableClient::new().with_table(SALES, sales_rows(date(2023, 6, 1), 30));

    pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();
    for _ in 0..2 {
        let report = pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();
        let record = &report.sync[0];
        assert_eq!(record.kind, SyncKind::UpToDate);
        assert_eq!(record.new_rows, 0);
        assert_eq!(record.total_rows, 30);
    }
}

#[test]
fn incremental_sync_fetches_only_rows_after_the_watermark() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(SALES_ONLY);
    let mut client =
        MemoryTableClient::new().with_table(SALES, sales_rows(date(2023, 6, 1), 1));
    pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();

    client.append_rows(SALES, sales_rows(date(2023, 7, 1), 1));
    let report = pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();
    let record = &report.sync[0];
    assert_eq!(record.kind, SyncKind::Incremental);
    assert_eq!(record.new_rows, 1);
    assert_eq!(record.total_rows, 2);
    assert_eq!(record.watermark.as_deref(), Some("2023-07-01"));
}

#[test]
fn full_refresh_flag_ignores_the_local_snapshot() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(SALES_ONLY);
    let client = MemoryTableClient::new().with_table(SALES, sales_rows(date(2023, 6, 1), 5));
    pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();

    let report = pipeline::discover(&config, Some(&client as &dyn TableSource), true).unwrap();
    assert_eq!(report.sync[0].kind, SyncKind::Full);
    assert_eq!(report.sync[0].new_rows, 5);
}

#[test]
fn failed_page_keeps_rows_retrieved_before_it() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(SALES_ONLY);
    let client = MemoryTableClient::new()
        .with_table(SALES, sales_rows(date(2023, 1, 1), 50))
        .fail_from_offset(40);
    let store = SnapshotStore::new(&config.paths.snapshots);

    let outcome = TableSynchronizer::new(&client, &store, 20)
        .sync(SALES, "fecha", false)
        .unwrap();
    assert_eq!(outcome.record.kind, SyncKind::Full);
    assert_eq!(outcome.frame.height(), 40);
    assert!(
        outcome
            .record
            .error
            .as_deref()
            .is_some_and(|e| e.contains("offset 40"))
    );
}

#[test]
fn unreachable_remote_does_not_abort_discovery() {
    let workspace = TestWorkspace::new();
    let (_, config) = workspace.config(SALES_ONLY);
    // The table is unknown to the source, so every request fails.
    let client = MemoryTableClient::new();

    let report = pipeline::discover(&config, Some(&client as &dyn TableSource), false).unwrap();
    let record = &report.sync[0];
    assert_eq!(record.total_rows, 0);
    assert!(record.error.is_some());
    assert_eq!(report.analysis[SALES].profile.rows, 0);
}
