#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Datelike, Duration, NaiveDate};
use serde_json::json;
use series_consolidate::{config::Config, frame::Record, remote::MemoryTableClient};
use tempfile::{TempDir, tempdir};

pub const SALES: &str = "ventas_diarias";
pub const MACRO: &str = "macro_economia";
pub const PROMO: &str = "promocion_diaria";
pub const SOCIAL: &str = "redes_sociales";

/// Configuration used by the pipeline tests; paths are relative to the
/// workspace holding the file.
pub const PIPELINE_CONFIG: &str = r#"
data:
  source_tables: [ventas_diarias, macro_economia, promocion_diaria, redes_sociales]
  date_column: fecha
  min_history_months: 1
  page_size: 25
paths:
  snapshots: raw
  cleansed: cleansed
  reports: reports
quality:
  sentinel_values:
    numeric: [-1, 999]
    text: ["NULL"]
data_contract:
  ventas_diarias:
    fecha: datetime
    total_unidades_entregadas: int
    unidades_precio_normal: int
    unidades_promo_pagadas: int
    unidades_promo_bonificadas: int
    precio_unitario_full: float
    costo_unitario: float
    ingresos_totales: float
    costo_total: float
    utilidad: float
financial_health:
  target_files: [ventas_diarias]
preprocessing:
  data_frequency:
    ventas_diarias: D
    macro_economia: MS
    promocion_diaria: D
    redes_sociales: D
  filters:
    min_date: 2023-01-01
  recalc_financials: true
  aggregation_rules:
    total_unidades_entregadas: sum
    unidades_precio_normal: sum
    unidades_promo_pagadas: sum
    unidades_promo_bonificadas: sum
    precio_unitario_full: mean
    costo_unitario: mean
    ingresos_totales: sum
    costo_total: sum
    utilidad: sum
    inversion_facebook: sum
    inversion_instagram: sum
    inversion_marketing_total: sum
"#;

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        fs::write(&path, contents).expect("write temp file contents");
        path
    }

    /// Writes `yaml` as `config.yaml` and loads it, resolving the relative
    /// paths against the workspace.
    pub fn config(&self, yaml: &str) -> (PathBuf, Config) {
        let path = self.write("config.yaml", yaml);
        let config = Config::load(&path).expect("load config");
        (path, config)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

pub fn days(start: NaiveDate, count: usize) -> impl Iterator<Item = NaiveDate> {
    (0..count).map(move |i| start + Duration::days(i as i64))
}

fn record(value: serde_json::Value) -> Record {
    match value {
        serde_json::Value::Object(map) => map,
        other => panic!("expected an object, got {other}"),
    }
}

/// One consistent sales row: every financial invariant holds.
pub fn sales_row(day: NaiveDate, normal: i64, promo: i64) -> Record {
    let total = normal + 2 * promo;
    let (price, cost) = (5.0, 3.0);
    let revenue = (normal + promo) as f64 * price;
    let total_cost = total as f64 * cost;
    record(json!({
        "fecha": day.format("%Y-%m-%d").to_string(),
        "total_unidades_entregadas": total,
        "unidades_precio_normal": normal,
        "unidades_promo_pagadas": promo,
        "unidades_promo_bonificadas": promo,
        "precio_unitario_full": price,
        "costo_unitario": cost,
        "ingresos_totales": revenue,
        "costo_total": total_cost,
        "utilidad": revenue - total_cost,
    }))
}

pub fn sales_rows(start: NaiveDate, count: usize) -> Vec<Record> {
    days(start, count)
        .enumerate()
        .map(|(i, day)| sales_row(day, 10 + (i % 7) as i64, (i % 3) as i64))
        .collect()
}

pub fn macro_rows(months: &[NaiveDate]) -> Vec<Record> {
    months
        .iter()
        .enumerate()
        .map(|(i, month)| {
            record(json!({
                "fecha": month.format("%Y-%m-%d").to_string(),
                "ipc": 100.0 + i as f64,
                "confianza_consumidor": if i == 0 { -1 } else { 40 + i as i64 },
            }))
        })
        .collect()
}

pub fn promo_rows(start: NaiveDate, count: usize) -> Vec<Record> {
    days(start, count)
        .map(|day| {
            let flag = if [4, 5].contains(&day.month()) { 1 } else { 0 };
            record(json!({ "fecha": day.format("%Y-%m-%d").to_string(), "es_promo": flag }))
        })
        .collect()
}

pub fn social_rows(start: NaiveDate, count: usize) -> Vec<Record> {
    days(start, count)
        .map(|day| {
            record(json!({
                "fecha": day.format("%Y-%m-%d").to_string(),
                "ciclo": "Sin Campaña",
                "inversion_facebook": 10.0,
                "inversion_instagram": 5.0,
                "inversion_marketing_total": 15.0,
            }))
        })
        .collect()
}

/// Remote fixture with all four business tables covering January to
/// March 2023.
pub fn business_client() -> MemoryTableClient {
    let start = date(2023, 1, 1);
    MemoryTableClient::new()
        .with_table(SALES, sales_rows(start, 90))
        .with_table(
            MACRO,
            macro_rows(&[date(2023, 1, 1), date(2023, 2, 1), date(2023, 3, 1)]),
        )
        .with_table(PROMO, promo_rows(start, 90))
        .with_table(SOCIAL, social_rows(start, 90))
}
