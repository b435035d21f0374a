//! Plain-text tables for terminal summaries.

use std::fmt::Write as _;

use crate::{
    config::Config,
    impute::policy_for,
    report::{DiscoveryReport, PreprocessReport},
    sync::SyncRecord,
};

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths = headers.iter().map(|h| display_width(h)).collect::<Vec<_>>();
    for row in rows {
        for (idx, cell) in row.iter().enumerate().take(widths.len()) {
            widths[idx] = widths[idx].max(display_width(cell));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths));
    let separator = widths
        .iter()
        .map(|w| "-".repeat((*w).max(3)))
        .collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize]) -> String {
    let mut line = values
        .iter()
        .zip(widths)
        .map(|(value, width)| {
            let cell = sanitize_cell(value);
            let padding = width.saturating_sub(display_width(&cell));
            format!("{cell}{}", " ".repeat(padding))
        })
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn display_width(value: &str) -> usize {
    value.chars().filter(|c| !c.is_control()).count()
}

fn sanitize_cell(value: &str) -> String {
    value
        .chars()
        .map(|c| if matches!(c, '\n' | '\r' | '\t') { ' ' } else { c })
        .collect()
}

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|h| h.to_string()).collect()
}

pub fn sync_rows(records: &[SyncRecord]) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = records
        .iter()
        .map(|record| {
            vec![
                record.table.clone(),
                record.kind.as_str().to_string(),
                record.new_rows.to_string(),
                record.total_rows.to_string(),
                record.watermark.clone().unwrap_or_else(|| "-".into()),
                record.error.clone().unwrap_or_default(),
            ]
        })
        .collect();
    (
        headers(&["table", "sync", "new_rows", "total_rows", "watermark", "error"]),
        rows,
    )
}

pub fn discovery_rows(report: &DiscoveryReport) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = report
        .analysis
        .iter()
        .map(|(table, analysis)| {
            vec![
                table.clone(),
                analysis.profile.rows.to_string(),
                analysis.profile.duplicate_rows.to_string(),
                analysis.profile.sentinel_values.len().to_string(),
                analysis.contract.status.as_str().to_string(),
                analysis.financial.status.as_str().to_string(),
            ]
        })
        .collect();
    (
        headers(&["table", "rows", "duplicates", "sentinels", "contract", "financial"]),
        rows,
    )
}

pub fn preprocess_rows(report: &PreprocessReport) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = report
        .cleaning
        .iter()
        .map(|(table, stats)| {
            vec![
                table.clone(),
                stats.rows_filtered.to_string(),
                stats.duplicates_removed.to_string(),
                stats.sentinels_replaced.to_string(),
                stats.rows_reindexed.to_string(),
                stats.cells_imputed.to_string(),
            ]
        })
        .collect();
    (
        headers(&["table", "filtered", "duplicates", "sentinels", "reindexed", "imputed"]),
        rows,
    )
}

/// One row per table with its role, frequency and resolved fill policy.
pub fn policy_rows(config: &Config) -> (Vec<String>, Vec<Vec<String>>) {
    let rows = config
        .data
        .source_tables
        .iter()
        .map(|table| {
            let policy = policy_for(config, table)
                .iter()
                .map(|step| step.describe())
                .collect::<Vec<_>>()
                .join(" -> ");
            vec![
                table.clone(),
                config.role_of(table).as_str().to_string(),
                config.frequency_of(table).as_str().to_string(),
                if policy.is_empty() { "-".into() } else { policy },
            ]
        })
        .collect();
    (headers(&["table", "role", "frequency", "imputation"]), rows)
}
