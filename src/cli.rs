use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};

use crate::data::parse_naive_date;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Sync business tables, certify their quality, and consolidate them into a monthly master series",
    long_about = None
)]
pub struct Cli {
    /// Pipeline configuration file (YAML)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    pub config: PathBuf,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Synchronize every source table and write the data-quality report
    Discover(DiscoverArgs),
    /// Consolidate local snapshots into the monthly master series
    Preprocess(PreprocessArgs),
    /// Run discovery followed by preprocessing
    Run(RunArgs),
    /// Validate the configuration and print the resolved per-table policies
    Check,
}

#[derive(Debug, Args)]
pub struct DiscoverArgs {
    /// Re-download every table, ignoring local snapshots
    #[arg(long)]
    pub full_refresh: bool,
    /// Analyze existing snapshots without contacting the remote source
    #[arg(long, conflicts_with = "full_refresh")]
    pub offline: bool,
}

#[derive(Debug, Args)]
pub struct PreprocessArgs {
    /// Delimiter of the master-series file (supports ',', 'tab', ';', '|')
    #[arg(long = "output-delimiter", value_parser = parse_delimiter)]
    pub output_delimiter: Option<u8>,
    /// Reference date for dropping the current incomplete month (YYYY-MM-DD)
    #[arg(long = "as-of", value_parser = parse_as_of)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub discover: DiscoverArgs,
    #[command(flatten)]
    pub preprocess: PreprocessArgs,
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" | "\\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}

fn parse_as_of(value: &str) -> Result<NaiveDate, String> {
    parse_naive_date(value).map_err(|err| err.to_string())
}
