pub mod aggregate;
pub mod clean;
pub mod cli;
pub mod config;
pub mod contract;
pub mod data;
pub mod financial;
pub mod frame;
pub mod frequency;
pub mod impute;
pub mod io_utils;
pub mod pipeline;
pub mod profile;
pub mod reindex;
pub mod remote;
pub mod render;
pub mod report;
pub mod snapshot;
pub mod stats;
pub mod sync;
pub mod unify;

use std::{env, sync::OnceLock};

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    cli::{Cli, Commands, DiscoverArgs, PreprocessArgs},
    config::Config,
    pipeline::PreprocessOptions,
    remote::{RestTableClient, TableSource},
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("series_consolidate", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = Config::load(&cli.config)
        .with_context(|| format!("Loading configuration from {:?}", cli.config))?;
    debug!(
        "Loaded configuration for {} table(s)",
        config.data.source_tables.len()
    );
    match cli.command {
        Commands::Discover(args) => handle_discover(&config, &args),
        Commands::Preprocess(args) => handle_preprocess(&config, &args),
        Commands::Run(args) => {
            handle_discover(&config, &args.discover)?;
            handle_preprocess(&config, &args.preprocess)
        }
        Commands::Check => handle_check(&config),
    }
}

fn handle_discover(config: &Config, args: &DiscoverArgs) -> Result<()> {
    let client = if args.offline {
        info!("Offline discovery: analyzing local snapshots only");
        None
    } else {
        Some(RestTableClient::from_config(&config.remote).context("Creating remote client")?)
    };
    let source = client.as_ref().map(|c| c as &dyn TableSource);
    let report = pipeline::discover(config, source, args.full_refresh)?;
    if !report.sync.is_empty() {
        let (headers, rows) = render::sync_rows(&report.sync);
        render::print_table(&headers, &rows);
        println!();
    }
    let (headers, rows) = render::discovery_rows(&report);
    render::print_table(&headers, &rows);
    Ok(())
}

fn handle_preprocess(config: &Config, args: &PreprocessArgs) -> Result<()> {
    let mut options = PreprocessOptions {
        delimiter: args.output_delimiter,
        ..PreprocessOptions::default()
    };
    if let Some(as_of) = args.as_of {
        options.today = as_of;
    }
    let report = pipeline::preprocess(config, &options)?;
    let (headers, rows) = render::preprocess_rows(&report);
    render::print_table(&headers, &rows);
    println!(
        "\nMaster series: {} ({} x {}), status {:?}",
        report.artifact.path.display(),
        report.artifact.rows,
        report.artifact.columns,
        report.validation_status
    );
    Ok(())
}

fn handle_check(config: &Config) -> Result<()> {
    info!(
        "Configuration is valid; primary table '{}'",
        config.primary_table()
    );
    let (headers, rows) = render::policy_rows(config);
    render::print_table(&headers, &rows);
    Ok(())
}
