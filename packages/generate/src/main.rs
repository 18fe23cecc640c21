#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI tool for generating the hitchhiking map's JSON feeds and markers
//! from the points database.
//!
//! Run without a subcommand for an interactive menu.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hitchmap_cli_utils::IndicatifProgress;
use hitchmap_database::db;
use hitchmap_generate::config::{ConfigOverrides, PipelineConfig};
use hitchmap_generate::{ALL_OUTPUTS, FEED_OUTPUTS, MARKER_OUTPUTS, interactive, run_with_cache};

#[derive(Parser)]
#[command(name = "hitchmap_generate", about = "Map data generation tool")]
struct Cli {
    #[command(flatten)]
    args: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args)]
struct GlobalArgs {
    /// TOML config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// `SQLite` database to read (overrides `HITCHMAP_DATABASE`)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    /// Directory the outputs are written to
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// Base URL for share links
    #[arg(long, global = true)]
    site_url: Option<String>,

    /// Number of reviews in the recent feed
    #[arg(long, global = true)]
    recent_limit: Option<usize>,

    /// Regenerate outputs even if the inputs are unchanged
    #[arg(long, global = true)]
    force: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate every feed and marker file
    All,
    /// Generate the JSON feeds
    Feeds,
    /// Generate the marker files
    Markers,
    /// Print the input fingerprint without writing anything
    Fingerprint,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = hitchmap_cli_utils::init_logger();
    let cli = Cli::parse();

    let overrides = ConfigOverrides {
        database: cli.args.database,
        output_dir: cli.args.output_dir,
        site_url: cli.args.site_url,
        recent_limit: cli.args.recent_limit,
        force: cli.args.force,
    };
    let config = PipelineConfig::load(cli.args.config.as_deref(), &overrides)?;

    let Some(command) = cli.command else {
        return interactive::run(&multi, config).await;
    };

    log::info!("Reading {}", config.database.display());
    let db = db::open_db(&config.database).await?;

    let requested: &[&str] = match command {
        Commands::All => ALL_OUTPUTS,
        Commands::Feeds => FEED_OUTPUTS,
        Commands::Markers => MARKER_OUTPUTS,
        Commands::Fingerprint => {
            let fingerprint = hitchmap_generate::current_fingerprint(db.as_ref(), &config).await?;
            println!("{fingerprint}");
            return Ok(());
        }
    };

    let progress = IndicatifProgress::stages_bar(&multi, "Generating", requested.len() as u64);
    let summary = run_with_cache(db.as_ref(), &config, requested, Some(progress)).await?;

    log::info!(
        "Done: {} written, {} up to date ({})",
        summary.written.len(),
        summary.skipped.len(),
        config.output_dir.display()
    );

    Ok(())
}
