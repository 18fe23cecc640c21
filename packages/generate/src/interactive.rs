//! Interactive menu for the generate tool.
//!
//! Provides a terminal-based UI using `dialoguer` that lets users select
//! which outputs to generate without memorizing CLI flags.

use dialoguer::{Confirm, Select};
use hitchmap_cli_utils::{IndicatifProgress, MultiProgress};
use hitchmap_database::db;

use crate::config::PipelineConfig;
use crate::{ALL_OUTPUTS, FEED_OUTPUTS, MARKER_OUTPUTS, current_fingerprint, run_with_cache};

/// Runs the interactive generation menu.
///
/// Opens the configured database, presents a selection menu for output
/// types, asks whether to force regeneration, and executes the chosen
/// pipeline.
///
/// # Errors
///
/// Returns an error if the database cannot be opened, user input fails, or
/// the generation pipeline fails.
pub async fn run(
    multi: &MultiProgress,
    mut config: PipelineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::open_db(&config.database).await?;

    let choices = &[
        "Generate all outputs",
        "Generate JSON feeds",
        "Generate marker files",
        "Show input fingerprint",
    ];

    let selection = Select::new()
        .with_prompt("What would you like to generate?")
        .items(choices)
        .default(0)
        .interact()?;

    let requested_outputs: &[&str] = match selection {
        1 => FEED_OUTPUTS,
        2 => MARKER_OUTPUTS,
        3 => {
            println!("{}", current_fingerprint(db.as_ref(), &config).await?);
            return Ok(());
        }
        _ => ALL_OUTPUTS,
    };

    if !config.force {
        config.force = Confirm::new()
            .with_prompt("Force regeneration?")
            .default(false)
            .interact()?;
    }

    let progress =
        IndicatifProgress::stages_bar(multi, "Generating", requested_outputs.len() as u64);
    run_with_cache(db.as_ref(), &config, requested_outputs, Some(progress)).await?;

    Ok(())
}
