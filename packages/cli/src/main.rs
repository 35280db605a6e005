#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for archery season score-sheet retrieval.
//!
//! Logs into the tournament site, exports a school's season score sheet
//! and writes it as CSV with derived arrow/end/half columns. Without a
//! subcommand an interactive menu is shown.

mod interactive;
mod output;
mod pipeline;

use std::path::{Path, PathBuf};

use archery_scores_cli_utils::IndicatifProgress;
use archery_scores_models::{ConfigError, SiteConfig};
use clap::{Parser, Subcommand};

use crate::pipeline::FetchOptions;

/// Environment variable overriding the site base URL.
const BASE_URL_ENV: &str = "ARCHERY_BASE_URL";

#[derive(Parser)]
#[command(name = "archery_scores", about = "Archery season score-sheet retrieval")]
struct Cli {
    /// Site configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Site base URL (overrides the config file and `ARCHERY_BASE_URL`)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Login name (overrides `ARCHERY_USERNAME`); the password is read from
    /// `ARCHERY_PASSWORD` or prompted for
    #[arg(long, global = true)]
    username: Option<String>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Retrieve a season score sheet and write it as CSV
    Fetch {
        /// Organization identifier
        #[arg(long)]
        oid: u64,
        /// Season label, e.g. "2023-2024" (defaults to the page's season)
        #[arg(long)]
        season: Option<String>,
        /// Retrieve every listed season, one session each
        #[arg(long, conflicts_with = "season")]
        all_seasons: bool,
        /// Base directory for the "Season Score Sheets" tree
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// Write the records as retrieved, without derived columns
        #[arg(long)]
        no_enrich: bool,
        /// Skip the per-tournament summary file
        #[arg(long)]
        no_summary: bool,
    },
    /// List the seasons available for an organization
    ListSeasons {
        /// Organization identifier
        #[arg(long)]
        oid: u64,
    },
}

/// Config file (or defaults), then environment, then flags.
fn load_config(path: Option<&Path>, base_url: Option<String>) -> Result<SiteConfig, ConfigError> {
    let mut config = match path {
        Some(path) => SiteConfig::load(path)?,
        None => SiteConfig::default(),
    };
    if let Some(url) = base_url.or_else(|| std::env::var(BASE_URL_ENV).ok()) {
        config.base_url = url;
    }
    log::debug!("Using site {}", config.base_url);
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = archery_scores_cli_utils::init_logger();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.base_url)?;

    let Some(command) = cli.command else {
        return interactive::run(&config, cli.username, &multi).await;
    };

    let credentials = interactive::credentials(cli.username)?;

    match command {
        Commands::Fetch {
            oid,
            season,
            all_seasons,
            output,
            no_enrich,
            no_summary,
        } => {
            let options = FetchOptions {
                oid,
                output_dir: output,
                enrich: !no_enrich,
                summary: !no_enrich && !no_summary,
            };

            if all_seasons {
                let report =
                    pipeline::run_all_seasons(&config, credentials.as_ref(), &options, &multi)
                        .await?;
                for outcome in &report.succeeded {
                    pipeline::print_outcome(outcome);
                }
                for (season, e) in &report.failed {
                    eprintln!("{season}: {e}");
                }
                if report.all_failed() {
                    return Err(format!("all {} seasons failed", report.failed.len()).into());
                }
            } else {
                let progress = IndicatifProgress::spinner(&multi, "Starting");
                let result = pipeline::run_season(
                    &config,
                    credentials.as_ref(),
                    &options,
                    season.as_deref(),
                    progress.as_ref(),
                )
                .await;
                progress.finish(if result.is_ok() { "Done" } else { "Failed" }.to_owned());
                pipeline::print_outcome(&result?);
            }
        }
        Commands::ListSeasons { oid } => {
            let (school, seasons) =
                pipeline::list_seasons(&config, credentials.as_ref(), oid).await?;
            println!("{}", school.display_name);
            println!("{}", "-".repeat(school.display_name.len().max(20)));
            for season in seasons {
                println!("{season}");
            }
        }
    }

    Ok(())
}
