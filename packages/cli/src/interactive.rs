#![allow(clippy::module_name_repetitions)]

//! Menu-driven mode for running retrievals without memorizing flags.

use std::io::IsTerminal as _;
use std::path::PathBuf;

use archery_scores_cli_utils::{IndicatifProgress, MultiProgress};
use archery_scores_models::{Credentials, SiteConfig};
use dialoguer::{Confirm, Input, Password, Select};

use crate::pipeline::{self, FetchOptions};

/// Environment variable holding the login name.
pub const USERNAME_ENV: &str = "ARCHERY_USERNAME";

/// Environment variable holding the password.
pub const PASSWORD_ENV: &str = "ARCHERY_PASSWORD";

enum Action {
    FetchSeason,
    FetchAllSeasons,
    ListSeasons,
}

impl Action {
    const ALL: &[Self] = &[Self::FetchSeason, Self::FetchAllSeasons, Self::ListSeasons];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::FetchSeason => "Fetch a season score sheet",
            Self::FetchAllSeasons => "Fetch every season",
            Self::ListSeasons => "List available seasons",
        }
    }
}

/// Resolves credentials from `username`, the environment, then prompts.
///
/// Returns `None` when either half is still missing, i.e. the user declined
/// to supply it or no terminal is attached. Login then fails with an
/// authentication error.
///
/// # Errors
///
/// Returns an error if a prompt cannot be shown.
pub fn credentials(username: Option<String>) -> Result<Option<Credentials>, dialoguer::Error> {
    let interactive = std::io::stdin().is_terminal();

    let username = match username.or_else(|| std::env::var(USERNAME_ENV).ok()) {
        Some(u) => u,
        None if interactive => Input::<String>::new()
            .with_prompt("Username")
            .allow_empty(true)
            .interact_text()?,
        None => String::new(),
    };

    let password = match std::env::var(PASSWORD_ENV).ok() {
        Some(p) => p,
        None if interactive && !username.trim().is_empty() => Password::new()
            .with_prompt(format!("Password for {username}"))
            .allow_empty_password(true)
            .interact()?,
        None => String::new(),
    };

    let credentials = Credentials::new(username, password);
    Ok(credentials.is_complete().then_some(credentials))
}

/// Runs the interactive menu.
///
/// # Errors
///
/// Returns an error if a prompt fails or the selected retrieval fails.
pub async fn run(
    config: &SiteConfig,
    username: Option<String>,
    multi: &MultiProgress,
) -> Result<(), Box<dyn std::error::Error>> {
    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    let idx = Select::new()
        .with_prompt("What would you like to do?")
        .items(&labels)
        .default(0)
        .interact()?;

    let oid: u64 = Input::new()
        .with_prompt("Organization id (oid)")
        .interact_text()?;
    let credentials = credentials(username)?;

    match Action::ALL[idx] {
        Action::ListSeasons => {
            let (school, seasons) = pipeline::list_seasons(config, credentials.as_ref(), oid).await?;
            println!("{}:", school.display_name);
            for season in seasons {
                println!("  {season}");
            }
        }
        Action::FetchSeason => {
            let (_, seasons) = pipeline::list_seasons(config, credentials.as_ref(), oid).await?;
            let season = select_season(&seasons)?;
            let options = fetch_options(oid)?;

            let progress = IndicatifProgress::spinner(multi, "Starting");
            let result = pipeline::run_season(
                config,
                credentials.as_ref(),
                &options,
                season.as_deref(),
                progress.as_ref(),
            )
            .await;
            progress.finish(if result.is_ok() { "Done" } else { "Failed" }.to_owned());
            pipeline::print_outcome(&result?);
        }
        Action::FetchAllSeasons => {
            let options = fetch_options(oid)?;
            let report =
                pipeline::run_all_seasons(config, credentials.as_ref(), &options, multi).await?;
            for outcome in &report.succeeded {
                pipeline::print_outcome(outcome);
            }
            for (season, e) in &report.failed {
                println!("{season}: {e}");
            }
        }
    }

    Ok(())
}

/// `None` selects the page default.
fn select_season(seasons: &[String]) -> Result<Option<String>, dialoguer::Error> {
    if seasons.is_empty() {
        println!("No season dropdown found; the page default will be used.");
        return Ok(None);
    }

    let mut items = vec!["(page default)".to_owned()];
    items.extend(seasons.iter().cloned());

    let idx = Select::new()
        .with_prompt("Season")
        .items(&items)
        .default(0)
        .max_length(20)
        .interact()?;

    Ok(idx.checked_sub(1).map(|i| seasons[i].clone()))
}

fn fetch_options(oid: u64) -> Result<FetchOptions, dialoguer::Error> {
    let output: String = Input::new()
        .with_prompt("Output directory")
        .default(".".to_owned())
        .interact_text()?;
    let enrich = Confirm::new()
        .with_prompt("Add derived score columns?")
        .default(true)
        .interact()?;
    let summary = enrich
        && Confirm::new()
            .with_prompt("Write tournament summary?")
            .default(true)
            .interact()?;

    Ok(FetchOptions {
        oid,
        output_dir: PathBuf::from(output),
        enrich,
        summary,
    })
}
