//! One retrieval run per season.
//!
//! Chains login -> score-sheet page -> season postback -> export ->
//! enrichment -> CSV output over a fresh [`SessionClient`]. Batch runs
//! repeat this per season; sessions are never shared between seasons since
//! the server ties view-state to the page sequence a session visited.

use std::path::PathBuf;
use std::time::Instant;

use archery_scores_analytics::AnalysisError;
use archery_scores_analytics::summary::{TournamentSummary, summarize};
use archery_scores_cli_utils::{IndicatifProgress, MultiProgress};
use archery_scores_models::{Credentials, SchoolInfo, SiteConfig, Step};
use archery_scores_scraper::progress::ProgressCallback;
use archery_scores_scraper::session::SessionClient;
use archery_scores_scraper::{ScrapeError, auth, export, navigator, postback};

use crate::output::{CURRENT_SEASON, OutputError, OutputPaths, write_records};

/// A run-terminating error, tagged with the step that raised it.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("{step} step failed: {source}")]
    Scrape {
        step: Step,
        #[source]
        source: ScrapeError,
    },

    #[error("analysis step failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("output step failed: {0}")]
    Output(#[from] OutputError),
}

impl PipelineError {
    /// Wraps a scrape error raised while running `current`.
    ///
    /// Errors that belong to a specific step keep it; transport errors take
    /// the step that was running.
    #[must_use]
    pub fn scrape(current: Step, source: ScrapeError) -> Self {
        Self::Scrape {
            step: source.step().unwrap_or(current),
            source,
        }
    }

    #[must_use]
    pub const fn step(&self) -> Step {
        match self {
            Self::Scrape { step, .. } => *step,
            Self::Analysis(_) => Step::Analysis,
            Self::Output(_) => Step::Output,
        }
    }
}

/// What to retrieve and how to write it.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Organization identifier (`?oid=`).
    pub oid: u64,
    pub output_dir: PathBuf,
    /// Append the derived score columns.
    pub enrich: bool,
    /// Also write the per-tournament summary (requires `enrich`).
    pub summary: bool,
}

/// Result of one successful season run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub school: SchoolInfo,
    pub season: String,
    pub records: usize,
    pub sheet: PathBuf,
    pub summary: Option<PathBuf>,
}

/// Per-season results of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<RunOutcome>,
    pub failed: Vec<(String, PipelineError)>,
}

impl BatchReport {
    /// Whether every attempted season failed.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.succeeded.is_empty() && !self.failed.is_empty()
    }
}

/// Logs in and opens the score-sheet page on a fresh session.
async fn open_page(
    config: &SiteConfig,
    credentials: Option<&Credentials>,
    oid: u64,
    progress: &dyn ProgressCallback,
) -> Result<(SessionClient, navigator::PageSnapshot), PipelineError> {
    let session =
        SessionClient::new(config).map_err(|e| PipelineError::scrape(Step::Login, e))?;

    progress.set_message("Logging in".to_owned());
    auth::login(&session, config, credentials)
        .await
        .map_err(|e| PipelineError::scrape(Step::Login, e))?;

    progress.set_message(format!("Opening score sheet for organization {oid}"));
    let page = navigator::open(&session, config, oid)
        .await
        .map_err(|e| PipelineError::scrape(Step::Navigation, e))?;

    Ok((session, page))
}

/// Lists the seasons selectable for `oid`.
///
/// # Errors
///
/// Returns [`PipelineError`] if login or navigation fails.
pub async fn list_seasons(
    config: &SiteConfig,
    credentials: Option<&Credentials>,
    oid: u64,
) -> Result<(SchoolInfo, Vec<String>), PipelineError> {
    let progress = archery_scores_scraper::progress::null_progress();
    let (_, page) = open_page(config, credentials, oid, progress.as_ref()).await?;
    let seasons = page.available_seasons();
    Ok((page.school, seasons))
}

/// Retrieves one season (the page default when `season` is `None`) and
/// writes it out.
///
/// # Errors
///
/// Returns [`PipelineError`] naming the step that failed.
pub async fn run_season(
    config: &SiteConfig,
    credentials: Option<&Credentials>,
    options: &FetchOptions,
    season: Option<&str>,
    progress: &dyn ProgressCallback,
) -> Result<RunOutcome, PipelineError> {
    let start = Instant::now();
    let (session, page) = open_page(config, credentials, options.oid, progress).await?;

    let (page, season_info, selected_value) = match page.season_info(season) {
        Some(info) => {
            progress.set_message(format!("Selecting season {}", info.selected_season_label));
            let outcome = postback::apply(&session, config, page, info)
                .await
                .map_err(|e| PipelineError::scrape(Step::Postback, e))?;
            (outcome.page, Some(outcome.season), outcome.selected_value)
        }
        None => {
            if let Some(requested) = season {
                log::warn!("Page has no season dropdown; ignoring requested season '{requested}'");
            }
            (page, None, None)
        }
    };

    progress.set_message("Exporting".to_owned());
    let result = export::export(
        &session,
        config,
        &page,
        season_info.as_ref(),
        selected_value.as_deref(),
    )
    .await
    .map_err(|e| PipelineError::scrape(Step::Export, e))?;

    let records = result
        .into_records()
        .map_err(|e| PipelineError::scrape(Step::Extraction, e))?;

    let season_label = season_info
        .as_ref()
        .map_or(CURRENT_SEASON, |s| s.selected_season_label.as_str())
        .to_owned();
    let paths = OutputPaths::new(&options.output_dir, &page.school, &season_label);

    let (records, summary) = if options.enrich {
        progress.set_message("Analysing".to_owned());
        let enriched = archery_scores_analytics::enrich(&records)?;
        let summary = options.summary.then(|| summarize(&enriched, &config.summary));
        (enriched, summary)
    } else {
        (records, None)
    };

    progress.set_message("Writing output".to_owned());
    write_records(&paths.sheet, &records)?;

    let summary_path = match summary {
        Some(tournaments) if !tournaments.is_empty() => {
            for t in &tournaments {
                log::info!(
                    "{}: {} archers, team score {} ({} counting), best {}, perfect ends {}",
                    t.tournament,
                    t.archers,
                    t.team_score,
                    t.team_archers,
                    t.best_total,
                    t.perfect_ends
                );
            }
            let rows: Vec<_> = tournaments.iter().map(TournamentSummary::to_record).collect();
            write_records(&paths.summary, &rows)?;
            Some(paths.summary)
        }
        _ => None,
    };

    log::info!(
        "{} {}: {} records in {:.1}s",
        page.school.display_name,
        season_label,
        records.len(),
        start.elapsed().as_secs_f64()
    );

    Ok(RunOutcome {
        school: page.school,
        season: season_label,
        records: records.len(),
        sheet: paths.sheet,
        summary: summary_path,
    })
}

/// Retrieves every season listed for the organization, one isolated
/// session each. A failed season is logged and the batch moves on.
///
/// # Errors
///
/// Returns [`PipelineError`] only if the season list itself cannot be
/// read.
pub async fn run_all_seasons(
    config: &SiteConfig,
    credentials: Option<&Credentials>,
    options: &FetchOptions,
    multi: &MultiProgress,
) -> Result<BatchReport, PipelineError> {
    let bar = IndicatifProgress::spinner(multi, "Reading season list");
    let (school, seasons) = match list_seasons(config, credentials, options.oid).await {
        Ok(listed) => listed,
        Err(e) => {
            bar.finish("Failed".to_owned());
            return Err(e);
        }
    };
    let mut report = BatchReport::default();

    if seasons.is_empty() {
        log::warn!("{} lists no seasons; fetching the page default", school.display_name);
        record(
            &mut report,
            CURRENT_SEASON,
            run_season(config, credentials, options, None, bar.as_ref()).await,
        );
        bar.finish("Done".to_owned());
        return Ok(report);
    }

    log::info!("Fetching {} seasons for {}", seasons.len(), school.display_name);
    bar.set_total(seasons.len() as u64);

    for season in &seasons {
        bar.set_message(season.clone());
        let result = run_season(config, credentials, options, Some(season), bar.as_ref()).await;
        record(&mut report, season, result);
        bar.inc(1);
    }

    bar.finish(format!(
        "{} of {} seasons retrieved",
        report.succeeded.len(),
        seasons.len()
    ));
    Ok(report)
}

fn record(report: &mut BatchReport, season: &str, result: Result<RunOutcome, PipelineError>) {
    match result {
        Ok(outcome) => report.succeeded.push(outcome),
        Err(e) => {
            log::error!("Season {season} failed: {e}");
            report.failed.push((season.to_owned(), e));
        }
    }
}

/// Prints where a run's files went.
pub fn print_outcome(outcome: &RunOutcome) {
    println!(
        "{} / {}: {} records -> {}",
        outcome.school.display_name,
        outcome.season,
        outcome.records,
        outcome.sheet.display()
    );
    if let Some(summary) = &outcome.summary {
        println!("  tournament summary -> {}", summary.display());
    }
}
