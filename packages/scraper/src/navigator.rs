//! Score-sheet page snapshot.
//!
//! Fetches the per-organization page and reads the facts the rest of the
//! run needs from its markup: the school name and the season dropdown.
//! Everything here degrades to a default with a warning; only an
//! unreachable page is an error.

use std::sync::LazyLock;

use archery_scores_models::{SchoolInfo, SeasonInfo, SeasonOption, SiteConfig};
use scraper::{ElementRef, Html, Selector};

use crate::ScrapeError;
use crate::form::option_value;
use crate::html_table::clean_html;
use crate::postback::client_id_to_field_name;
use crate::session::SessionClient;

static SELECT_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("select").unwrap_or_else(|_| unreachable!()));
static OPTION_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("option").unwrap_or_else(|_| unreachable!()));

/// The season `<select>` control and its options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonDropdown {
    /// Client-side `id` (or `name` when the control has no id).
    pub field_id: String,
    /// Name the control posts under.
    pub field_name: String,
    /// Options in document order.
    pub options: Vec<SeasonOption>,
}

impl SeasonDropdown {
    /// Label of the selected option, else the first option's label.
    #[must_use]
    pub fn default_label(&self) -> &str {
        self.options
            .iter()
            .find(|o| o.selected)
            .or_else(|| self.options.first())
            .map_or("", |o| o.label.as_str())
    }

    /// Every option label, deduplicated and sorted ascending.
    #[must_use]
    pub fn available_seasons(&self) -> Vec<String> {
        let mut labels: Vec<String> = self.options.iter().map(|o| o.label.clone()).collect();
        labels.sort();
        labels.dedup();
        labels
    }

    /// Option whose label equals `requested`, else the first whose label
    /// contains it.
    #[must_use]
    pub fn find_option(&self, requested: &str) -> Option<&SeasonOption> {
        let requested = requested.trim();
        if requested.is_empty() {
            return None;
        }
        self.options
            .iter()
            .find(|o| o.label == requested)
            .or_else(|| self.options.iter().find(|o| o.label.contains(requested)))
    }
}

/// A fetched score-sheet page and the facts read from it.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    /// URL the page was fetched from; postbacks go back here.
    pub url: String,
    /// Raw markup.
    pub html: String,
    /// Organization identifier from the query string.
    pub oid: u64,
    /// School name facts.
    pub school: SchoolInfo,
    /// Season dropdown, when the page has one.
    pub season_dropdown: Option<SeasonDropdown>,
}

impl PageSnapshot {
    /// Reads school and season facts from `html`.
    #[must_use]
    pub fn parse(url: &str, html: String, config: &SiteConfig, oid: u64) -> Self {
        let document = Html::parse_document(&html);

        let school_label = school_label(&document, &config.controls.school_name_selector);
        if school_label.is_none() {
            log::warn!(
                "School name element {} not found on {url}",
                config.controls.school_name_selector
            );
        }
        let school = SchoolInfo::from_label(school_label.as_deref(), oid);

        let season_dropdown =
            find_season_dropdown(&document, &config.controls.season_select_patterns);
        if season_dropdown.is_none() {
            log::warn!(
                "No season dropdown matching {:?} on {url}",
                config.controls.season_select_patterns
            );
        }

        Self {
            url: url.to_owned(),
            html,
            oid,
            school,
            season_dropdown,
        }
    }

    /// Season selection for this page given an optional requested label.
    ///
    /// `None` when the page has no season dropdown.
    #[must_use]
    pub fn season_info(&self, requested: Option<&str>) -> Option<SeasonInfo> {
        self.season_dropdown.as_ref().map(|dropdown| {
            SeasonInfo::resolve(
                &dropdown.field_id,
                &dropdown.field_name,
                dropdown.default_label(),
                requested,
            )
        })
    }

    /// Every selectable season, deduplicated and sorted ascending.
    #[must_use]
    pub fn available_seasons(&self) -> Vec<String> {
        self.season_dropdown
            .as_ref()
            .map(SeasonDropdown::available_seasons)
            .unwrap_or_default()
    }
}

/// Fetches the score-sheet page for organization `oid`.
///
/// # Errors
///
/// Returns [`ScrapeError::Navigation`] if the page cannot be fetched.
pub async fn open(
    session: &SessionClient,
    config: &SiteConfig,
    oid: u64,
) -> Result<PageSnapshot, ScrapeError> {
    let url = config.score_sheet_url(oid);
    log::info!("Opening score sheet for organization {oid}");

    let page = session
        .get(&url)
        .await
        .map_err(ScrapeError::into_navigation)?;

    let snapshot = PageSnapshot::parse(&page.url, page.body, config, oid);
    log::info!(
        "School: {} ({} seasons available)",
        snapshot.school.display_name,
        snapshot.available_seasons().len()
    );
    Ok(snapshot)
}

fn school_label(document: &Html, selector: &str) -> Option<String> {
    let selector = match Selector::parse(selector) {
        Ok(s) => s,
        Err(e) => {
            log::warn!("Invalid school name selector '{selector}': {e}");
            return None;
        }
    };
    document
        .select(&selector)
        .next()
        .map(|el| clean_html(&el.inner_html()))
        .filter(|text| !text.is_empty())
}

/// First `<select>` whose identifier contains a pattern, trying patterns in
/// order.
fn find_season_dropdown(document: &Html, patterns: &[String]) -> Option<SeasonDropdown> {
    let selects: Vec<ElementRef<'_>> = document.select(&SELECT_SELECTOR).collect();

    patterns.iter().find_map(|pattern| {
        let pattern = pattern.to_ascii_lowercase();
        selects
            .iter()
            .copied()
            .find(|select| {
                identifier(*select).is_some_and(|id| id.to_ascii_lowercase().contains(&pattern))
            })
            .and_then(season_dropdown)
    })
}

fn identifier<'a>(select: ElementRef<'a>) -> Option<&'a str> {
    let element = select.value();
    element
        .attr("id")
        .filter(|id| !id.is_empty())
        .or_else(|| element.attr("name"))
}

fn season_dropdown(select: ElementRef<'_>) -> Option<SeasonDropdown> {
    let field_id = identifier(select)?.to_owned();
    let field_name = select
        .attr("name")
        .filter(|n| !n.is_empty())
        .map_or_else(|| client_id_to_field_name(&field_id), str::to_owned);

    let options: Vec<SeasonOption> = select
        .select(&OPTION_SELECTOR)
        .map(|option| SeasonOption {
            value: option_value(option),
            label: clean_html(&option.inner_html()),
            selected: option.attr("selected").is_some(),
        })
        .collect();

    if options.is_empty() {
        log::warn!("Season dropdown {field_id} has no options");
        return None;
    }

    Some(SeasonDropdown {
        field_id,
        field_name,
        options,
    })
}
