//! Export trigger and response classification.
//!
//! Clicking the export button is one more postback. Depending on the
//! deployment the server answers with a CSV attachment or with the report
//! rendered as an HTML grid; both are turned into [`TabularRecord`]s here.

use std::sync::LazyLock;

use archery_scores_models::{SeasonInfo, SiteConfig, TabularRecord};
use regex::Regex;

use crate::ScrapeError;
use crate::form::{FormFields, extract_fields};
use crate::html_table::{self, column_names};
use crate::navigator::PageSnapshot;
use crate::session::SessionClient;

const BOM: char = '\u{feff}';

static CSV_CONTENT_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:text/csv|application/csv|text/comma-separated-values|application/octet-stream|application/vnd\.ms-excel)\b",
    )
    .unwrap_or_else(|_| unreachable!())
});

/// A first line of comma-separated tokens with no markup.
static CSV_FIRST_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^,<>\r\n]+(?:,[^,<>\r\n]*)+\r?\n").unwrap_or_else(|_| unreachable!())
});

/// What the export response turned out to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportPayload {
    /// Delimited text.
    Csv(String),
    /// A rendered page; rows come from its data grid.
    Html(String),
}

/// The classified export response.
#[derive(Debug, Clone)]
pub struct ExportResult {
    /// URL the export was posted to.
    pub url: String,
    /// HTTP status of the response.
    pub status: u16,
    pub payload: ExportPayload,
}

impl ExportResult {
    /// Converts the payload into records.
    ///
    /// # Errors
    ///
    /// * [`ScrapeError::Csv`] if a CSV payload is malformed.
    /// * [`ScrapeError::Extraction`] if no records were found.
    pub fn into_records(self) -> Result<Vec<TabularRecord>, ScrapeError> {
        let (records, source) = match &self.payload {
            ExportPayload::Csv(text) => (parse_csv(text)?, "CSV"),
            ExportPayload::Html(html) => (html_table::extract(html), "HTML table"),
        };

        if records.is_empty() {
            return Err(ScrapeError::Extraction {
                url: self.url,
                status: Some(self.status),
                message: format!("export returned no records ({source} response)"),
            });
        }

        log::info!("Retrieved {} records from {source} export", records.len());
        Ok(records)
    }
}

/// Decides whether an export response is CSV.
///
/// Headers win: a CSV-ish content type or any `Content-Disposition` means a
/// file download. Otherwise the body is sniffed for a comma-separated first
/// line.
#[must_use]
pub fn is_csv(content_type: Option<&str>, content_disposition: Option<&str>, body: &str) -> bool {
    if content_type.is_some_and(|ct| CSV_CONTENT_TYPE_RE.is_match(ct)) {
        return true;
    }
    if content_disposition.is_some_and(|cd| !cd.trim().is_empty()) {
        return true;
    }
    CSV_FIRST_LINE_RE.is_match(body.trim_start_matches(BOM))
}

/// Wraps `body` in the payload variant [`is_csv`] picks.
#[must_use]
pub fn classify(
    content_type: Option<&str>,
    content_disposition: Option<&str>,
    body: String,
) -> ExportPayload {
    if is_csv(content_type, content_disposition, &body) {
        ExportPayload::Csv(body)
    } else {
        ExportPayload::Html(body)
    }
}

/// Builds the export postback form from the page markup.
///
/// `reselect` is the `(field name, option value)` of a season chosen by an
/// earlier postback; it is written again so the export runs for that season.
#[must_use]
pub fn build_export_fields(
    html: &str,
    config: &SiteConfig,
    reselect: Option<(&str, &str)>,
) -> FormFields {
    let controls = &config.controls;
    let mut fields = extract_fields(html);

    if let Some((name, value)) = reselect {
        fields.set(name, value);
    }
    fields.set(controls.event_target_field.clone(), "");
    fields.set(controls.event_argument_field.clone(), "");
    fields.remove(&controls.return_field);

    let export_field = if fields.contains(&controls.export_field) {
        controls.export_field.clone()
    } else if let Some(name) = fields.find_name_containing("export") {
        log::debug!("Export control {} not found; using {name}", controls.export_field);
        name.to_owned()
    } else {
        log::warn!(
            "Export control {} not found on page; posting it anyway",
            controls.export_field
        );
        controls.export_field.clone()
    };

    let value = fields
        .get(&export_field)
        .filter(|v| !v.is_empty())
        .unwrap_or(controls.export_value.as_str())
        .to_owned();
    fields.set(export_field, value);

    fields
}

/// Triggers the export on `page` and classifies the response.
///
/// `selected_value` is the season option value posted by a preceding
/// postback, if there was one.
///
/// # Errors
///
/// Returns [`ScrapeError::Connection`] if the export request fails.
pub async fn export(
    session: &SessionClient,
    config: &SiteConfig,
    page: &PageSnapshot,
    season: Option<&SeasonInfo>,
    selected_value: Option<&str>,
) -> Result<ExportResult, ScrapeError> {
    let reselect = season
        .zip(selected_value)
        .map(|(season, value)| (season.dropdown_field_name.as_str(), value));

    match season {
        Some(season) => log::info!(
            "Exporting {} score sheet for {}",
            season.selected_season_label,
            page.school.display_name
        ),
        None => log::info!("Exporting score sheet for {}", page.school.display_name),
    }

    let fields = build_export_fields(&page.html, config, reselect);
    let response = session.post_form(&page.url, &fields).await?;

    let payload = classify(
        response.content_type.as_deref(),
        response.content_disposition.as_deref(),
        response.body,
    );
    log::debug!(
        "Export response classified as {}",
        match &payload {
            ExportPayload::Csv(_) => "CSV",
            ExportPayload::Html(_) => "HTML",
        }
    );

    Ok(ExportResult {
        url: page.url.clone(),
        status: response.status,
        payload,
    })
}

/// Parses CSV text with a header row.
///
/// Blank headers become `Column{j}`; short rows are padded with empty values
/// and cells beyond the header are dropped. Blank lines are skipped.
///
/// # Errors
///
/// Returns [`ScrapeError::Csv`] on malformed input.
pub fn parse_csv(text: &str) -> Result<Vec<TabularRecord>, ScrapeError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim_start_matches(BOM).as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_owned).collect();
    let names = column_names(&headers);

    let mut records = Vec::new();
    for result in reader.records() {
        let row = result?;
        if row.iter().all(str::is_empty) {
            continue;
        }
        records.push(TabularRecord::from_pairs(
            names
                .iter()
                .enumerate()
                .map(|(i, name)| (name.clone(), row.get(i).unwrap_or_default().to_owned())),
        ));
    }

    log::debug!("Parsed {} CSV rows with {} columns", records.len(), names.len());
    Ok(records)
}
