//! Season-change postback.
//!
//! Selecting a season in a browser fires the dropdown's `onchange`, which
//! submits the form with `__EVENTTARGET` naming the dropdown. This module
//! replays that submission when the requested season differs from the one
//! the page opened with.
//!
//! ```text
//! NoPostbackNeeded                      (terminal)
//! PostbackRequired --POST--> PostbackComplete
//! ```
//!
//! A requested season that matches no option is not an error: the run
//! continues with the page default and a warning.

use archery_scores_models::{SeasonInfo, SiteConfig};

use crate::ScrapeError;
use crate::form::{FormFields, extract_fields};
use crate::navigator::PageSnapshot;
use crate::session::SessionClient;

/// Where a run stands with respect to the season postback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostbackState {
    /// The page already shows the season to export.
    NoPostbackNeeded,
    /// A different season was requested and has not been selected yet.
    PostbackRequired,
    /// The server has re-rendered the page for the requested season.
    PostbackComplete,
}

impl PostbackState {
    /// Initial state for a season selection.
    #[must_use]
    pub const fn initial(season: &SeasonInfo) -> Self {
        if season.needs_postback {
            Self::PostbackRequired
        } else {
            Self::NoPostbackNeeded
        }
    }
}

/// Result of [`apply`].
#[derive(Debug, Clone)]
pub struct PostbackOutcome {
    /// Page to export from: the re-rendered page after a postback, else the
    /// original.
    pub page: PageSnapshot,
    /// Season selection, corrected to the default if the request missed.
    pub season: SeasonInfo,
    /// Final state.
    pub state: PostbackState,
    /// Option value posted for the dropdown, when a postback happened.
    pub selected_value: Option<String>,
}

/// Converts an ASP.NET client id to the name the control posts under.
///
/// Client ids flatten the naming-container hierarchy with `_`, names use
/// `$`: `ctl00_ContentPlaceHolder1_ddlSeason` posts as
/// `ctl00$ContentPlaceHolder1$ddlSeason`. A segment that is literally
/// `season` belongs to its predecessor's name (`ddl_season`), so it is
/// re-joined with `_` instead.
#[must_use]
pub fn client_id_to_field_name(client_id: &str) -> String {
    let mut name = String::with_capacity(client_id.len());
    for (i, segment) in client_id.split('_').enumerate() {
        if i > 0 {
            name.push(if segment == "season" { '_' } else { '$' });
        }
        name.push_str(segment);
    }
    name
}

/// Event target that signals a change on the season dropdown.
#[must_use]
pub fn event_target(season: &SeasonInfo) -> String {
    if season.dropdown_field_name.is_empty() {
        client_id_to_field_name(&season.dropdown_field_id)
    } else {
        season.dropdown_field_name.clone()
    }
}

/// Removes submit fields that would fire the export or navigate away.
pub fn strip_action_fields(fields: &mut FormFields, config: &SiteConfig) {
    fields.remove(&config.controls.export_field);
    fields.remove(&config.controls.return_field);
    while let Some(name) = fields.find_name_containing("export").map(str::to_owned) {
        fields.remove(&name);
    }
}

/// Builds the form for a season-change postback from the page markup.
#[must_use]
pub fn build_postback_fields(
    html: &str,
    config: &SiteConfig,
    season: &SeasonInfo,
    option_value: &str,
) -> FormFields {
    let controls = &config.controls;
    let mut fields = extract_fields(html);

    fields.set(season.dropdown_field_name.clone(), option_value);
    fields.set(controls.event_target_field.clone(), event_target(season));
    fields.set(controls.event_argument_field.clone(), "");
    strip_action_fields(&mut fields, config);

    fields
}

/// Runs the postback state machine for `season` on `page`.
///
/// # Errors
///
/// Returns [`ScrapeError::Connection`] if the postback request itself
/// fails. An unmatched season never errors.
pub async fn apply(
    session: &SessionClient,
    config: &SiteConfig,
    page: PageSnapshot,
    mut season: SeasonInfo,
) -> Result<PostbackOutcome, ScrapeError> {
    let unchanged = |page: PageSnapshot, season: SeasonInfo| PostbackOutcome {
        page,
        season,
        state: PostbackState::NoPostbackNeeded,
        selected_value: None,
    };

    if PostbackState::initial(&season) == PostbackState::NoPostbackNeeded {
        log::debug!("Season {} is the page default", season.selected_season_label);
        return Ok(unchanged(page, season));
    }

    let requested = season.requested_season_label.clone().unwrap_or_default();
    let option = page
        .season_dropdown
        .as_ref()
        .and_then(|dropdown| dropdown.find_option(&requested))
        .cloned();

    let Some(option) = option else {
        log::warn!(
            "Season '{requested}' not found (available: {:?}); using default '{}'",
            page.available_seasons(),
            season.default_season_label
        );
        season.revert_to_default();
        return Ok(unchanged(page, season));
    };

    if option.label == season.default_season_label {
        log::info!("Season '{requested}' resolved to the page default '{}'", option.label);
        season.revert_to_default();
        return Ok(unchanged(page, season));
    }

    log::info!("Switching season to '{}'", option.label);
    let fields = build_postback_fields(&page.html, config, &season, &option.value);
    let response = session.post_form(&page.url, &fields).await?;
    let refreshed = PageSnapshot::parse(&response.url, response.body, config, page.oid);

    if let Some(dropdown) = &refreshed.season_dropdown
        && dropdown.default_label() != option.label
    {
        log::warn!(
            "Postback returned season '{}' instead of '{}'",
            dropdown.default_label(),
            option.label
        );
    }

    season.selected_season_label = option.label;
    Ok(PostbackOutcome {
        page: refreshed,
        season,
        state: PostbackState::PostbackComplete,
        selected_value: Some(option.value),
    })
}
