#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Plain data types shared by the archery score-sheet toolchain.
//!
//! Holds the immutable [`SiteConfig`] that every component receives at
//! construction, the [`Credentials`] pair, the school/season facts derived
//! from the score-sheet page, and the [`TabularRecord`] row type produced by
//! both the CSV export and the HTML table fallback.

pub mod config;
pub mod record;

pub use config::{ConfigError, ControlNames, LoginMarkers, SiteConfig, SummaryConfig};
pub use record::{TabularRecord, column_union};
use strum::{AsRefStr, Display};

/// Display name used when the school label is missing from the page.
pub const UNKNOWN_SCHOOL: &str = "Unknown School";

/// The step of a retrieval run. Every run-terminating error names one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
pub enum Step {
    /// Credential collection and login submission.
    #[strum(serialize = "login")]
    Login,
    /// Fetching the score-sheet page.
    #[strum(serialize = "navigation")]
    Navigation,
    /// Season-change postback.
    #[strum(serialize = "season postback")]
    Postback,
    /// Triggering the export action.
    #[strum(serialize = "export")]
    Export,
    /// Turning the export response into records.
    #[strum(serialize = "extraction")]
    Extraction,
    /// Score-sheet enrichment.
    #[strum(serialize = "analysis")]
    Analysis,
    /// Writing output files.
    #[strum(serialize = "output")]
    Output,
}

/// A username/password pair. Never logged; `Debug` redacts the password.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    /// Creates a credential pair.
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns `true` when both halves are non-blank.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The organization (school) a score sheet belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolInfo {
    /// Name as shown on the page, or [`UNKNOWN_SCHOOL`].
    pub display_name: String,
    /// Filesystem-safe variant of the name.
    pub safe_name: String,
}

impl SchoolInfo {
    /// Builds the school facts from the (possibly missing) page label.
    ///
    /// A missing or blank label yields [`UNKNOWN_SCHOOL`] with a safe name of
    /// `Organization_{oid}`; so does a label that sanitizes to nothing.
    #[must_use]
    pub fn from_label(label: Option<&str>, oid: u64) -> Self {
        let fallback = format!("Organization_{oid}");
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(name) => {
                let safe = safe_path_component(name);
                Self {
                    display_name: name.to_owned(),
                    safe_name: if safe.is_empty() { fallback } else { safe },
                }
            }
            None => Self {
                display_name: UNKNOWN_SCHOOL.to_owned(),
                safe_name: fallback,
            },
        }
    }
}

/// One `<option>` of the season dropdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonOption {
    /// Value posted back to the server.
    pub value: String,
    /// Visible label, e.g. `"2024-2025"`.
    pub label: String,
    /// Whether the option carried the `selected` attribute.
    pub selected: bool,
}

/// Season selection state for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonInfo {
    /// Client-side `id` of the season `<select>`.
    pub dropdown_field_id: String,
    /// Form field name the dropdown posts under.
    pub dropdown_field_name: String,
    /// Season the page shows when first opened.
    pub default_season_label: String,
    /// Season asked for by the caller, if any.
    pub requested_season_label: Option<String>,
    /// Season the export will be taken for.
    pub selected_season_label: String,
    /// `true` iff a season was requested and differs from the default.
    pub needs_postback: bool,
}

impl SeasonInfo {
    /// Computes the selection for a page whose default is `default_label`.
    #[must_use]
    pub fn resolve(
        dropdown_field_id: &str,
        dropdown_field_name: &str,
        default_label: &str,
        requested: Option<&str>,
    ) -> Self {
        let requested = requested
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_owned);
        let needs_postback = requested.as_deref().is_some_and(|r| r != default_label);
        let selected = requested
            .clone()
            .filter(|_| needs_postback)
            .unwrap_or_else(|| default_label.to_owned());

        Self {
            dropdown_field_id: dropdown_field_id.to_owned(),
            dropdown_field_name: dropdown_field_name.to_owned(),
            default_season_label: default_label.to_owned(),
            requested_season_label: requested,
            selected_season_label: selected,
            needs_postback,
        }
    }

    /// Reverts the selection to the page default after an unmatched request.
    pub fn revert_to_default(&mut self) {
        self.selected_season_label.clone_from(&self.default_season_label);
        self.needs_postback = false;
    }
}

/// Replaces characters that are invalid in file names with `_` and trims.
///
/// Names made only of dots (`.`, `..`) come back empty so callers fall back
/// to their default directory name.
#[must_use]
pub fn safe_path_component(name: &str) -> String {
    let safe = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>()
        .trim()
        .to_owned();
    if safe.chars().all(|c| c == '.') {
        return String::new();
    }
    safe
}
