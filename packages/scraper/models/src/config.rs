//! Immutable site configuration.
//!
//! Every field has a default matching the target application's control
//! naming, so a TOML file only needs to list what differs. The whole value
//! is passed by reference into each component; nothing reads ambient state.

use std::path::Path;

use serde::Deserialize;

/// Errors raised while loading a [`SiteConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("I/O error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// The config file is not valid TOML for [`SiteConfig`].
    #[error("Invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Host, endpoints and control-name conventions of the score-sheet site.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Scheme and host, e.g. `https://www.nasptournaments.org`.
    pub base_url: String,
    /// Path of the login page.
    pub login_path: String,
    /// Path of the season score-sheet page; `?oid={id}` is appended.
    pub score_sheet_path: String,
    /// Per-request timeout in seconds. Applies to every blocking call.
    pub timeout_secs: u64,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Form control names.
    pub controls: ControlNames,
    /// Login result classification.
    pub login: LoginMarkers,
    /// Tournament summary settings.
    pub summary: SummaryConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.nasptournaments.org".to_owned(),
            login_path: "/Account/Login.aspx".to_owned(),
            score_sheet_path: "/Reports/SeasonScoreSheet.aspx".to_owned(),
            timeout_secs: 60,
            user_agent: concat!("archery-scores/", env!("CARGO_PKG_VERSION")).to_owned(),
            controls: ControlNames::default(),
            login: LoginMarkers::default(),
            summary: SummaryConfig::default(),
        }
    }
}

impl SiteConfig {
    /// Parses a config from TOML text; absent keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Toml`] if the text is not valid.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Absolute URL of the login page.
    #[must_use]
    pub fn login_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.login_path)
    }

    /// Absolute URL of the score-sheet page for organization `oid`.
    #[must_use]
    pub fn score_sheet_url(&self, oid: u64) -> String {
        format!(
            "{}{}?oid={oid}",
            self.base_url.trim_end_matches('/'),
            self.score_sheet_path
        )
    }
}

/// Names of the ASP.NET controls the run reads or writes.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ControlNames {
    /// Login form username field.
    pub username_field: String,
    /// Login form password field.
    pub password_field: String,
    /// CSS selector of the element showing the school name.
    pub school_name_selector: String,
    /// Substrings of the season `<select>` id, tried in order.
    pub season_select_patterns: Vec<String>,
    /// Hidden field naming the control that raised a postback.
    pub event_target_field: String,
    /// Hidden field carrying the postback argument.
    pub event_argument_field: String,
    /// Submit field that triggers the CSV export.
    pub export_field: String,
    /// Value posted for [`Self::export_field`] when the page has none.
    pub export_value: String,
    /// Submit field that navigates back to the school page.
    pub return_field: String,
}

impl Default for ControlNames {
    fn default() -> Self {
        Self {
            username_field: "ctl00$ContentPlaceHolder1$txtUserName".to_owned(),
            password_field: "ctl00$ContentPlaceHolder1$txtPassword".to_owned(),
            school_name_selector: "#ctl00_ContentPlaceHolder1_lblSchoolName".to_owned(),
            season_select_patterns: vec!["ddlSeason".to_owned(), "season".to_owned()],
            event_target_field: "__EVENTTARGET".to_owned(),
            event_argument_field: "__EVENTARGUMENT".to_owned(),
            export_field: "ctl00$ContentPlaceHolder1$btnExport".to_owned(),
            export_value: "Export".to_owned(),
            return_field: "ctl00$ContentPlaceHolder1$btnReturnToSchool".to_owned(),
        }
    }
}

/// Keywords used to classify the login response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoginMarkers {
    /// At least one must appear (case-insensitive) for the login to count.
    pub success_markers: Vec<String>,
    /// Reported in the failure reason when present.
    pub failure_keywords: Vec<String>,
}

impl Default for LoginMarkers {
    fn default() -> Self {
        Self {
            success_markers: ["logout", "log out", "sign out", "log off"]
                .map(str::to_owned)
                .to_vec(),
            failure_keywords: ["invalid", "incorrect", "failed"]
                .map(str::to_owned)
                .to_vec(),
        }
    }
}

/// Columns and sizes used by the per-tournament summary.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Column naming the tournament a row belongs to.
    pub tournament_column: String,
    /// Column flagging whether the archer counts toward the team score.
    pub team_column: String,
    /// Number of best team-scoring archers summed into the team score.
    pub team_size: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            tournament_column: "Tournament".to_owned(),
            team_column: "Counts Toward Team".to_owned(),
            team_size: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = SiteConfig::from_toml_str("").unwrap();
        assert_eq!(config, SiteConfig::default());
    }

    #[test]
    fn partial_toml_overrides_only_listed_keys() {
        let config = SiteConfig::from_toml_str(
            r#"
            base_url = "https://scores.example.org/"
            timeout_secs = 5

            [controls]
            season_select_patterns = ["cboYear"]
            "#,
        )
        .unwrap();

        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.controls.season_select_patterns, vec!["cboYear"]);
        assert_eq!(
            config.controls.username_field,
            ControlNames::default().username_field
        );
        assert_eq!(
            config.login_url(),
            "https://scores.example.org/Account/Login.aspx"
        );
        assert_eq!(
            config.score_sheet_url(99),
            "https://scores.example.org/Reports/SeasonScoreSheet.aspx?oid=99"
        );
    }

    #[test]
    fn rejects_wrong_types() {
        assert!(SiteConfig::from_toml_str("timeout_secs = \"soon\"").is_err());
    }
}
