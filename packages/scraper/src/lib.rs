#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Session and postback replay engine for ASP.NET Web Forms score sheets.
//!
//! The target application has no API: every step is a form round trip that
//! must echo the page's hidden view-state fields back to the server. The
//! modules mirror the steps of one retrieval run:
//!
//! 1. [`auth`] logs in through the [`session::SessionClient`] cookie jar.
//! 2. [`navigator`] opens the score-sheet page and reads school/season facts.
//! 3. [`postback`] switches the season dropdown when a non-default season
//!    was requested.
//! 4. [`export`] triggers the export button and classifies the response as
//!    CSV or HTML, falling back to [`html_table`] for the latter.
//!
//! [`form`] holds the field extraction every POST starts from.

pub mod auth;
pub mod export;
pub mod form;
pub mod html_table;
pub mod navigator;
pub mod postback;
pub mod progress;
pub mod session;

#[cfg(test)]
mod test_server;

use archery_scores_models::Step;

/// Errors that terminate a retrieval run.
///
/// Structural problems on a page (missing labels, unknown season) never
/// produce one of these; they are logged and replaced with a default.
#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    /// Transport failure or a non-2xx response.
    #[error("Connection error for {url}{}: {message}", status_suffix(.status))]
    Connection {
        /// Requested URL.
        url: String,
        /// HTTP status, when a response arrived.
        status: Option<u16>,
        /// Underlying error text.
        message: String,
    },

    /// No usable credentials were supplied.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The server did not accept the credentials.
    #[error("Login failed at {url} (HTTP {status}): {reason}")]
    LoginFailed {
        /// Login URL.
        url: String,
        /// HTTP status of the login response.
        status: u16,
        /// What the classifier saw.
        reason: String,
    },

    /// The score-sheet page could not be opened.
    #[error("Navigation error for {url}: {message}")]
    Navigation {
        /// Page URL.
        url: String,
        /// Underlying error text.
        message: String,
    },

    /// Neither the export nor the fallback table yielded any records.
    #[error("Extraction error for {url}{}: {message}", status_suffix(.status))]
    Extraction {
        /// URL the export was posted to.
        url: String,
        /// HTTP status of the export response.
        status: Option<u16>,
        /// What was missing.
        message: String,
    },

    /// The exported CSV could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),
}

impl ScrapeError {
    /// The run step this error is specific to, if any.
    ///
    /// Transport errors can happen at any step and return `None`; the caller
    /// knows which step it was executing.
    #[must_use]
    pub const fn step(&self) -> Option<Step> {
        match self {
            Self::Authentication(_) | Self::LoginFailed { .. } => Some(Step::Login),
            Self::Navigation { .. } => Some(Step::Navigation),
            Self::Extraction { .. } | Self::Csv(_) => Some(Step::Extraction),
            Self::Connection { .. } | Self::Client(_) => None,
        }
    }

    /// Re-labels a [`ScrapeError::Connection`] raised while opening a page.
    #[must_use]
    pub fn into_navigation(self) -> Self {
        match self {
            Self::Connection {
                url,
                status,
                message,
            } => Self::Navigation {
                url,
                message: match status {
                    Some(s) => format!("HTTP {s}: {message}"),
                    None => message,
                },
            },
            other => other,
        }
    }
}

#[allow(clippy::ref_option)]
fn status_suffix(status: &Option<u16>) -> String {
    status.map_or_else(String::new, |s| format!(" (HTTP {s})"))
}
