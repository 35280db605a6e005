//! CSV output under the season score-sheet directory tree.
//!
//! ```text
//! {base}/Season Score Sheets/{school}/{season}/{school}_{season}_Score_Sheet.csv
//! {base}/Season Score Sheets/{school}/{season}/{school}_{season}_Tournament_Summary.csv
//! ```

use std::path::{Path, PathBuf};

use archery_scores_models::{SchoolInfo, TabularRecord, column_union, safe_path_component};

/// Directory created under the output base.
pub const SHEETS_DIR: &str = "Season Score Sheets";

/// Season directory name used when the page had no season dropdown.
pub const CURRENT_SEASON: &str = "Current Season";

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),
}

/// Output locations for one school and season.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub dir: PathBuf,
    pub sheet: PathBuf,
    pub summary: PathBuf,
}

impl OutputPaths {
    #[must_use]
    pub fn new(base: &Path, school: &SchoolInfo, season_label: &str) -> Self {
        let season = Some(safe_path_component(season_label))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| CURRENT_SEASON.to_owned());
        let stem = format!("{}_{season}", school.safe_name);
        let dir = base.join(SHEETS_DIR).join(&school.safe_name).join(&season);

        Self {
            sheet: dir.join(format!("{stem}_Score_Sheet.csv")),
            summary: dir.join(format!("{stem}_Tournament_Summary.csv")),
            dir,
        }
    }
}

/// Writes `records` as UTF-8 CSV to `path`, creating parent directories.
///
/// Columns are the union of every record's fields in first-seen order; a
/// record missing a column gets an empty cell.
///
/// # Errors
///
/// Returns [`OutputError`] if the directory or file cannot be written.
pub fn write_records(path: &Path, records: &[TabularRecord]) -> Result<(), OutputError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| OutputError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let columns = column_union(records);
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(&columns)?;
    for record in records {
        writer.write_record(columns.iter().map(|c| record.get(c).unwrap_or_default()))?;
    }
    writer.flush().map_err(|source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}
