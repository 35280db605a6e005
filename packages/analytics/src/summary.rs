//! Per-tournament roll-up of a score sheet.
//!
//! A season sheet lists one row per archer per tournament. The summary
//! groups rows by tournament and reports the team score the school would
//! post: the sum of the best `team_size` totals among archers flagged as
//! counting toward the team.

use archery_scores_models::{SummaryConfig, TabularRecord};

use crate::analyze;

/// Label used for rows whose tournament cell is missing or blank.
pub const UNNAMED_TOURNAMENT: &str = "(unspecified)";

/// Values of the team column that mean "counts toward the team".
const TRUTHY: &[&str] = &["yes", "true", "y", "1", "x"];

/// Aggregates for one tournament.
#[derive(Debug, Clone, PartialEq)]
pub struct TournamentSummary {
    pub tournament: String,
    /// Rows in this tournament.
    pub archers: usize,
    /// Rows flagged as counting toward the team.
    pub team_archers: usize,
    pub mean_total: f64,
    pub best_total: i64,
    /// Ends scoring 50, across all archers.
    pub perfect_ends: u32,
    /// Sum of the best `team_size` totals among team archers.
    pub team_score: i64,
}

impl TournamentSummary {
    /// The summary as an output row.
    #[must_use]
    pub fn to_record(&self) -> TabularRecord {
        TabularRecord::from_pairs([
            ("Tournament", self.tournament.clone()),
            ("Archers", self.archers.to_string()),
            ("Team Archers", self.team_archers.to_string()),
            ("Mean Total", format!("{:.2}", self.mean_total)),
            ("Best Total", self.best_total.to_string()),
            ("Perfect Ends", self.perfect_ends.to_string()),
            ("Team Score", self.team_score.to_string()),
        ])
    }
}

/// Whether a team-column cell marks a team-scoring archer.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    let value = value.trim();
    TRUTHY.iter().any(|t| value.eq_ignore_ascii_case(t))
}

struct Group {
    tournament: String,
    totals: Vec<i64>,
    team_totals: Vec<i64>,
    perfect_ends: u32,
}

/// Summarises `rows` per tournament, in order of first appearance.
#[must_use]
pub fn summarize(rows: &[TabularRecord], config: &SummaryConfig) -> Vec<TournamentSummary> {
    let mut groups: Vec<Group> = Vec::new();

    for row in rows {
        let tournament = row
            .get(&config.tournament_column)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(UNNAMED_TOURNAMENT);

        let index = if let Some(i) = groups.iter().position(|g| g.tournament == tournament) {
            i
        } else {
            groups.push(Group {
                tournament: tournament.to_owned(),
                totals: Vec::new(),
                team_totals: Vec::new(),
                perfect_ends: 0,
            });
            groups.len() - 1
        };
        let group = &mut groups[index];

        let stats = analyze(row);
        group.totals.push(stats.total());
        group.perfect_ends += stats.perfect_ends();
        if row.get(&config.team_column).is_some_and(is_truthy) {
            group.team_totals.push(stats.total());
        }
    }

    if groups.iter().all(|g| g.tournament == UNNAMED_TOURNAMENT) {
        log::debug!(
            "No '{}' column values; summarising the sheet as one group",
            config.tournament_column
        );
    }

    groups
        .into_iter()
        .map(|mut group| {
            group.team_totals.sort_unstable_by(|a, b| b.cmp(a));
            let team_score: i64 = group.team_totals.iter().take(config.team_size).sum();
            let sum: i64 = group.totals.iter().sum();
            #[allow(clippy::cast_precision_loss)]
            let mean_total = if group.totals.is_empty() {
                0.0
            } else {
                sum as f64 / group.totals.len() as f64
            };

            TournamentSummary {
                archers: group.totals.len(),
                team_archers: group.team_totals.len(),
                mean_total,
                best_total: group.totals.iter().copied().max().unwrap_or(0),
                perfect_ends: group.perfect_ends,
                team_score,
                tournament: group.tournament,
            }
        })
        .collect()
}
