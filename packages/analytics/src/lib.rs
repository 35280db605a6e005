#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Score-sheet enrichment.
//!
//! A score-sheet row carries up to thirty arrow scores in columns named by
//! position (`1`, `Arrow 1`, `A1`, ...). Arrows are shot in ends of five;
//! six ends make a round. [`enrich`] appends the derived columns downstream
//! spreadsheets expect:
//!
//! * `AS_10` .. `AS_0`: how many arrows scored each value
//! * `E_1` .. `E_6`: end sums
//! * `H1`, `H2`: sums of ends 1-3 and 4-6
//! * `ES_50` .. `ES_0_4`: how many ends fell in each score bucket
//!
//! A blank or non-numeric arrow cell is "not shot" and contributes nothing.
//! It is never treated as a zero.

pub mod summary;

use std::sync::LazyLock;

use archery_scores_models::{TabularRecord, column_union};
use regex::Regex;
use thiserror::Error;

/// Highest arrow position recognised.
pub const MAX_ARROWS: usize = 30;

/// Arrows per end.
pub const ARROWS_PER_END: usize = 5;

/// Ends per round.
pub const ENDS: usize = 6;

/// Highest score a single arrow can earn.
pub const MAX_ARROW_SCORE: usize = 10;

/// End-score distribution buckets as `(column, low, high)`, both bounds
/// inclusive, in output order.
pub const END_BUCKETS: [(&str, i64, i64); 15] = [
    ("ES_50", 50, 50),
    ("ES_49", 49, 49),
    ("ES_48", 48, 48),
    ("ES_47", 47, 47),
    ("ES_46", 46, 46),
    ("ES_45", 45, 45),
    ("ES_40_44", 40, 44),
    ("ES_35_39", 35, 39),
    ("ES_30_34", 30, 34),
    ("ES_25_29", 25, 29),
    ("ES_20_24", 20, 24),
    ("ES_15_19", 15, 19),
    ("ES_10_14", 10, 14),
    ("ES_5_9", 5, 9),
    ("ES_0_4", 0, 4),
];

static ARROW_FIELD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:arrow\s*|a)?(\d{1,2})$").unwrap_or_else(|_| unreachable!())
});

/// Errors raised when a record set cannot be analysed at all.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The record set has no rows.
    #[error("Analysis error: score sheet has no rows")]
    Empty,

    /// No column in the record set names an arrow position.
    #[error("Analysis error: no arrow score columns found (columns: {})", columns.join(", "))]
    NoArrowFields {
        /// Columns that were present.
        columns: Vec<String>,
    },
}

/// Arrow position (1-based) named by a column, if it names one.
#[must_use]
pub fn arrow_position(name: &str) -> Option<usize> {
    let caps = ARROW_FIELD_RE.captures(name.trim())?;
    let position: usize = caps[1].parse().ok()?;
    (1..=MAX_ARROWS).contains(&position).then_some(position)
}

/// Derived statistics for one archer row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreSheetStats {
    /// `arrow_counts[v]` is the number of arrows that scored exactly `v`.
    pub arrow_counts: [u32; MAX_ARROW_SCORE + 1],
    /// Sum of each end's arrows.
    pub ends: [i64; ENDS],
}

impl ScoreSheetStats {
    /// Sum of ends 1-3.
    #[must_use]
    pub fn h1(&self) -> i64 {
        self.ends[..ENDS / 2].iter().sum()
    }

    /// Sum of ends 4-6.
    #[must_use]
    pub fn h2(&self) -> i64 {
        self.ends[ENDS / 2..].iter().sum()
    }

    /// Round total.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.h1() + self.h2()
    }

    /// Number of arrows counted in `AS_*`.
    #[must_use]
    pub fn counted_arrows(&self) -> u32 {
        self.arrow_counts.iter().sum()
    }

    /// Number of ends whose sum lies in `low..=high`.
    #[must_use]
    pub fn ends_between(&self, low: i64, high: i64) -> u32 {
        let count = self
            .ends
            .iter()
            .filter(|&&end| (low..=high).contains(&end))
            .count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    /// Ends scoring 50.
    #[must_use]
    pub fn perfect_ends(&self) -> u32 {
        self.ends_between(50, 50)
    }

    /// Derived `(column, value)` pairs in output order.
    #[must_use]
    pub fn columns(&self) -> Vec<(String, String)> {
        let mut columns = Vec::with_capacity(MAX_ARROW_SCORE + 1 + ENDS + 2 + END_BUCKETS.len());

        for value in (0..=MAX_ARROW_SCORE).rev() {
            columns.push((format!("AS_{value}"), self.arrow_counts[value].to_string()));
        }
        for (i, end) in self.ends.iter().enumerate() {
            columns.push((format!("E_{}", i + 1), end.to_string()));
        }
        columns.push(("H1".to_owned(), self.h1().to_string()));
        columns.push(("H2".to_owned(), self.h2().to_string()));
        for (name, low, high) in END_BUCKETS {
            columns.push((name.to_owned(), self.ends_between(low, high).to_string()));
        }

        columns
    }
}

/// Computes the derived statistics of `row` from its arrow columns.
///
/// When two columns name the same position, the first parseable one wins.
/// Scores outside `0..=10` still count toward end sums but not toward any
/// `AS_*` column. Values outside the `i32` range are treated as unparseable,
/// so end sums never overflow.
#[must_use]
pub fn analyze(row: &TabularRecord) -> ScoreSheetStats {
    let mut arrows: [Option<i32>; MAX_ARROWS] = [None; MAX_ARROWS];
    for (name, value) in row.iter() {
        let Some(position) = arrow_position(name) else {
            continue;
        };
        let Ok(score) = value.trim().parse::<i32>() else {
            continue;
        };
        let slot = &mut arrows[position - 1];
        if slot.is_none() {
            *slot = Some(score);
        }
    }

    let mut arrow_counts = [0_u32; MAX_ARROW_SCORE + 1];
    let mut ends = [0_i64; ENDS];
    for (i, score) in arrows.iter().enumerate() {
        let Some(score) = *score else {
            continue;
        };
        if let Ok(value) = usize::try_from(score)
            && value <= MAX_ARROW_SCORE
        {
            arrow_counts[value] += 1;
        }
        ends[i / ARROWS_PER_END] += i64::from(score);
    }

    ScoreSheetStats { arrow_counts, ends }
}

/// `row` with the derived columns set. Existing derived columns are
/// overwritten in place.
#[must_use]
pub fn enrich_row(row: &TabularRecord) -> TabularRecord {
    let mut enriched = row.clone();
    for (name, value) in analyze(row).columns() {
        enriched.set(name, value);
    }
    enriched
}

/// Enriches every row of a score sheet.
///
/// # Errors
///
/// * [`AnalysisError::Empty`] if `rows` is empty.
/// * [`AnalysisError::NoArrowFields`] if no column names an arrow position.
pub fn enrich(rows: &[TabularRecord]) -> Result<Vec<TabularRecord>, AnalysisError> {
    if rows.is_empty() {
        return Err(AnalysisError::Empty);
    }

    let has_arrows = rows
        .iter()
        .any(|row| row.field_names().any(|name| arrow_position(name).is_some()));
    if !has_arrows {
        return Err(AnalysisError::NoArrowFields {
            columns: column_union(rows),
        });
    }

    let enriched: Vec<TabularRecord> = rows.iter().map(enrich_row).collect();
    log::info!("Enriched {} score-sheet rows", enriched.len());
    Ok(enriched)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(arrows: &[&str]) -> TabularRecord {
        let mut record = TabularRecord::from_pairs([("Archer", "Ada"), ("Grade", "7")]);
        for (i, value) in arrows.iter().enumerate() {
            record.set((i + 1).to_string(), *value);
        }
        record
    }

    fn stepped_round() -> TabularRecord {
        let arrows: Vec<String> = [10, 9, 8, 7, 6, 5]
            .iter()
            .flat_map(|v| std::iter::repeat_n(v.to_string(), 5))
            .collect();
        let refs: Vec<&str> = arrows.iter().map(String::as_str).collect();
        row(&refs)
    }

    fn int(record: &TabularRecord, name: &str) -> i64 {
        record.get(name).unwrap().parse().unwrap()
    }

    #[test]
    fn recognises_arrow_columns() {
        assert_eq!(arrow_position("1"), Some(1));
        assert_eq!(arrow_position(" 30 "), Some(30));
        assert_eq!(arrow_position("Arrow 12"), Some(12));
        assert_eq!(arrow_position("arrow7"), Some(7));
        assert_eq!(arrow_position("A5"), Some(5));
        assert_eq!(arrow_position("0"), None);
        assert_eq!(arrow_position("31"), None);
        assert_eq!(arrow_position("AS_10"), None);
        assert_eq!(arrow_position("E_1"), None);
        assert_eq!(arrow_position("H1"), None);
        assert_eq!(arrow_position("Grade"), None);
    }

    #[test]
    fn stepped_round_matches_hand_computed_values() {
        let enriched = enrich(&[stepped_round()]).unwrap();
        let r = &enriched[0];

        let ends: Vec<i64> = (1..=6).map(|e| int(r, &format!("E_{e}"))).collect();
        assert_eq!(ends, vec![50, 45, 40, 35, 30, 25]);
        assert_eq!(int(r, "H1"), 135);
        assert_eq!(int(r, "H2"), 90);
        for v in 5..=10 {
            assert_eq!(int(r, &format!("AS_{v}")), 5, "AS_{v}");
        }
        for v in 0..5 {
            assert_eq!(int(r, &format!("AS_{v}")), 0, "AS_{v}");
        }
        for (name, _, _) in END_BUCKETS {
            let expected = i64::from(matches!(
                name,
                "ES_50" | "ES_45" | "ES_40_44" | "ES_35_39" | "ES_30_34" | "ES_25_29"
            ));
            assert_eq!(int(r, name), expected, "{name}");
        }
    }

    #[test]
    fn missing_arrows_contribute_nothing() {
        let stats = analyze(&row(&["10", "9", "8", "7", "6", "5", "4", "3", "2", "1"]));
        assert_eq!(stats.ends[..2], [40, 15]);
        assert_eq!(stats.ends[2..], [0, 0, 0, 0]);
        assert_eq!(stats.counted_arrows(), 10);
    }

    #[test]
    fn blank_arrow_differs_from_zero() {
        let blank = analyze(&row(&["", " ", "M", "10", "10"]));
        assert_eq!(blank.counted_arrows(), 2);
        assert_eq!(blank.arrow_counts[0], 0);

        let zero = analyze(&row(&["0", "0", "0", "10", "10"]));
        assert_eq!(zero.counted_arrows(), 5);
        assert_eq!(zero.arrow_counts[0], 3);
        assert_eq!(blank.ends, zero.ends);
    }

    #[test]
    fn out_of_range_scores_count_in_sums_only() {
        let stats = analyze(&row(&["12", "-1", "10"]));
        assert_eq!(stats.ends[0], 21);
        assert_eq!(stats.counted_arrows(), 1);
    }

    #[test]
    fn huge_values_are_skipped_and_extremes_do_not_overflow() {
        let stats = analyze(&row(&["9223372036854775807", "1"]));
        assert_eq!(stats.ends[0], 1);
        assert_eq!(stats.counted_arrows(), 1);

        let max = i32::MAX.to_string();
        let stats = analyze(&row(&[max.as_str(); MAX_ARROWS]));
        assert_eq!(stats.ends[0], 5 * i64::from(i32::MAX));
        assert_eq!(stats.total(), 30 * i64::from(i32::MAX));
        assert_eq!(stats.h1(), stats.h2());
    }

    #[test]
    fn ends_always_sum_to_halves() {
        let rows = [
            stepped_round(),
            row(&["10"; 17]),
            row(&["3", "", "x", "7"]),
            row(&[]),
        ];
        for r in enrich(&rows).unwrap() {
            let ends: i64 = (1..=6).map(|e| int(&r, &format!("E_{e}"))).sum();
            assert_eq!(ends, int(&r, "H1") + int(&r, "H2"));
            for (name, _, _) in END_BUCKETS {
                assert!((0..=6).contains(&int(&r, name)), "{name}");
            }
        }
    }

    #[test]
    fn perfect_end_counts_only_in_exact_bucket() {
        let stats = analyze(&row(&["10"; 5]));
        assert_eq!(stats.perfect_ends(), 1);
        assert_eq!(stats.ends_between(40, 44), 0);
        // Five unshot ends sum to zero.
        assert_eq!(stats.ends_between(0, 4), 5);
    }

    #[test]
    fn enrichment_is_idempotent() {
        let once = enrich(&[stepped_round(), row(&["9", "", "8"])]).unwrap();
        let twice = enrich(&once).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn derived_columns_follow_source_columns_in_order() {
        let enriched = enrich_row(&row(&["10"]));
        let names: Vec<&str> = enriched.field_names().collect();
        assert_eq!(names[..3], ["Archer", "Grade", "1"]);
        assert_eq!(
            names[3..],
            [
                "AS_10", "AS_9", "AS_8", "AS_7", "AS_6", "AS_5", "AS_4", "AS_3", "AS_2", "AS_1",
                "AS_0", "E_1", "E_2", "E_3", "E_4", "E_5", "E_6", "H1", "H2", "ES_50", "ES_49",
                "ES_48", "ES_47", "ES_46", "ES_45", "ES_40_44", "ES_35_39", "ES_30_34",
                "ES_25_29", "ES_20_24", "ES_15_19", "ES_10_14", "ES_5_9", "ES_0_4",
            ]
        );
    }

    #[test]
    fn duplicate_position_keeps_first_parseable() {
        let record = TabularRecord::from_pairs([("1", ""), ("Arrow 1", "9"), ("A1", "4")]);
        let stats = analyze(&record);
        assert_eq!(stats.ends[0], 9);
        assert_eq!(stats.counted_arrows(), 1);
    }

    #[test]
    fn rejects_empty_and_arrowless_sheets() {
        assert!(matches!(enrich(&[]), Err(AnalysisError::Empty)));

        let err = enrich(&[TabularRecord::from_pairs([("Archer", "Ada")])]).unwrap_err();
        assert!(matches!(err, AnalysisError::NoArrowFields { .. }));
        assert!(err.to_string().contains("Archer"));
    }
}
