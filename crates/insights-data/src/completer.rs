//! Gap-filling for the usage time series.
//!
//! An entity that was banned or fell off the ladder in some month has no row
//! for it. Charts need one point per month, so the completer synthesises a
//! zero-usage row for each missing month of the tracked entities.

use std::collections::{BTreeMap, HashMap, HashSet};

use insights_core::identity::normalize;
use insights_core::models::ReconciledEntityPeriod;
use insights_core::{Period, PeriodRange};
use tracing::debug;

/// Fill every `(entity, period)` gap for `entity_subset` over `range`.
///
/// Output is grouped by entity in subset order, then ascending by period.
/// A present row is passed through; a missing one is a copy of the entity's
/// earliest real row with zero usage. Subset names are compared after
/// normalisation and repeats are ignored; names without any row are not
/// tracked and produce nothing.
///
/// Each category/threshold slice an entity appears in is completed on its
/// own, ordered by category then threshold.
pub fn complete<S: AsRef<str>>(
    rows: &[ReconciledEntityPeriod],
    entity_subset: &[S],
    range: PeriodRange,
) -> Vec<ReconciledEntityPeriod> {
    let mut by_entity: HashMap<&str, BTreeMap<(&str, u32), Vec<&ReconciledEntityPeriod>>> =
        HashMap::new();
    for row in rows {
        by_entity
            .entry(row.name.as_str())
            .or_default()
            .entry((row.category.as_str(), row.rank_threshold))
            .or_default()
            .push(row);
    }

    let mut out = Vec::with_capacity(entity_subset.len() * range.len());
    let mut tracked = HashSet::new();

    for raw in entity_subset {
        let name = normalize(raw.as_ref());
        if !tracked.insert(name.clone()) {
            continue;
        }
        let Some(slices) = by_entity.get(name.as_str()) else {
            debug!("{} has no rows, not tracked", name);
            continue;
        };

        for ((category, threshold), slice_rows) in slices {
            let Some(template) = slice_rows.iter().min_by_key(|r| r.period) else {
                continue;
            };
            let present: HashMap<Period, &ReconciledEntityPeriod> =
                slice_rows.iter().map(|r| (r.period, *r)).collect();

            let mut filled = 0usize;
            for period in range.iter() {
                match present.get(&period) {
                    Some(row) => out.push((*row).clone()),
                    None => {
                        out.push(template.zero_usage_at(period));
                        filled += 1;
                    }
                }
            }
            if filled > 0 {
                debug!("{} ({}-{}): filled {} missing months", name, category, threshold, filled);
            }
        }
    }

    out
}

/// Inclusive range from the earliest to the latest period in `rows`.
pub fn observed_range(rows: &[ReconciledEntityPeriod]) -> Option<PeriodRange> {
    PeriodRange::spanning(rows.iter().map(|r| r.period))
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::models::BaseStats;

    fn p(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn row(name: &str, period: &str, usage: f64) -> ReconciledEntityPeriod {
        ReconciledEntityPeriod {
            name: name.to_string(),
            category: "gen9ou".to_string(),
            period: p(period),
            rank_threshold: 1000,
            usage_percent: usage,
            stats: BaseStats::default(),
            primary_tag: Some("Dark".to_string()),
            secondary_tag: Some("Ground".to_string()),
            aggregate_score: Some(570.0),
            image_url: Some(format!("https://img/{}.png", name.to_lowercase())),
        }
    }

    fn range(start: &str, end: &str) -> PeriodRange {
        PeriodRange::new(p(start), p(end))
    }

    // ── filling ───────────────────────────────────────────────────────────

    #[test]
    fn test_fills_leading_and_trailing_gaps() {
        let rows = vec![row("Ting-Lu", "2023-05", 12.4)];
        let out = complete(&rows, &["Ting-Lu"], range("2023-04", "2023-06"));

        assert_eq!(out.len(), 3);
        let months: Vec<String> = out.iter().map(|r| r.period.to_string()).collect();
        assert_eq!(months, vec!["2023-04", "2023-05", "2023-06"]);
        assert_eq!(out[0].usage_percent, 0.0);
        assert_eq!(out[1].usage_percent, 12.4);
        assert_eq!(out[2].usage_percent, 0.0);

        for filled in [&out[0], &out[2]] {
            assert_eq!(filled.image_url.as_deref(), Some("https://img/ting-lu.png"));
            assert_eq!(filled.primary_tag.as_deref(), Some("Dark"));
            assert_eq!(filled.aggregate_score, Some(570.0));
            assert_eq!(filled.category, "gen9ou");
            assert_eq!(filled.rank_threshold, 1000);
        }
    }

    #[test]
    fn test_template_is_earliest_real_row() {
        let mut late = row("Zapdos", "2023-06", 5.0);
        late.image_url = Some("late.png".to_string());
        let mut early = row("Zapdos", "2023-04", 4.0);
        early.image_url = Some("early.png".to_string());

        let out = complete(&[late, early], &["Zapdos"], range("2023-04", "2023-06"));
        assert_eq!(out[1].period, p("2023-05"));
        assert_eq!(out[1].image_url.as_deref(), Some("early.png"));
    }

    #[test]
    fn test_coverage_is_subset_times_periods() {
        let rows = vec![
            row("A", "2023-01", 1.0),
            row("B", "2023-03", 2.0),
            row("C", "2023-02", 3.0),
        ];
        let r = range("2023-01", "2023-04");
        let out = complete(&rows, &["A", "B", "C"], r);
        assert_eq!(out.len(), 3 * r.len());

        let keys: HashSet<(String, Period)> =
            out.iter().map(|r| (r.name.clone(), r.period)).collect();
        assert_eq!(keys.len(), out.len());
    }

    #[test]
    fn test_present_rows_pass_through_unchanged() {
        let rows = vec![row("A", "2023-01", 1.0), row("A", "2023-02", 2.0)];
        let out = complete(&rows, &["A"], range("2023-01", "2023-02"));
        assert_eq!(out, rows);
    }

    // ── subset handling ───────────────────────────────────────────────────

    #[test]
    fn test_empty_subset_yields_nothing() {
        let rows = vec![row("A", "2023-01", 1.0)];
        let out = complete::<&str>(&rows, &[], range("2023-01", "2023-03"));
        assert!(out.is_empty());
    }

    #[test]
    fn test_untracked_entity_produces_nothing() {
        let rows = vec![row("A", "2023-01", 1.0)];
        let out = complete(&rows, &["A", "Ghost"], range("2023-01", "2023-02"));
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|r| r.name == "A"));
    }

    #[test]
    fn test_subset_names_are_normalised_and_deduplicated() {
        let rows = vec![row("Ting-Lu", "2023-01", 1.0)];
        let out = complete(&rows, &[" ting-lu", "TING-LU"], range("2023-01", "2023-02"));
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_output_keeps_subset_order() {
        let rows = vec![row("A", "2023-01", 1.0), row("B", "2023-01", 2.0)];
        let out = complete(&rows, &["B", "A"], range("2023-01", "2023-01"));
        let names: Vec<&str> = out.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    // ── slices ────────────────────────────────────────────────────────────

    #[test]
    fn test_each_slice_is_completed_separately() {
        let mut uu = row("Ting-Lu", "2023-02", 9.0);
        uu.category = "gen9uu".to_string();
        let mut ladder = row("Ting-Lu", "2023-01", 7.0);
        ladder.rank_threshold = 1825;
        let rows = vec![row("Ting-Lu", "2023-01", 12.0), uu, ladder];

        let out = complete(&rows, &["Ting-Lu"], range("2023-01", "2023-02"));
        assert_eq!(out.len(), 3 * 2);

        let cells: Vec<(&str, u32, String, f64)> = out
            .iter()
            .map(|r| (r.category.as_str(), r.rank_threshold, r.period.to_string(), r.usage_percent))
            .collect();
        assert_eq!(
            cells,
            vec![
                ("gen9ou", 1000, "2023-01".to_string(), 12.0),
                ("gen9ou", 1000, "2023-02".to_string(), 0.0),
                ("gen9ou", 1825, "2023-01".to_string(), 7.0),
                ("gen9ou", 1825, "2023-02".to_string(), 0.0),
                ("gen9uu", 1000, "2023-01".to_string(), 0.0),
                ("gen9uu", 1000, "2023-02".to_string(), 9.0),
            ]
        );
    }

    #[test]
    fn test_observed_range() {
        let rows = vec![row("A", "2023-05", 1.0), row("B", "2023-02", 1.0)];
        assert_eq!(observed_range(&rows), Some(range("2023-02", "2023-05")));
        assert_eq!(observed_range(&[]), None);
    }
}
