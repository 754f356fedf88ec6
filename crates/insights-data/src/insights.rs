//! Per-tier descriptive statistics over a usage snapshot.
//!
//! A snapshot is one tier/ladder/month slice cut at a minimum usage, so that
//! fringe entities do not skew the picture. Over that slice the aggregator
//! reports the most and least common category tags, the entities with the
//! highest and lowest aggregate score, and the mean aggregate score.

use insights_core::catalog::{generation_excluded_tags, is_placeholder_tag};
use insights_core::models::ReconciledEntityPeriod;
use insights_core::Period;
use serde::{Deserialize, Serialize};

/// Usage cut-off (percent) an entity must reach to count in a snapshot.
pub const DEFAULT_USAGE_CUTOFF: f64 = 3.406;

/// Knobs for [`aggregate`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightOptions {
    /// Tags never reported as the least common one (compared
    /// case-insensitively).
    pub anti_mode_exclusions: Vec<String>,
}

impl InsightOptions {
    /// Options for a tier: types introduced after its generation are excluded
    /// from the anti-mode.
    pub fn for_category(category: &str) -> Self {
        Self {
            anti_mode_exclusions: generation_excluded_tags(category)
                .iter()
                .map(|t| t.to_string())
                .collect(),
        }
    }

    fn is_excluded(&self, tag: &str) -> bool {
        self.anti_mode_exclusions
            .iter()
            .any(|e| e.eq_ignore_ascii_case(tag))
    }
}

/// An entity together with its aggregate score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityScore {
    pub name: String,
    pub score: f64,
}

/// Descriptive statistics of one snapshot. Every field is `None` when the
/// snapshot has nothing to measure it on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TierInsights {
    pub rows: usize,
    pub mode_tag: Option<String>,
    pub anti_mode_tag: Option<String>,
    pub max_aggregate_entity: Option<EntityScore>,
    pub min_aggregate_entity: Option<EntityScore>,
    pub mean_aggregate_score: Option<f64>,
}

/// Rows of one tier/ladder/month with usage at or above `min_usage`.
pub fn snapshot(
    rows: &[ReconciledEntityPeriod],
    category: &str,
    rank_threshold: u32,
    period: Period,
    min_usage: f64,
) -> Vec<ReconciledEntityPeriod> {
    rows.iter()
        .filter(|r| {
            r.category == category
                && r.rank_threshold == rank_threshold
                && r.period == period
                && r.usage_percent >= min_usage
        })
        .cloned()
        .collect()
}

/// Latest period present for a tier/ladder slice.
pub fn latest_period(
    rows: &[ReconciledEntityPeriod],
    category: &str,
    rank_threshold: u32,
) -> Option<Period> {
    rows.iter()
        .filter(|r| r.category == category && r.rank_threshold == rank_threshold)
        .map(|r| r.period)
        .max()
}

/// Compute [`TierInsights`] over a snapshot.
///
/// Tags from both slots are pooled with placeholders dropped. Mode and
/// anti-mode ties go to the tag seen first in `rows` order; extrema ties go
/// to the first row. Aggregate statistics only use rows with a score.
pub fn aggregate(rows: &[ReconciledEntityPeriod], options: &InsightOptions) -> TierInsights {
    let counts = tag_counts(rows);

    let mode_tag = counts
        .iter()
        .fold(None::<&(String, usize)>, |best, entry| match best {
            Some(b) if b.1 >= entry.1 => Some(b),
            _ => Some(entry),
        })
        .map(|(tag, _)| tag.clone());

    let anti_mode_tag = counts
        .iter()
        .filter(|(tag, _)| !options.is_excluded(tag))
        .fold(None::<&(String, usize)>, |best, entry| match best {
            Some(b) if b.1 <= entry.1 => Some(b),
            _ => Some(entry),
        })
        .map(|(tag, _)| tag.clone());

    let scored: Vec<(&str, f64)> = rows
        .iter()
        .filter_map(|r| r.aggregate_score.map(|s| (r.name.as_str(), s)))
        .collect();

    let max_aggregate_entity = scored
        .iter()
        .fold(None::<&(&str, f64)>, |best, entry| match best {
            Some(b) if b.1 >= entry.1 => Some(b),
            _ => Some(entry),
        })
        .map(to_entity_score);

    let min_aggregate_entity = scored
        .iter()
        .fold(None::<&(&str, f64)>, |best, entry| match best {
            Some(b) if b.1 <= entry.1 => Some(b),
            _ => Some(entry),
        })
        .map(to_entity_score);

    let mean_aggregate_score = (!scored.is_empty())
        .then(|| scored.iter().map(|(_, s)| s).sum::<f64>() / scored.len() as f64);

    TierInsights {
        rows: rows.len(),
        mode_tag,
        anti_mode_tag,
        max_aggregate_entity,
        min_aggregate_entity,
        mean_aggregate_score,
    }
}

fn to_entity_score(entry: &(&str, f64)) -> EntityScore {
    EntityScore {
        name: entry.0.to_string(),
        score: entry.1,
    }
}

/// Tag frequencies in first-appearance order.
fn tag_counts(rows: &[ReconciledEntityPeriod]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for tag in rows.iter().flat_map(|r| r.tags()) {
        let tag = tag.trim();
        if is_placeholder_tag(tag) {
            continue;
        }
        match counts.iter_mut().find(|(t, _)| t == tag) {
            Some((_, n)) => *n += 1,
            None => counts.push((tag.to_string(), 1)),
        }
    }
    counts
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use insights_core::models::BaseStats;

    fn p(s: &str) -> Period {
        s.parse().unwrap()
    }

    fn row(name: &str, tags: (&str, &str), score: Option<f64>) -> ReconciledEntityPeriod {
        let tag = |t: &str| (!t.is_empty()).then(|| t.to_string());
        ReconciledEntityPeriod {
            name: name.to_string(),
            category: "gen9ou".to_string(),
            period: p("2024-06"),
            rank_threshold: 1000,
            usage_percent: 10.0,
            stats: BaseStats::default(),
            primary_tag: tag(tags.0),
            secondary_tag: tag(tags.1),
            aggregate_score: score,
            image_url: None,
        }
    }

    // ── mode / anti-mode ──────────────────────────────────────────────────

    #[test]
    fn test_mode_and_first_seen_anti_mode() {
        let rows = vec![
            row("Charizard", ("Fire", ""), Some(534.0)),
            row("Arcanine", ("Fire", ""), Some(555.0)),
            row("Vaporeon", ("Water", ""), Some(525.0)),
            row("Garchomp", ("Ground", ""), Some(600.0)),
        ];
        let insights = aggregate(&rows, &InsightOptions::default());
        assert_eq!(insights.mode_tag.as_deref(), Some("Fire"));
        assert_eq!(insights.anti_mode_tag.as_deref(), Some("Water"));
    }

    #[test]
    fn test_anti_mode_tie_follows_input_order() {
        let rows = vec![
            row("A", ("Fire", ""), None),
            row("B", ("Fire", ""), None),
            row("C", ("Ground", ""), None),
            row("D", ("Water", ""), None),
        ];
        let insights = aggregate(&rows, &InsightOptions::default());
        assert_eq!(insights.anti_mode_tag.as_deref(), Some("Ground"));
    }

    #[test]
    fn test_both_slots_pooled_and_placeholders_dropped() {
        let rows = vec![
            row("Great Tusk", ("Ground", "Fighting"), None),
            row("Ting-Lu", ("Dark", "Ground"), None),
            row("Zapdos", ("Electric", "---"), None),
        ];
        let insights = aggregate(&rows, &InsightOptions::default());
        assert_eq!(insights.mode_tag.as_deref(), Some("Ground"));
        assert_eq!(insights.anti_mode_tag.as_deref(), Some("Fighting"));
    }

    #[test]
    fn test_generation_exclusions_skip_anti_mode() {
        let rows = vec![
            row("Clefable", ("Fairy", ""), None),
            row("Snorlax", ("Normal", ""), None),
            row("Tauros", ("Normal", ""), None),
            row("Zapdos", ("Electric", "Flying"), None),
            row("Dragonite", ("Dragon", "Flying"), None),
        ];
        let insights = aggregate(&rows, &InsightOptions::for_category("gen1ou"));
        assert_eq!(insights.anti_mode_tag.as_deref(), Some("Electric"));

        let modern = aggregate(&rows, &InsightOptions::for_category("gen9ou"));
        assert_eq!(modern.anti_mode_tag.as_deref(), Some("Fairy"));
    }

    #[test]
    fn test_exclusions_are_case_insensitive() {
        let rows = vec![row("X", ("fairy", ""), None), row("Y", ("Normal", "Normal"), None)];
        let options = InsightOptions {
            anti_mode_exclusions: vec!["FAIRY".to_string()],
        };
        assert_eq!(aggregate(&rows, &options).anti_mode_tag.as_deref(), Some("Normal"));
    }

    // ── aggregate score statistics ────────────────────────────────────────

    #[test]
    fn test_extrema_and_mean_ignore_null_scores() {
        let rows = vec![
            row("Blissey", ("Normal", ""), Some(540.0)),
            row("Unknown", ("Normal", ""), None),
            row("Shedinja", ("Bug", "Ghost"), Some(236.0)),
            row("Arceus", ("Normal", ""), Some(720.0)),
        ];
        let insights = aggregate(&rows, &InsightOptions::default());
        assert_eq!(insights.max_aggregate_entity.unwrap().name, "Arceus");
        assert_eq!(insights.min_aggregate_entity.unwrap().name, "Shedinja");
        let mean = insights.mean_aggregate_score.unwrap();
        assert!((mean - 1496.0 / 3.0).abs() < 1e-9);
        assert_eq!(insights.rows, 4);
    }

    #[test]
    fn test_extrema_ties_go_to_first_row() {
        let rows = vec![
            row("First", ("Normal", ""), Some(500.0)),
            row("Second", ("Normal", ""), Some(500.0)),
        ];
        let insights = aggregate(&rows, &InsightOptions::default());
        assert_eq!(insights.max_aggregate_entity.unwrap().name, "First");
        assert_eq!(insights.min_aggregate_entity.unwrap().name, "First");
    }

    #[test]
    fn test_empty_snapshot() {
        let insights = aggregate(&[], &InsightOptions::default());
        assert_eq!(insights, TierInsights::default());
    }

    // ── snapshot selection ────────────────────────────────────────────────

    #[test]
    fn test_snapshot_applies_cutoff_and_slice() {
        let mut low = row("Low", ("Normal", ""), None);
        low.usage_percent = 3.0;
        let mut edge = row("Edge", ("Normal", ""), None);
        edge.usage_percent = DEFAULT_USAGE_CUTOFF;
        let mut old = row("Old", ("Normal", ""), None);
        old.period = p("2024-05");
        let mut other_ladder = row("Ladder", ("Normal", ""), None);
        other_ladder.rank_threshold = 1500;
        let keep = row("Keep", ("Normal", ""), None);

        let rows = vec![low, edge, old, other_ladder, keep];
        let snap = snapshot(&rows, "gen9ou", 1000, p("2024-06"), DEFAULT_USAGE_CUTOFF);
        let names: Vec<&str> = snap.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Edge", "Keep"]);
    }

    #[test]
    fn test_latest_period() {
        let mut older = row("A", ("Normal", ""), None);
        older.period = p("2023-01");
        let rows = vec![older, row("B", ("Normal", ""), None)];
        assert_eq!(latest_period(&rows, "gen9ou", 1000), Some(p("2024-06")));
        assert_eq!(latest_period(&rows, "gen9uu", 1000), None);
    }
}
