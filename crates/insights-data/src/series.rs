//! Top-N usage series for one tier and ladder.

use insights_core::models::ReconciledEntityPeriod;
use insights_core::{Period, PeriodRange};

use crate::completer::{complete, observed_range};

/// A gap-free series for the most used entities of a slice.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopSeries {
    /// Month the ranking was taken from.
    pub latest: Option<Period>,
    /// Entities in ranking order.
    pub entities: Vec<String>,
    pub range: Option<PeriodRange>,
    /// Completed rows, grouped by entity in ranking order.
    pub rows: Vec<ReconciledEntityPeriod>,
}

/// Rows of one tier/ladder slice.
pub fn slice<'a>(
    rows: &'a [ReconciledEntityPeriod],
    category: &'a str,
    rank_threshold: u32,
) -> impl Iterator<Item = &'a ReconciledEntityPeriod> + 'a {
    rows.iter()
        .filter(move |r| r.category == category && r.rank_threshold == rank_threshold)
}

/// The `n` most used entities of `period`, highest first; ties keep input order.
pub fn top_n_at<'a>(
    rows: impl Iterator<Item = &'a ReconciledEntityPeriod>,
    period: Period,
    n: usize,
) -> Vec<&'a ReconciledEntityPeriod> {
    let mut ranked: Vec<&ReconciledEntityPeriod> = rows.filter(|r| r.period == period).collect();
    ranked.sort_by(|a, b| b.usage_percent.total_cmp(&a.usage_percent));
    ranked.truncate(n);
    ranked
}

/// Select the top `n` entities of the latest month in the slice and complete
/// their series over every month the slice covers.
pub fn top_n_series(
    rows: &[ReconciledEntityPeriod],
    category: &str,
    rank_threshold: u32,
    n: usize,
) -> TopSeries {
    let sliced: Vec<ReconciledEntityPeriod> =
        slice(rows, category, rank_threshold).cloned().collect();

    let Some(latest) = sliced.iter().map(|r| r.period).max() else {
        return TopSeries::default();
    };
    let Some(range) = observed_range(&sliced) else {
        return TopSeries::default();
    };

    let entities: Vec<String> = top_n_at(sliced.iter(), latest, n)
        .into_iter()
        .map(|r| r.name.clone())
        .collect();
    let completed = complete(&sliced, &entities, range);

    TopSeries {
        latest: Some(latest),
        entities,
        range: Some(range),
        rows: completed,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
