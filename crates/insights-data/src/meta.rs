//! Month-over-month comparison of the top of a tier.
//!
//! Produces the two Markdown tables (latest month and the month before) that
//! a written meta summary is based on.

use insights_core::formatting::{format_optional, markdown_table};
use insights_core::models::ReconciledEntityPeriod;
use insights_core::Period;

use crate::series::{slice, top_n_at};

pub const TABLE_HEADERS: [&str; 7] = ["Name", "Usage Rate", "Tier", "Type1", "Type2", "BST", "Month"];

/// Top entities of a slice in its latest month and the month before.
#[derive(Debug, Clone, PartialEq)]
pub struct MetaComparison {
    pub category: String,
    pub rank_threshold: u32,
    pub latest: Period,
    pub previous: Period,
    pub current_top: Vec<ReconciledEntityPeriod>,
    pub previous_top: Vec<ReconciledEntityPeriod>,
}

impl MetaComparison {
    /// Build the comparison, or `None` when the slice has no rows.
    pub fn build(
        rows: &[ReconciledEntityPeriod],
        category: &str,
        rank_threshold: u32,
        n: usize,
    ) -> Option<Self> {
        let latest = slice(rows, category, rank_threshold).map(|r| r.period).max()?;
        let previous = latest.pred();

        let top = |period| -> Vec<ReconciledEntityPeriod> {
            top_n_at(slice(rows, category, rank_threshold), period, n)
                .into_iter()
                .cloned()
                .collect()
        };

        Some(Self {
            category: category.to_string(),
            rank_threshold,
            latest,
            previous,
            current_top: top(latest),
            previous_top: top(previous),
        })
    }

    pub fn current_table(&self) -> String {
        render(&self.current_top)
    }

    pub fn previous_table(&self) -> String {
        render(&self.previous_top)
    }

    /// Both tables under headings, latest month first.
    pub fn to_markdown(&self) -> String {
        format!(
            "## {} @ {}: {}\n\n{}\n## {} @ {}: {}\n\n{}",
            self.category,
            self.rank_threshold,
            self.latest,
            self.current_table(),
            self.category,
            self.rank_threshold,
            self.previous,
            self.previous_table()
        )
    }
}

fn render(rows: &[ReconciledEntityPeriod]) -> String {
    let body: Vec<Vec<String>> = rows
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                format!("{}", r.usage_percent),
                r.category.clone(),
                r.primary_tag.clone().unwrap_or_default(),
                r.secondary_tag.clone().unwrap_or_default(),
                format_optional(r.aggregate_score, 0),
                r.period.to_string(),
            ]
        })
        .collect();
    markdown_table(&TABLE_HEADERS, &body)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
