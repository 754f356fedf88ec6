//! Join usage rows with the static reference tables.

use std::collections::{BTreeSet, HashMap};

use insights_core::catalog::threshold_label;
use insights_core::identity::normalize;
use insights_core::models::{BaseStats, Coordinate, ReconciledEntityPeriod, UsageRow};
use insights_core::{InsightsError, Period, Result};
use tracing::{debug, info, warn};

use crate::reference::ReferenceTables;

/// How many names in a join summary are printed before truncating.
const SUMMARY_NAME_LIMIT: usize = 20;

/// Display label of a coordinate's ladder threshold. Every persisted row,
/// usage or relationship, goes through this.
pub fn labeled_threshold(coordinate: &Coordinate) -> u32 {
    threshold_label(coordinate.threshold)
}

/// Reference lookups that failed during one reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinReport {
    pub rows: usize,
    pub attribute_misses: usize,
    pub image_misses: usize,
    pub missing_attribute_names: BTreeSet<String>,
    pub missing_image_names: BTreeSet<String>,
}

impl JoinReport {
    pub fn is_clean(&self) -> bool {
        self.attribute_misses == 0 && self.image_misses == 0
    }

    /// Log the data-quality summary at the end of a run.
    pub fn log_summary(&self) {
        info!(
            rows = self.rows,
            attribute_misses = self.attribute_misses,
            image_misses = self.image_misses,
            "Reconciliation finished"
        );
        if !self.missing_attribute_names.is_empty() {
            warn!(
                "{} names have no attribute row: {}",
                self.missing_attribute_names.len(),
                preview(&self.missing_attribute_names)
            );
        }
        if !self.missing_image_names.is_empty() {
            warn!(
                "{} names have no image: {}",
                self.missing_image_names.len(),
                preview(&self.missing_image_names)
            );
        }
    }
}

fn preview(names: &BTreeSet<String>) -> String {
    let mut shown: Vec<&str> = names
        .iter()
        .take(SUMMARY_NAME_LIMIT)
        .map(String::as_str)
        .collect();
    if names.len() > SUMMARY_NAME_LIMIT {
        shown.push("...");
    }
    shown.join(", ")
}

/// Output of [`reconcile`].
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub rows: Vec<ReconciledEntityPeriod>,
    pub report: JoinReport,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RowKey {
    category: String,
    period: Period,
    threshold: u32,
    name: String,
}

impl RowKey {
    fn describe(&self) -> String {
        format!(
            "{}/{}-{}/{}",
            self.period, self.category, self.threshold, self.name
        )
    }
}

/// Enrich every usage row with attributes and an image URL.
///
/// Output has exactly one row per input row, in input order; lookups that
/// miss leave explicit nulls and are counted in the [`JoinReport`].
///
/// # Errors
///
/// [`InsightsError::DuplicateKey`] if two rows share category, period,
/// labelled threshold and normalised name.
pub fn reconcile(usage_rows: &[UsageRow], tables: &ReferenceTables) -> Result<Reconciliation> {
    let mut seen: HashMap<RowKey, f64> = HashMap::with_capacity(usage_rows.len());
    let mut out = Reconciliation {
        rows: Vec::with_capacity(usage_rows.len()),
        report: JoinReport::default(),
    };

    for row in usage_rows {
        let name = normalize(&row.entity_name);
        let rank_threshold = labeled_threshold(&row.coordinate);

        let key = RowKey {
            category: row.coordinate.category.clone(),
            period: row.coordinate.period,
            threshold: rank_threshold,
            name: name.clone(),
        };
        if let Some(first) = seen.insert(key.clone(), row.usage_percent) {
            return Err(InsightsError::DuplicateKey {
                key: key.describe(),
                first,
                second: row.usage_percent,
            });
        }

        let attributes = tables.attributes(&name);
        if attributes.is_none() {
            out.report.attribute_misses += 1;
            out.report.missing_attribute_names.insert(name.clone());
        }
        let image_url = tables.image_url(&name).map(str::to_string);
        if image_url.is_none() {
            out.report.image_misses += 1;
            out.report.missing_image_names.insert(name.clone());
        }

        let stats = attributes.map(|a| a.stats).unwrap_or_default();
        out.rows.push(ReconciledEntityPeriod {
            name,
            category: row.coordinate.category.clone(),
            period: row.coordinate.period,
            rank_threshold,
            usage_percent: row.usage_percent,
            stats,
            primary_tag: attributes.and_then(|a| a.primary_tag.clone()),
            secondary_tag: attributes.and_then(|a| a.secondary_tag.clone()),
            aggregate_score: aggregate_score(&stats),
            image_url,
        });
    }

    out.report.rows = out.rows.len();
    debug!(
        "reconciled {} rows against {} attribute / {} image entries",
        out.rows.len(),
        tables.attribute_count(),
        tables.image_count()
    );
    Ok(out)
}

/// Sum of the six base attributes; `None` as soon as one is missing.
pub fn aggregate_score(stats: &BaseStats) -> Option<f64> {
    stats.total()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
