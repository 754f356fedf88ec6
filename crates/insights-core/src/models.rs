use serde::{Deserialize, Serialize};
use std::fmt;

use crate::period::Period;

/// Which of the two upstream text layouts a report uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    /// The usage-rank table (`{tier}-{threshold}.txt`).
    Usage,
    /// The sectioned per-entity report (`moveset/{tier}-{threshold}.txt`).
    Moveset,
}

impl ReportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportKind::Usage => "usage",
            ReportKind::Moveset => "moveset",
        }
    }

    /// Parse `"usage"` / `"moveset"` (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_lowercase().as_str() {
            "usage" => Some(ReportKind::Usage),
            "moveset" => Some(ReportKind::Moveset),
            _ => None,
        }
    }
}

impl fmt::Display for ReportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One point of the upstream archive: a month, a tier and a ladder cut-off.
///
/// `threshold` is the raw value used in the URL (`0` for the unfiltered
/// ladder), not the display label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub period: Period,
    pub category: String,
    pub threshold: u32,
}

impl Coordinate {
    pub fn new(period: Period, category: impl Into<String>, threshold: u32) -> Self {
        Self {
            period,
            category: category.into(),
            threshold,
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}-{}", self.period, self.category, self.threshold)
    }
}

/// A single row of a usage-rank table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRow {
    pub coordinate: Coordinate,
    /// Entity name as printed in the report (trimmed, not normalised).
    pub entity_name: String,
    pub rank: u32,
    /// Weighted usage percentage (`%` suffix stripped).
    pub usage_percent: f64,
    pub raw_count: u64,
    pub raw_percent: f64,
}

/// "`subject` is often paired with `partner`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeammateRow {
    pub coordinate: Coordinate,
    pub subject: String,
    pub partner: String,
    pub co_occurrence_percent: f64,
}

/// "`opponent` checks or counters `subject`".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckRow {
    pub coordinate: Coordinate,
    pub subject: String,
    pub opponent: String,
    pub effectiveness_score: f64,
    /// Text inside the parentheses, e.g. `"70.00±3.70"`.
    pub performance: String,
}

/// The six base attributes of an entity. A value is `None` when the source
/// cell was missing or not numeric.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BaseStats {
    pub hp: Option<f64>,
    pub attack: Option<f64>,
    pub defense: Option<f64>,
    pub sp_attack: Option<f64>,
    pub sp_defense: Option<f64>,
    pub speed: Option<f64>,
}

impl BaseStats {
    /// All six values in display order.
    pub fn values(&self) -> [Option<f64>; 6] {
        [
            self.hp,
            self.attack,
            self.defense,
            self.sp_attack,
            self.sp_defense,
            self.speed,
        ]
    }

    /// Sum of the six attributes, or `None` if any of them is unresolved.
    pub fn total(&self) -> Option<f64> {
        self.values().into_iter().sum()
    }
}

/// One row of the static attribute table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Normalised entity name.
    pub name: String,
    pub stats: BaseStats,
    pub primary_tag: Option<String>,
    pub secondary_tag: Option<String>,
}

/// One row of the static image table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageReference {
    /// Normalised entity name.
    pub name: String,
    pub url: String,
}

/// A usage observation enriched with reference data; the unit the pipeline
/// persists and every downstream consumer reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciledEntityPeriod {
    /// Normalised entity name.
    pub name: String,
    pub category: String,
    pub period: Period,
    /// Display label of the ladder cut-off (`1000` for the unfiltered ladder).
    pub rank_threshold: u32,
    pub usage_percent: f64,
    pub stats: BaseStats,
    pub primary_tag: Option<String>,
    pub secondary_tag: Option<String>,
    /// Sum of the base attributes; `None` unless all six resolved.
    pub aggregate_score: Option<f64>,
    pub image_url: Option<String>,
}

impl ReconciledEntityPeriod {
    /// Copy of this row moved to `period` with zero usage. Every reference
    /// field is carried over unchanged.
    pub fn zero_usage_at(&self, period: Period) -> Self {
        Self {
            period,
            usage_percent: 0.0,
            ..self.clone()
        }
    }

    /// Both category tags, skipping empty slots.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        [self.primary_tag.as_deref(), self.secondary_tag.as_deref()]
            .into_iter()
            .flatten()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn full_stats() -> BaseStats {
        BaseStats {
            hp: Some(80.0),
            attack: Some(120.0),
            defense: Some(84.0),
            sp_attack: Some(60.0),
            sp_defense: Some(96.0),
            speed: Some(110.0),
        }
    }

    #[test]
    fn test_report_kind_parse() {
        assert_eq!(ReportKind::parse("usage"), Some(ReportKind::Usage));
        assert_eq!(ReportKind::parse("MOVESET"), Some(ReportKind::Moveset));
        assert_eq!(ReportKind::parse("leads"), None);
    }

    #[test]
    fn test_coordinate_display() {
        let c = Coordinate::new("2024-06".parse().unwrap(), "gen9ou", 1500);
        assert_eq!(c.to_string(), "2024-06/gen9ou-1500");
    }

    #[test]
    fn test_base_stats_total_when_complete() {
        assert_eq!(full_stats().total(), Some(550.0));
    }

    #[test]
    fn test_base_stats_total_null_when_any_missing() {
        let stats = BaseStats {
            speed: None,
            ..full_stats()
        };
        assert_eq!(stats.total(), None);
        assert_eq!(BaseStats::default().total(), None);
    }

    #[test]
    fn test_zero_usage_at_keeps_reference_fields() {
        let row = ReconciledEntityPeriod {
            name: "Ting-Lu".to_string(),
            category: "gen9ou".to_string(),
            period: "2023-05".parse().unwrap(),
            rank_threshold: 1000,
            usage_percent: 12.4,
            stats: full_stats(),
            primary_tag: Some("Dark".to_string()),
            secondary_tag: Some("Ground".to_string()),
            aggregate_score: Some(550.0),
            image_url: Some("https://img/ting-lu.png".to_string()),
        };
        let filled = row.zero_usage_at("2023-04".parse().unwrap());

        assert_eq!(filled.usage_percent, 0.0);
        assert_eq!(filled.period.to_string(), "2023-04");
        assert_eq!(filled.image_url, row.image_url);
        assert_eq!(filled.stats, row.stats);
        assert_eq!(filled.aggregate_score, row.aggregate_score);
        assert_eq!(filled.tags().collect::<Vec<_>>(), vec!["Dark", "Ground"]);
    }
}
