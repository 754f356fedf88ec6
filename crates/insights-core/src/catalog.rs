//! Static catalogue of the upstream archive: which tiers and ladder cut-offs
//! exist, where the archive starts, and how report URLs are spelled.

use crate::models::{Coordinate, ReportKind};
use crate::period::Period;

// ── Upstream archive ──────────────────────────────────────────────────────────

/// Root of the monthly statistics archive.
pub const STATS_BASE_URL: &str = "https://www.smogon.com/stats";

/// Sprite index page used when no image table is supplied.
pub const SPRITE_INDEX_URL: &str = "https://pokemondb.net/sprites";

/// First month the pipeline tracks.
pub const DEFAULT_START_PERIOD: Period = Period::known(2022, 10);

/// Tiers scraped by default, newest generation first.
pub const DEFAULT_TIERS: &[&str] = &[
    "gen9ubers", "gen9ou", "gen9uu", "gen9ru", "gen9nu", "gen9pu", "gen9zu", "gen8ou", "gen7ou",
    "gen6ou", "gen5ou", "gen4ou", "gen3ou", "gen2ou", "gen1ou",
];

/// Every ladder cut-off upstream has ever published. Not every tier has every
/// cut-off in every month; the missing ones come back as 404.
pub const LADDER_THRESHOLDS: &[u32] = &[0, 1500, 1630, 1695, 1760, 1825];

/// The unfiltered ladder is published as `-0` but displayed as `1000`.
pub const BASELINE_THRESHOLD: u32 = 0;
pub const BASELINE_LABEL: u32 = 1000;

/// Category tags that only mark an empty slot.
pub const PLACEHOLDER_TAGS: &[&str] = &["", "---"];

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Build the upstream URL for one report.
///
/// The layout is an external contract:
/// * usage:   `{base}/{YYYY-MM}/{tier}-{threshold}.txt`
/// * moveset: `{base}/{YYYY-MM}/moveset/{tier}-{threshold}.txt`
pub fn report_url(base: &str, kind: ReportKind, coord: &Coordinate) -> String {
    let base = base.trim_end_matches('/');
    match kind {
        ReportKind::Usage => format!(
            "{}/{}/{}-{}.txt",
            base, coord.period, coord.category, coord.threshold
        ),
        ReportKind::Moveset => format!(
            "{}/{}/moveset/{}-{}.txt",
            base, coord.period, coord.category, coord.threshold
        ),
    }
}

/// Display label for a raw ladder threshold (`0` → `1000`).
pub fn threshold_label(raw: u32) -> u32 {
    if raw == BASELINE_THRESHOLD {
        BASELINE_LABEL
    } else {
        raw
    }
}

/// Ladder labels the dashboard offers for a tier.
pub fn display_thresholds(tier: &str) -> &'static [u32] {
    if tier == "gen9ou" {
        &[1000, 1500, 1825]
    } else {
        &[1000, 1500, 1760]
    }
}

/// Generation number encoded in a tier id (`"gen4ou"` → `Some(4)`).
pub fn generation_of(tier: &str) -> Option<u32> {
    let rest = tier.strip_prefix("gen")?;
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Types that did not exist yet in the tier's generation. They can never be
/// the least common type there, so the insight aggregator ignores them.
pub fn generation_excluded_tags(tier: &str) -> &'static [&'static str] {
    match generation_of(tier) {
        Some(1) => &["Dark", "Steel", "Fairy"],
        Some(2..=5) => &["Fairy"],
        _ => &[],
    }
}

/// `true` for empty or placeholder category tags.
pub fn is_placeholder_tag(tag: &str) -> bool {
    PLACEHOLDER_TAGS.contains(&tag.trim())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
