//! Parser for the monthly usage-rank table.
//!
//! The report is a fixed-column, pipe-delimited table:
//!
//! ```text
//!  Total battles: 1057623
//!  Avg. weight/team: 0.047
//!  + ---- + ------------------ + --------- + ------ + ------- + ------ + ------- +
//!  | Rank | Pokemon            | Usage %   | Raw    | %       | Real   | %       |
//!  + ---- + ------------------ + --------- + ------ + ------- + ------ + ------- +
//!  | 1    | Great Tusk         | 37.41238% | 791295 | 37.410% | 608226 | 36.988% |
//!  + ---- + ------------------ + --------- + ------ + ------- + ------ + ------- +
//! ```
//!
//! Only pipe rows carry data; everything else is decoration. A data row that
//! does not yield every required field is skipped on its own without
//! affecting the rest of the report.

use insights_core::models::{Coordinate, UsageRow};
use tracing::debug;

/// Number of leading positional fields a data row must provide:
/// rank, name, usage %, raw count, raw %. The trailing real-count columns
/// are present upstream but unused.
const REQUIRED_FIELDS: usize = 5;

/// Row counters for one parsed report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    /// Rows turned into records.
    pub rows_parsed: usize,
    /// Candidate data rows that failed to parse.
    pub rows_skipped: usize,
}

impl ParseStats {
    pub fn merge(&mut self, other: ParseStats) {
        self.rows_parsed += other.rows_parsed;
        self.rows_skipped += other.rows_skipped;
    }
}

/// Result of parsing one usage report.
#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub rows: Vec<UsageRow>,
    pub stats: ParseStats,
}

/// Parse the raw text of one usage report fetched for `coordinate`.
///
/// Never fails: decorative lines are ignored, malformed data rows are
/// counted and skipped, and an empty or row-less document yields an empty
/// report.
pub fn parse_usage_report(text: &str, coordinate: &Coordinate) -> UsageReport {
    let mut report = UsageReport::default();

    for (line_no, line) in text.lines().enumerate() {
        let Some(fields) = split_row(line) else {
            continue;
        };
        if is_column_header(&fields) {
            continue;
        }

        match parse_fields(&fields, coordinate) {
            Some(row) => {
                report.rows.push(row);
                report.stats.rows_parsed += 1;
            }
            None => {
                debug!(
                    coordinate = %coordinate,
                    line = line_no + 1,
                    "skipping malformed usage row: {}",
                    line.trim()
                );
                report.stats.rows_skipped += 1;
            }
        }
    }

    report
}

/// Split a pipe row into trimmed cells, without the empty cells outside the
/// outer pipes. Non-pipe lines (borders, preamble, blanks) return `None`.
fn split_row(line: &str) -> Option<Vec<&str>> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|')?;
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    Some(inner.split('|').map(str::trim).collect())
}

fn is_column_header(fields: &[&str]) -> bool {
    fields
        .first()
        .map(|f| f.eq_ignore_ascii_case("rank"))
        .unwrap_or(false)
}

fn parse_fields(fields: &[&str], coordinate: &Coordinate) -> Option<UsageRow> {
    if fields.len() < REQUIRED_FIELDS {
        return None;
    }

    let rank = fields[0].parse::<u32>().ok()?;
    let entity_name = fields[1];
    if entity_name.is_empty() {
        return None;
    }
    let usage_percent = parse_percent(fields[2])?;
    let raw_count = fields[3].parse::<u64>().ok()?;
    let raw_percent = parse_percent(fields[4])?;

    Some(UsageRow {
        coordinate: coordinate.clone(),
        entity_name: entity_name.to_string(),
        rank,
        usage_percent,
        raw_count,
        raw_percent,
    })
}

/// `"35.123%"` → `35.123`. The suffix is optional; non-finite values are rejected.
fn parse_percent(cell: &str) -> Option<f64> {
    let value = cell.trim_end_matches('%').trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
