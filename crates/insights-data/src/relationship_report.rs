//! Parser for the sectioned per-entity (moveset) report.
//!
//! Each entity gets a block opened by a one-line title box, followed by named
//! subsections separated by border rows:
//!
//! ```text
//!  +----------------------------------------+
//!  | Great Tusk                             |
//!  +----------------------------------------+
//!  | Raw count: 791295                      |
//!  +----------------------------------------+
//!  | Teammates                              |
//!  | Kingambit 39.123%                      |
//!  +----------------------------------------+
//!  | Checks and Counters                    |
//!  | Dragapult 58.231 (69.28±2.76)          |
//!  |	 (22.3% KOed / 47.0% switched out)     |
//!  +----------------------------------------+
//! ```
//!
//! Only the Teammates and Checks and Counters subsections are extracted.

use std::sync::OnceLock;

use insights_core::models::{CheckRow, Coordinate, TeammateRow};
use regex::Regex;
use tracing::debug;

use crate::usage_report::ParseStats;

/// Subsection titles that can appear in a bordered box without opening a new
/// entity block.
const SECTION_TITLES: &[&str] = &[
    "Abilities",
    "Items",
    "Spreads",
    "Moves",
    "Tera Types",
    "Teammates",
    "Checks and Counters",
];

/// Per-block summary lines; a block can carry just one of them inside a box.
const BLOCK_STAT_PREFIXES: &[&str] = &["Raw count:", "Avg. weight:", "Viability Ceiling:"];

const TEAMMATES_HEADER: &str = "| Teammates";
const CHECKS_HEADER: &str = "| Checks and Counters";

/// Where the parser is inside the current entity block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionState {
    /// Between blocks, or in a block before any extracted subsection.
    OutsideBlock,
    InTeammates,
    InChecks,
    /// Inside a block, in a subsection whose rows are ignored.
    InBlockOther,
}

/// Rows extracted from one moveset report.
#[derive(Debug, Clone, Default)]
pub struct RelationshipReport {
    pub teammates: Vec<TeammateRow>,
    pub checks: Vec<CheckRow>,
    pub stats: ParseStats,
}

fn teammate_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\|\s*(.*?)\s+([\d.]+)%\s*\|").expect("regex is valid"))
}

fn check_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\|\s*(.*?)\s+([\d.]+)\s+\((.*?)\)\s*\|").expect("regex is valid")
    })
}

/// A `+----+` separator row.
fn is_border(line: &str) -> bool {
    line.starts_with('+') && line.chars().all(|c| matches!(c, '+' | '-' | ' '))
}

/// Text inside a `| ... |` row, trimmed.
fn cell_text(line: &str) -> &str {
    let inner = line.strip_prefix('|').unwrap_or(line);
    inner.strip_suffix('|').unwrap_or(inner).trim()
}

fn is_block_title(title: &str) -> bool {
    !title.is_empty()
        && !SECTION_TITLES.contains(&title)
        && !BLOCK_STAT_PREFIXES.iter().any(|p| title.starts_with(p))
}

/// Line-driven state machine over one report.
struct Parser<'a> {
    coordinate: &'a Coordinate,
    state: SectionState,
    subject: Option<String>,
    /// Last line was a border.
    after_border: bool,
    /// Pipe row seen right after a border; becomes the subject if the next
    /// line closes the box.
    pending_title: Option<String>,
    report: RelationshipReport,
}

impl<'a> Parser<'a> {
    fn new(coordinate: &'a Coordinate) -> Self {
        Self {
            coordinate,
            state: SectionState::OutsideBlock,
            subject: None,
            after_border: false,
            pending_title: None,
            report: RelationshipReport::default(),
        }
    }

    fn feed(&mut self, line_no: usize, raw: &str) {
        let line = raw.trim();

        if is_border(line) {
            if let Some(title) = self.pending_title.take() {
                debug!(coordinate = %self.coordinate, subject = %title, "entering block");
                self.subject = Some(title);
                self.state = SectionState::OutsideBlock;
            } else {
                self.suspend();
            }
            self.after_border = true;
            return;
        }

        let after_border = std::mem::replace(&mut self.after_border, false);
        self.pending_title = None;

        if !line.starts_with('|') {
            self.suspend();
            return;
        }

        if line.starts_with(TEAMMATES_HEADER) {
            self.state = SectionState::InTeammates;
            return;
        }
        if line.starts_with(CHECKS_HEADER) {
            self.state = SectionState::InChecks;
            return;
        }

        if after_border {
            let title = cell_text(line);
            if is_block_title(title) {
                self.pending_title = Some(title.to_string());
            }
            self.suspend();
            return;
        }

        match self.state {
            SectionState::InTeammates => self.teammate_line(line_no, line),
            SectionState::InChecks => self.check_line(line_no, line),
            SectionState::OutsideBlock | SectionState::InBlockOther => {}
        }
    }

    fn suspend(&mut self) {
        if matches!(self.state, SectionState::InTeammates | SectionState::InChecks) {
            self.state = SectionState::InBlockOther;
        }
    }

    fn teammate_line(&mut self, line_no: usize, line: &str) {
        let Some(subject) = self.subject.clone() else {
            self.skip(line_no, line);
            return;
        };
        let parsed = teammate_re().captures(line).and_then(|caps| {
            let partner = caps.get(1)?.as_str().trim();
            let pct = caps.get(2)?.as_str().parse::<f64>().ok()?;
            (!partner.is_empty() && pct.is_finite()).then(|| (partner.to_string(), pct))
        });

        match parsed {
            Some((partner, co_occurrence_percent)) => {
                self.report.teammates.push(TeammateRow {
                    coordinate: self.coordinate.clone(),
                    subject,
                    partner,
                    co_occurrence_percent,
                });
                self.report.stats.rows_parsed += 1;
            }
            None => self.skip(line_no, line),
        }
    }

    fn check_line(&mut self, line_no: usize, line: &str) {
        let Some(subject) = self.subject.clone() else {
            self.skip(line_no, line);
            return;
        };
        let parsed = check_re().captures(line).and_then(|caps| {
            let opponent = caps.get(1)?.as_str().trim();
            let score = caps.get(2)?.as_str().parse::<f64>().ok()?;
            let performance = caps.get(3)?.as_str().trim();
            (!opponent.is_empty() && score.is_finite())
                .then(|| (opponent.to_string(), score, performance.to_string()))
        });

        match parsed {
            Some((opponent, effectiveness_score, performance)) => {
                self.report.checks.push(CheckRow {
                    coordinate: self.coordinate.clone(),
                    subject,
                    opponent,
                    effectiveness_score,
                    performance,
                });
                self.report.stats.rows_parsed += 1;
            }
            None => self.skip(line_no, line),
        }
    }

    fn skip(&mut self, line_no: usize, line: &str) {
        debug!(
            coordinate = %self.coordinate,
            line = line_no + 1,
            state = ?self.state,
            "skipping relationship line: {}",
            line
        );
        self.report.stats.rows_skipped += 1;
    }
}

/// Parse the raw text of one moveset report fetched for `coordinate`.
///
/// Never fails; lines that do not fit the expected shape inside an extracted
/// subsection are counted in `stats.rows_skipped`.
pub fn parse_relationship_report(text: &str, coordinate: &Coordinate) -> RelationshipReport {
    let mut parser = Parser::new(coordinate);
    for (line_no, line) in text.lines().enumerate() {
        parser.feed(line_no, line);
    }
    parser.report
}

// ── Tests ─────────────────────────────────────────────────────────────────────
