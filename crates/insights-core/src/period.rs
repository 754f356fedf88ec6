//! Calendar-month arithmetic.
//!
//! Reports are published once per month, so the whole pipeline is keyed by
//! [`Period`] rather than by timestamps.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::InsightsError;

// ── Period ────────────────────────────────────────────────────────────────────

/// A single calendar month, displayed and parsed as `YYYY-MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    /// Build a period, rejecting months outside `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    /// Compile-time constructor for months known to be valid.
    pub(crate) const fn known(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// The month containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The most recently *completed* month relative to `today`.
    ///
    /// Upstream publishes a month's report only after it ends, so this is the
    /// first day of the current month minus one month.
    pub fn last_completed(today: NaiveDate) -> Self {
        Self::from_date(today).pred()
    }

    /// The following month.
    pub fn succ(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month.
    pub fn pred(&self) -> Self {
        if self.month == 1 {
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Number of whole months from `self` to `other` (negative when `other`
    /// is earlier).
    pub fn months_until(&self, other: &Period) -> i64 {
        (other.year as i64 - self.year as i64) * 12 + (other.month as i64 - self.month as i64)
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = InsightsError;

    /// Accepts `YYYY-MM`; a trailing `-DD` day component is tolerated and
    /// dropped so spreadsheet-style dates read back cleanly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let mut parts = trimmed.splitn(3, '-');
        let year = parts.next().and_then(|y| {
            (y.len() == 4).then_some(y)?.parse::<i32>().ok()
        });
        let month = parts.next().and_then(|m| {
            (m.len() == 2).then_some(m)?.parse::<u32>().ok()
        });
        let day_ok = match parts.next() {
            None => true,
            Some(d) => d.get(..2).map(|dd| dd.parse::<u32>().is_ok()).unwrap_or(false),
        };

        match (year, month, day_ok) {
            (Some(y), Some(m), true) => {
                Period::new(y, m).ok_or_else(|| InsightsError::InvalidPeriod(s.to_string()))
            }
            _ => Err(InsightsError::InvalidPeriod(s.to_string())),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = InsightsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}

// ── PeriodRange ───────────────────────────────────────────────────────────────

/// An inclusive, monthly-stepped range of periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodRange {
    pub start: Period,
    pub end: Period,
}

impl PeriodRange {
    /// Build a range; an inverted range is empty rather than an error.
    pub fn new(start: Period, end: Period) -> Self {
        Self { start, end }
    }

    /// Smallest range covering every period yielded by `periods`, or `None`
    /// when the iterator is empty.
    pub fn spanning<I>(periods: I) -> Option<Self>
    where
        I: IntoIterator<Item = Period>,
    {
        let mut iter = periods.into_iter();
        let first = iter.next()?;
        let (start, end) = iter.fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p)));
        Some(Self { start, end })
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    /// Number of months in the range.
    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            (self.start.months_until(&self.end) + 1) as usize
        }
    }

    /// Every month of the range in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = Period> {
        let end = self.end;
        let len = self.len();
        std::iter::successors(Some(self.start), |p| Some(p.succ()))
            .take(len)
            .take_while(move |p| *p <= end)
    }

    /// Every month of the range in descending order (newest first), the
    /// order the scraper walks the archive in.
    pub fn iter_rev(&self) -> impl Iterator<Item = Period> {
        let start = self.start;
        let len = self.len();
        std::iter::successors(Some(self.end), |p| Some(p.pred()))
            .take(len)
            .take_while(move |p| *p >= start)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn p(s: &str) -> Period {
        s.parse().unwrap()
    }

    // ── parsing / display ─────────────────────────────────────────────────

    #[test]
    fn test_parse_and_display_round_trip() {
        assert_eq!(p("2023-05").to_string(), "2023-05");
        assert_eq!(p("2022-10"), Period::new(2022, 10).unwrap());
    }

    #[test]
    fn test_parse_accepts_day_suffix() {
        assert_eq!(p("2024-06-01"), Period::new(2024, 6).unwrap());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("2024-13".parse::<Period>().is_err());
        assert!("2024-6".parse::<Period>().is_err());
        assert!("June 2024".parse::<Period>().is_err());
        assert!("".parse::<Period>().is_err());
    }

    // ── arithmetic ────────────────────────────────────────────────────────

    #[test]
    fn test_succ_and_pred_wrap_years() {
        assert_eq!(p("2023-12").succ(), p("2024-01"));
        assert_eq!(p("2024-01").pred(), p("2023-12"));
    }

    #[test]
    fn test_last_completed_is_previous_month() {
        let today = NaiveDate::from_ymd_opt(2024, 7, 15).unwrap();
        assert_eq!(Period::last_completed(today), p("2024-06"));

        let new_year = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        assert_eq!(Period::last_completed(new_year), p("2024-12"));
    }

    #[test]
    fn test_months_until() {
        assert_eq!(p("2022-10").months_until(&p("2023-01")), 3);
        assert_eq!(p("2023-01").months_until(&p("2022-10")), -3);
    }

    // ── ranges ────────────────────────────────────────────────────────────

    #[test]
    fn test_range_iter_inclusive() {
        let range = PeriodRange::new(p("2023-11"), p("2024-02"));
        let months: Vec<String> = range.iter().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2023-11", "2023-12", "2024-01", "2024-02"]);
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_range_iter_rev() {
        let range = PeriodRange::new(p("2023-11"), p("2024-01"));
        let months: Vec<String> = range.iter_rev().map(|m| m.to_string()).collect();
        assert_eq!(months, vec!["2024-01", "2023-12", "2023-11"]);
    }

    #[test]
    fn test_inverted_range_is_empty() {
        let range = PeriodRange::new(p("2024-02"), p("2024-01"));
        assert!(range.is_empty());
        assert_eq!(range.len(), 0);
        assert_eq!(range.iter().count(), 0);
    }

    #[test]
    fn test_spanning() {
        let range = PeriodRange::spanning([p("2023-05"), p("2023-04"), p("2023-06")]).unwrap();
        assert_eq!(range.start, p("2023-04"));
        assert_eq!(range.end, p("2023-06"));
        assert!(PeriodRange::spanning(Vec::<Period>::new()).is_none());
    }

    #[test]
    fn test_serde_as_string() {
        let json = serde_json::to_string(&p("2024-06")).unwrap();
        assert_eq!(json, "\"2024-06\"");
        let back: Period = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p("2024-06"));
    }
}
