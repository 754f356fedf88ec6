//! Parsing, reconciliation and analysis of monthly usage reports.
//!
//! Everything in this crate is synchronous and side-effect free apart from
//! the CSV loaders in [`reference`] and [`export`]. Fetching lives in
//! `insights-runtime`.

pub mod completer;
pub mod export;
pub mod insights;
pub mod meta;
pub mod reconcile;
pub mod reference;
pub mod relationship_report;
pub mod series;
pub mod usage_report;

pub use insights_core as core;

pub use reconcile::{reconcile, JoinReport, Reconciliation};
pub use reference::ReferenceTables;
pub use relationship_report::{parse_relationship_report, RelationshipReport};
pub use usage_report::{parse_usage_report, ParseStats, UsageReport};
