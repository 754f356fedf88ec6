//! Shared foundation for the usage-insights crates.
//!
//! Domain models, calendar-month arithmetic, the identity normaliser used for
//! every cross-source join, the static archive catalogue, configuration and
//! the common error type.

pub mod catalog;
pub mod error;
pub mod formatting;
pub mod identity;
pub mod models;
pub mod period;
pub mod settings;

pub use error::{InsightsError, Result};
pub use period::{Period, PeriodRange};
