use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the usage-insights pipeline.
///
/// Expected absences (a report that does not exist upstream, a malformed
/// table row, a name missing from the reference tables) are *not* errors;
/// they are represented as outcomes and counters by the components that
/// encounter them.
#[derive(Error, Debug)]
pub enum InsightsError {
    /// A file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A CSV document could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A period string did not match `YYYY-MM`.
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),

    /// Two usage rows resolved to the same unique key.
    #[error("Duplicate usage row for {key}: usage {first} conflicts with {second}")]
    DuplicateKey {
        key: String,
        first: f64,
        second: f64,
    },

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    HttpClient(String),

    /// A reference table is missing a required column.
    #[error("Missing column {column} in {path}")]
    MissingColumn { column: String, path: PathBuf },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Convenience alias used throughout the insights crates.
pub type Result<T> = std::result::Result<T, InsightsError>;
