//! Async side of usage-insights: fetching reports and driving a full scrape.

pub mod fetcher;
pub mod pipeline;
pub mod rate_limiter;
pub mod source;

pub use insights_core as core;
pub use insights_data as data;

pub use fetcher::{FetchConfig, FetchResults, FetchSummary, FetchTask, ReportFetcher};
pub use pipeline::{run_pipeline, ImageSource, PipelineConfig, PipelineReport};
pub use source::{FetchOutcome, HttpReportSource, ReportSource};
