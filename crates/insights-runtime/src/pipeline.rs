//! End-to-end scrape: reference tables, fetch, parse, reconcile, export.

use std::path::PathBuf;

use insights_core::models::{CheckRow, ImageReference, ReportKind, TeammateRow, UsageRow};
use insights_core::{PeriodRange, Result};
use insights_data::export::{write_checks, write_teammates, write_usage, ArtifactPaths};
use insights_data::reference::{load_attributes, load_images, parse_sprite_index};
use insights_data::{
    parse_relationship_report, parse_usage_report, reconcile, JoinReport, ParseStats,
    ReferenceTables,
};

use crate::fetcher::{enumerate_tasks, FetchConfig, FetchSummary, ReportFetcher};
use crate::source::{FetchOutcome, ReportSource};

/// Where image references come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A CSV table with `Name` and `Image URL` / `Sprite Links`.
    Table(PathBuf),
    /// A sprite index page to scrape.
    SpriteIndex(String),
    None,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub fetch: FetchConfig,
    pub range: PeriodRange,
    pub tiers: Vec<String>,
    pub thresholds: Vec<u32>,
    pub kinds: Vec<ReportKind>,
    pub attributes: PathBuf,
    pub images: ImageSource,
    pub out_dir: PathBuf,
}

/// What a run produced, for the final summary.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub fetch: FetchSummary,
    pub usage_parse: ParseStats,
    pub relationship_parse: ParseStats,
    pub join: JoinReport,
    pub usage_rows: usize,
    pub teammate_rows: usize,
    pub check_rows: usize,
    pub artifacts: ArtifactPaths,
}

impl PipelineReport {
    pub fn log(&self) {
        tracing::info!(
            parsed = self.usage_parse.rows_parsed,
            skipped = self.usage_parse.rows_skipped,
            "Usage rows"
        );
        tracing::info!(
            parsed = self.relationship_parse.rows_parsed,
            skipped = self.relationship_parse.rows_skipped,
            "Relationship rows"
        );
        self.join.log_summary();
    }
}

/// Run the whole scrape against `source` and write the artifacts.
///
/// Missing or failing reports are skipped. Fails on unreadable reference
/// tables, on a duplicate usage key, or when an artifact cannot be written.
pub async fn run_pipeline<S>(source: S, config: &PipelineConfig) -> Result<PipelineReport>
where
    S: ReportSource + 'static,
{
    let attributes = load_attributes(&config.attributes)?;
    let images = load_image_references(&source, &config.images).await?;
    let tables = ReferenceTables::new(attributes, images);
    tracing::info!(
        attributes = tables.attribute_count(),
        images = tables.image_count(),
        "Reference tables ready"
    );

    let tasks = enumerate_tasks(config.range, &config.tiers, &config.thresholds, &config.kinds);
    let fetcher = ReportFetcher::new(source, config.fetch.clone());
    let results = fetcher.run(tasks).await;

    let mut usage_rows: Vec<UsageRow> = Vec::new();
    let mut usage_parse = ParseStats::default();
    for (coordinate, body) in results.successes(ReportKind::Usage) {
        let report = parse_usage_report(body, coordinate);
        tracing::debug!(coordinate = %coordinate, rows = report.rows.len(), "parsed usage report");
        usage_parse.merge(report.stats);
        usage_rows.extend(report.rows);
    }

    let mut teammates: Vec<TeammateRow> = Vec::new();
    let mut checks: Vec<CheckRow> = Vec::new();
    let mut relationship_parse = ParseStats::default();
    for (coordinate, body) in results.successes(ReportKind::Moveset) {
        let report = parse_relationship_report(body, coordinate);
        relationship_parse.merge(report.stats);
        teammates.extend(report.teammates);
        checks.extend(report.checks);
    }

    let reconciliation = reconcile(&usage_rows, &tables)?;

    let artifacts = ArtifactPaths::in_dir(&config.out_dir);
    write_usage(&artifacts.usage, &reconciliation.rows)?;
    if config.kinds.contains(&ReportKind::Moveset) {
        write_teammates(&artifacts.teammates, &teammates)?;
        write_checks(&artifacts.checks, &checks)?;
    }

    let report = PipelineReport {
        fetch: results.summary,
        usage_parse,
        relationship_parse,
        join: reconciliation.report,
        usage_rows: reconciliation.rows.len(),
        teammate_rows: teammates.len(),
        check_rows: checks.len(),
        artifacts,
    };
    report.log();
    Ok(report)
}

/// Image references from a table, the sprite index, or nowhere. A sprite
/// index that cannot be fetched only costs the image column.
async fn load_image_references<S: ReportSource>(
    source: &S,
    images: &ImageSource,
) -> Result<Vec<ImageReference>> {
    match images {
        ImageSource::Table(path) => load_images(path),
        ImageSource::SpriteIndex(url) => match source.fetch(url).await {
            FetchOutcome::Success(html) => {
                let cards = parse_sprite_index(&html);
                tracing::info!("Loaded {} sprites from {}", cards.len(), url);
                Ok(cards)
            }
            FetchOutcome::NotFound => {
                tracing::warn!("Sprite index {} not found; continuing without images", url);
                Ok(Vec::new())
            }
            FetchOutcome::Transient(reason) => {
                tracing::warn!("Sprite index {} failed ({}); continuing without images", url, reason);
                Ok(Vec::new())
            }
        },
        ImageSource::None => Ok(Vec::new()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
