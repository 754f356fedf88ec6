mod bootstrap;

use std::collections::HashMap;
use std::time::Duration;

use anyhow::{Context, Result};
use insights_core::catalog::{display_thresholds, SPRITE_INDEX_URL};
use insights_core::formatting::{format_number, format_optional, format_percent, markdown_table};
use insights_core::models::ReconciledEntityPeriod;
use insights_core::settings::Settings;
use insights_core::Period;
use insights_data::export::{read_usage, ArtifactPaths};
use insights_data::insights::{aggregate, latest_period, snapshot, InsightOptions};
use insights_data::meta::MetaComparison;
use insights_data::series::top_n_series;
use insights_runtime::fetcher::FetchConfig;
use insights_runtime::source::{HttpReportSource, DEFAULT_REQUEST_TIMEOUT_SECS};
use insights_runtime::{run_pipeline, ImageSource, PipelineConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::load_with_last_used();

    bootstrap::ensure_directories()?;
    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("usage-insights v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "View: {}, Tier: {}, Ranking: {}, Top: {}",
        settings.view,
        settings.tier,
        settings.ranking,
        settings.top
    );

    match settings.view.as_str() {
        "scrape" => run_scrape(&settings).await?,
        "series" => run_series(&settings)?,
        "insights" => run_insights(&settings)?,
        unknown => {
            eprintln!("Unknown view mode: {}", unknown);
        }
    }

    Ok(())
}

// ── scrape ────────────────────────────────────────────────────────────────────

async fn run_scrape(settings: &Settings) -> Result<()> {
    let today = chrono::Local::now().date_naive();
    let range = settings.period_range(today)?;
    tracing::info!("Scraping {} to {} ({} months)", range.start, range.end, range.len());

    let images = match (&settings.sprites, &settings.sprite_index_url) {
        (Some(path), _) => ImageSource::Table(path.clone()),
        (None, Some(url)) => ImageSource::SpriteIndex(url.clone()),
        (None, None) => ImageSource::SpriteIndex(SPRITE_INDEX_URL.to_string()),
    };

    let config = PipelineConfig {
        fetch: FetchConfig {
            base_url: settings.base_url.clone(),
            concurrency: settings.concurrency as usize,
            request_delay: Duration::from_millis(settings.request_delay_ms),
            retries: settings.retries,
            timeout: Duration::from_secs(settings.fetch_timeout_secs),
            ..FetchConfig::default()
        },
        range,
        tiers: settings.tier_list(),
        thresholds: settings.threshold_list(),
        kinds: settings.report_kinds(),
        attributes: settings.attributes.clone(),
        images,
        out_dir: settings.out_dir.clone(),
    };

    let source = HttpReportSource::new(Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS))?;
    let report = run_pipeline(source, &config).await?;

    println!(
        "Fetched {} reports ({} not published, {} failed{})",
        report.fetch.succeeded,
        report.fetch.not_found,
        report.fetch.transient,
        if report.fetch.timed_out { ", timed out" } else { "" }
    );
    println!(
        "Wrote {} usage rows to {}",
        format_number(report.usage_rows as f64, 0),
        report.artifacts.usage.display()
    );
    if report.teammate_rows + report.check_rows > 0 {
        println!(
            "Wrote {} teammate and {} check rows",
            format_number(report.teammate_rows as f64, 0),
            format_number(report.check_rows as f64, 0)
        );
    }
    if !report.join.is_clean() {
        println!(
            "{} names without attributes, {} without images (see log)",
            report.join.missing_attribute_names.len(),
            report.join.missing_image_names.len()
        );
    }

    Ok(())
}

// ── series ────────────────────────────────────────────────────────────────────

fn load_rows(settings: &Settings) -> Result<Vec<ReconciledEntityPeriod>> {
    let path = ArtifactPaths::in_dir(&settings.out_dir).usage;
    read_usage(&path).with_context(|| {
        format!(
            "reading {} (run with --view scrape first)",
            path.display()
        )
    })
}

fn run_series(settings: &Settings) -> Result<()> {
    let rows = load_rows(settings)?;
    let tier = settings.tier.to_lowercase();

    if !display_thresholds(&tier).contains(&settings.ranking) {
        tracing::warn!(
            "Ranking {} is not one of the usual ladders for {} ({:?})",
            settings.ranking,
            tier,
            display_thresholds(&tier)
        );
    }

    let series = top_n_series(&rows, &tier, settings.ranking, settings.top as usize);
    let Some(range) = series.range else {
        println!("No data for {} at {}", tier, settings.ranking);
        return Ok(());
    };

    let months: Vec<Period> = range.iter().collect();
    let mut headers = vec!["Name".to_string()];
    headers.extend(months.iter().map(|m| m.to_string()));

    let usage: HashMap<(&str, Period), f64> = series
        .rows
        .iter()
        .map(|r| ((r.name.as_str(), r.period), r.usage_percent))
        .collect();
    let body: Vec<Vec<String>> = series
        .entities
        .iter()
        .map(|name| {
            let mut line = vec![name.clone()];
            line.extend(months.iter().map(|m| {
                usage
                    .get(&(name.as_str(), *m))
                    .map(|v| format_percent(*v, 2))
                    .unwrap_or_default()
            }));
            line
        })
        .collect();

    let header_refs: Vec<&str> = headers.iter().map(String::as_str).collect();
    println!(
        "Top {} of {} at {} by usage in {}\n",
        series.entities.len(),
        tier,
        settings.ranking,
        series.latest.map(|p| p.to_string()).unwrap_or_default()
    );
    println!("{}", markdown_table(&header_refs, &body));

    if let Some(meta) = MetaComparison::build(&rows, &tier, settings.ranking, settings.top as usize) {
        println!("{}", meta.to_markdown());
    }

    Ok(())
}

// ── insights ──────────────────────────────────────────────────────────────────

fn run_insights(settings: &Settings) -> Result<()> {
    let rows = load_rows(settings)?;
    let tier = settings.tier.to_lowercase();

    let period = match settings.snapshot_period()? {
        Some(p) => p,
        None => match latest_period(&rows, &tier, settings.ranking) {
            Some(p) => p,
            None => {
                println!("No data for {} at {}", tier, settings.ranking);
                return Ok(());
            }
        },
    };

    let snap = snapshot(&rows, &tier, settings.ranking, period, settings.usage_cutoff);
    let insights = aggregate(&snap, &InsightOptions::for_category(&tier));
    let unknown = || "Unknown".to_string();

    println!(
        "Interesting insights for {} at {} in {} ({} entities at or above {}%)\n",
        tier, settings.ranking, period, insights.rows, settings.usage_cutoff
    );
    println!(
        "Most common type in {}: {}",
        tier,
        insights.mode_tag.clone().unwrap_or_else(unknown)
    );
    println!(
        "Least common type in {}: {}",
        tier,
        insights.anti_mode_tag.clone().unwrap_or_else(unknown)
    );
    println!(
        "Highest BST in {}: {}",
        tier,
        insights
            .max_aggregate_entity
            .as_ref()
            .map(|e| format!("{} ({})", e.name, format_number(e.score, 0)))
            .unwrap_or_else(unknown)
    );
    println!(
        "Lowest BST in {}: {}",
        tier,
        insights
            .min_aggregate_entity
            .as_ref()
            .map(|e| format!("{} ({})", e.name, format_number(e.score, 0)))
            .unwrap_or_else(unknown)
    );
    println!(
        "Average BST of {}: {}",
        tier,
        format_optional(insights.mean_aggregate_score.map(f64::round), 0)
    );

    Ok(())
}
