use chrono::NaiveDate;
use clap::{CommandFactory, Parser};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::{DEFAULT_TIERS, LADDER_THRESHOLDS, STATS_BASE_URL};
use crate::error::{InsightsError, Result};
use crate::models::ReportKind;
use crate::period::{Period, PeriodRange};

/// Sizes offered by the series view.
pub const TOP_CHOICES: &[u32] = &[5, 10, 25];

fn parse_top(value: &str) -> std::result::Result<u32, String> {
    match value.parse::<u32>() {
        Ok(n) if TOP_CHOICES.contains(&n) => Ok(n),
        _ => Err(format!("expected one of {:?}", TOP_CHOICES)),
    }
}

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Monthly competitive usage statistics: scrape, reconcile, explore
#[derive(Parser, Debug, Clone)]
#[command(
    name = "usage-insights",
    about = "Scrape and reconcile monthly competitive usage statistics",
    version
)]
pub struct Settings {
    /// What to do: scrape the archive, print a top-N series, or print tier insights
    #[arg(long, default_value = "scrape", value_parser = ["scrape", "series", "insights"])]
    pub view: String,

    /// First month to scrape (YYYY-MM)
    #[arg(long, default_value = "2022-10")]
    pub start_month: String,

    /// Last month to scrape (YYYY-MM); defaults to the last completed month
    #[arg(long)]
    pub end_month: Option<String>,

    /// Tiers to scrape (comma separated); defaults to the built-in list
    #[arg(long, value_delimiter = ',')]
    pub tiers: Vec<String>,

    /// Ladder thresholds to scrape (comma separated); defaults to all known
    #[arg(long, value_delimiter = ',')]
    pub thresholds: Vec<u32>,

    /// Report kinds to scrape
    #[arg(long, value_delimiter = ',', value_parser = ["usage", "moveset"])]
    pub kinds: Vec<String>,

    /// Concurrent fetch workers (1-64)
    #[arg(long, default_value = "8", value_parser = clap::value_parser!(u32).range(1..=64))]
    pub concurrency: u32,

    /// Minimum delay between two upstream requests, in milliseconds
    #[arg(long, default_value = "1000")]
    pub request_delay_ms: u64,

    /// Extra attempts for a report that failed transiently
    #[arg(long, default_value = "2")]
    pub retries: u32,

    /// Upper bound on the whole fetch phase, in seconds
    #[arg(long, default_value = "7200")]
    pub fetch_timeout_secs: u64,

    /// Root URL of the statistics archive
    #[arg(long, default_value = STATS_BASE_URL)]
    pub base_url: String,

    /// Attribute table (CSV with Name, HP, Attack, ... Type1, Type2)
    #[arg(long, default_value = "list_of_pokemon_df.csv")]
    pub attributes: PathBuf,

    /// Image table (CSV with Name, Image URL)
    #[arg(long)]
    pub sprites: Option<PathBuf>,

    /// Sprite index page scraped when no image table is given
    #[arg(long)]
    pub sprite_index_url: Option<String>,

    /// Directory the CSV artifacts are written to and read from
    #[arg(long, default_value = "out")]
    pub out_dir: PathBuf,

    /// Tier shown by the series and insights views
    #[arg(long, default_value = "gen9ou")]
    pub tier: String,

    /// Ladder label shown by the series and insights views
    #[arg(long, default_value = "1000")]
    pub ranking: u32,

    /// Number of entities in the series view (5, 10 or 25)
    #[arg(long, default_value = "5", value_parser = parse_top)]
    pub top: u32,

    /// Month the insights are computed over; defaults to the latest month
    #[arg(long)]
    pub snapshot_month: Option<String>,

    /// Minimum usage (%) for an entity to count towards tier insights
    #[arg(long, default_value = "3.406")]
    pub usage_cutoff: f64,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Clear saved configuration
    #[arg(long)]
    pub clear: bool,
}

// ── LastUsedParams ─────────────────────────────────────────────────────────────

/// Persisted last-used view parameters saved to `~/.usage-insights/last_used.json`.
#[derive(Debug, Serialize, Deserialize, Default, Clone)]
pub struct LastUsedParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_dir: Option<PathBuf>,
}

impl LastUsedParams {
    /// Default path of the persisted config file.
    pub fn config_path() -> PathBuf {
        Self::config_path_in(&dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    /// Config path rooted at `base_dir` (used for testing).
    pub fn config_path_in(base_dir: &std::path::Path) -> PathBuf {
        base_dir.join(".usage-insights").join("last_used.json")
    }

    /// Load persisted params from an explicit path.
    /// Returns `Default` when the file is absent or cannot be parsed.
    pub fn load_from(path: &std::path::Path) -> Self {
        let Ok(content) = std::fs::read_to_string(path) else {
            return Self::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Atomically write params to `path`, creating parent directories if needed.
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, &json)?;
        std::fs::rename(&tmp, path)?;

        Ok(())
    }

    /// Delete the config file at `path` if it exists.
    pub fn clear_at(path: &std::path::Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse CLI arguments, merge with last-used params where no explicit CLI
    /// value was provided, and persist the result.
    pub fn load_with_last_used() -> Self {
        Self::load_with_last_used_impl(
            std::env::args_os().collect(),
            &LastUsedParams::config_path(),
        )
    }

    /// Same as [`Settings::load_with_last_used`] but with an explicit argument
    /// list and config path so tests can redirect to a temporary directory.
    pub fn load_with_last_used_impl(
        args: Vec<std::ffi::OsString>,
        config_path: &std::path::Path,
    ) -> Self {
        let matches = Settings::command().get_matches_from(args.clone());
        let mut settings = Settings::parse_from(args);

        if settings.clear {
            if let Err(e) = LastUsedParams::clear_at(config_path) {
                tracing::warn!(error = %e, "could not clear saved configuration");
            }
            return Self::apply_debug(settings);
        }

        let last = LastUsedParams::load_from(config_path);

        // CLI always wins over persisted values.
        if !is_arg_explicitly_set(&matches, "tier") {
            if let Some(v) = last.tier {
                settings.tier = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "ranking") {
            if let Some(v) = last.ranking {
                settings.ranking = v;
            }
        }
        if !is_arg_explicitly_set(&matches, "top") {
            if let Some(v) = last.top.filter(|v| TOP_CHOICES.contains(v)) {
                settings.top = v;
            }
        }
        // NOTE: clap stores the arg id using the field name, not the flag spelling.
        if !is_arg_explicitly_set(&matches, "out_dir") {
            if let Some(v) = last.out_dir {
                settings.out_dir = v;
            }
        }

        settings = Self::apply_debug(settings);

        if let Err(e) = LastUsedParams::from(&settings).save_to(config_path) {
            tracing::debug!(error = %e, "could not persist last-used parameters");
        }

        settings
    }

    fn apply_debug(mut settings: Settings) -> Settings {
        if settings.debug {
            settings.log_level = "DEBUG".to_string();
        }
        settings
    }

    // ── Resolved views of the raw flags ───────────────────────────────────

    /// Months to scrape: `start_month` through `end_month`, or through the
    /// last completed month relative to `today`.
    pub fn period_range(&self, today: NaiveDate) -> Result<PeriodRange> {
        let start: Period = self.start_month.parse()?;
        let end = match &self.end_month {
            Some(s) => s.parse()?,
            None => Period::last_completed(today),
        };
        if start > end {
            return Err(InsightsError::Config(format!(
                "start month {} is after end month {}",
                start, end
            )));
        }
        Ok(PeriodRange::new(start, end))
    }

    /// Tiers to scrape, falling back to the built-in list.
    pub fn tier_list(&self) -> Vec<String> {
        if self.tiers.is_empty() {
            DEFAULT_TIERS.iter().map(|t| t.to_string()).collect()
        } else {
            self.tiers.iter().map(|t| t.trim().to_lowercase()).collect()
        }
    }

    /// Ladder thresholds to scrape, falling back to every known cut-off.
    pub fn threshold_list(&self) -> Vec<u32> {
        if self.thresholds.is_empty() {
            LADDER_THRESHOLDS.to_vec()
        } else {
            self.thresholds.clone()
        }
    }

    /// Report kinds to scrape; both when none were named.
    pub fn report_kinds(&self) -> Vec<ReportKind> {
        let kinds: Vec<ReportKind> = self
            .kinds
            .iter()
            .filter_map(|k| ReportKind::parse(k))
            .collect();
        if kinds.is_empty() {
            vec![ReportKind::Usage, ReportKind::Moveset]
        } else {
            kinds
        }
    }

    /// Explicit snapshot month for the insights view, if one was given.
    pub fn snapshot_period(&self) -> Result<Option<Period>> {
        self.snapshot_month.as_deref().map(str::parse::<Period>).transpose()
    }
}

// ── Conversion ─────────────────────────────────────────────────────────────────

impl From<&Settings> for LastUsedParams {
    fn from(s: &Settings) -> Self {
        LastUsedParams {
            tier: Some(s.tier.clone()),
            ranking: Some(s.ranking),
            top: Some(s.top),
            out_dir: Some(s.out_dir.clone()),
        }
    }
}

/// Returns `true` when `name` was supplied explicitly on the command line
/// (not via default value or environment variable).
fn is_arg_explicitly_set(matches: &clap::ArgMatches, name: &str) -> bool {
    matches.value_source(name) == Some(clap::parser::ValueSource::CommandLine)
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn tmp_config_path(tmp: &TempDir) -> PathBuf {
        LastUsedParams::config_path_in(tmp.path())
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // ── LastUsedParams ────────────────────────────────────────────────────────

    #[test]
    fn test_last_used_params_save_load() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        let params = LastUsedParams {
            tier: Some("gen9uu".to_string()),
            ranking: Some(1500),
            top: Some(10),
            out_dir: Some(PathBuf::from("/data/out")),
        };
        params.save_to(&path).expect("save");

        let loaded = LastUsedParams::load_from(&path);
        assert_eq!(loaded.tier, Some("gen9uu".to_string()));
        assert_eq!(loaded.ranking, Some(1500));
        assert_eq!(loaded.top, Some(10));
        assert_eq!(loaded.out_dir, Some(PathBuf::from("/data/out")));
    }

    #[test]
    fn test_last_used_params_default_when_missing() {
        let tmp = TempDir::new().expect("tempdir");
        let loaded = LastUsedParams::load_from(&tmp_config_path(&tmp));
        assert!(loaded.tier.is_none());
        assert!(loaded.ranking.is_none());
        assert!(loaded.top.is_none());
        assert!(loaded.out_dir.is_none());
    }

    #[test]
    fn test_last_used_params_clear() {
        let tmp = TempDir::new().expect("tempdir");
        let path = tmp_config_path(&tmp);
        LastUsedParams::default().save_to(&path).expect("save");
        assert!(path.exists());

        LastUsedParams::clear_at(&path).expect("clear");
        assert!(!path.exists());
    }

    // ── defaults / parsing ────────────────────────────────────────────────────

    #[test]
    fn test_settings_default_values() {
        let settings = Settings::parse_from(["usage-insights"]);

        assert_eq!(settings.view, "scrape");
        assert_eq!(settings.start_month, "2022-10");
        assert!(settings.end_month.is_none());
        assert!(settings.tiers.is_empty());
        assert_eq!(settings.concurrency, 8);
        assert_eq!(settings.request_delay_ms, 1000);
        assert_eq!(settings.retries, 2);
        assert_eq!(settings.base_url, STATS_BASE_URL);
        assert_eq!(settings.tier, "gen9ou");
        assert_eq!(settings.ranking, 1000);
        assert_eq!(settings.top, 5);
        assert!((settings.usage_cutoff - 3.406).abs() < f64::EPSILON);
        assert_eq!(settings.log_level, "INFO");
        assert!(!settings.debug);
    }

    #[test]
    fn test_settings_comma_separated_lists() {
        let settings = Settings::parse_from([
            "usage-insights",
            "--tiers",
            "gen9ou,GEN9UU",
            "--thresholds",
            "0,1825",
            "--kinds",
            "usage",
        ]);
        assert_eq!(settings.tier_list(), vec!["gen9ou", "gen9uu"]);
        assert_eq!(settings.threshold_list(), vec![0, 1825]);
        assert_eq!(settings.report_kinds(), vec![ReportKind::Usage]);
    }

    #[test]
    fn test_settings_list_fallbacks() {
        let settings = Settings::parse_from(["usage-insights"]);
        assert_eq!(settings.tier_list().len(), DEFAULT_TIERS.len());
        assert_eq!(settings.threshold_list(), LADDER_THRESHOLDS.to_vec());
        assert_eq!(
            settings.report_kinds(),
            vec![ReportKind::Usage, ReportKind::Moveset]
        );
    }

    #[test]
    fn test_settings_rejects_out_of_range_concurrency() {
        let result = Settings::try_parse_from(["usage-insights", "--concurrency", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_settings_top_accepts_only_offered_sizes() {
        for top in ["5", "10", "25"] {
            let settings = Settings::try_parse_from(["usage-insights", "--top", top]).unwrap();
            assert_eq!(settings.top.to_string(), top);
        }
        assert!(Settings::try_parse_from(["usage-insights", "--top", "7"]).is_err());
        assert!(Settings::try_parse_from(["usage-insights", "--top", "100"]).is_err());
    }

    // ── period range ──────────────────────────────────────────────────────────

    #[test]
    fn test_period_range_defaults_to_last_completed_month() {
        let settings = Settings::parse_from(["usage-insights"]);
        let range = settings.period_range(day(2023, 2, 10)).unwrap();
        assert_eq!(range.start.to_string(), "2022-10");
        assert_eq!(range.end.to_string(), "2023-01");
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_period_range_explicit_end() {
        let settings = Settings::parse_from([
            "usage-insights",
            "--start-month",
            "2024-01",
            "--end-month",
            "2024-03",
        ]);
        let range = settings.period_range(day(2026, 1, 1)).unwrap();
        assert_eq!(range.len(), 3);
    }

    #[test]
    fn test_period_range_rejects_inverted() {
        let settings = Settings::parse_from([
            "usage-insights",
            "--start-month",
            "2024-05",
            "--end-month",
            "2024-03",
        ]);
        assert!(settings.period_range(day(2026, 1, 1)).is_err());
    }

    #[test]
    fn test_snapshot_period() {
        let settings = Settings::parse_from(["usage-insights", "--snapshot-month", "2024-06"]);
        assert_eq!(
            settings.snapshot_period().unwrap().map(|p| p.to_string()),
            Some("2024-06".to_string())
        );
        let none = Settings::parse_from(["usage-insights"]);
        assert!(none.snapshot_period().unwrap().is_none());
    }

    // ── load_with_last_used ───────────────────────────────────────────────────

    #[test]
    fn test_load_with_last_used_merges_persisted_tier() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            tier: Some("gen4ou".to_string()),
            top: Some(25),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["usage-insights".into()], &config_path);
        assert_eq!(settings.tier, "gen4ou");
        assert_eq!(settings.top, 25);
    }

    #[test]
    fn test_load_with_last_used_ignores_unoffered_persisted_top() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            top: Some(7),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings =
            Settings::load_with_last_used_impl(vec!["usage-insights".into()], &config_path);
        assert_eq!(settings.top, 5);
    }

    #[test]
    fn test_load_with_last_used_cli_overrides_persisted() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams {
            tier: Some("gen4ou".to_string()),
            ..Default::default()
        }
        .save_to(&config_path)
        .expect("save");

        let settings = Settings::load_with_last_used_impl(
            vec!["usage-insights".into(), "--tier".into(), "gen9uu".into()],
            &config_path,
        );
        assert_eq!(settings.tier, "gen9uu");
    }

    #[test]
    fn test_load_with_last_used_clear_removes_file() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);
        LastUsedParams::default()
            .save_to(&config_path)
            .expect("save");

        Settings::load_with_last_used_impl(
            vec!["usage-insights".into(), "--clear".into()],
            &config_path,
        );
        assert!(!config_path.exists());
    }

    #[test]
    fn test_load_with_last_used_debug_overrides_log_level() {
        let tmp = TempDir::new().expect("tempdir");
        let settings = Settings::load_with_last_used_impl(
            vec!["usage-insights".into(), "--debug".into()],
            &tmp_config_path(&tmp),
        );
        assert_eq!(settings.log_level, "DEBUG");
    }

    #[test]
    fn test_load_with_last_used_persists_after_run() {
        let tmp = TempDir::new().expect("tempdir");
        let config_path = tmp_config_path(&tmp);

        Settings::load_with_last_used_impl(
            vec!["usage-insights".into(), "--ranking".into(), "1500".into()],
            &config_path,
        );

        let loaded = LastUsedParams::load_from(&config_path);
        assert_eq!(loaded.ranking, Some(1500));
    }
}
