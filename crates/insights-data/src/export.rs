//! CSV artifacts written at the end of a scrape and read back by the views.
//!
//! Column names are the interchange contract with downstream consumers.
//! Null fields are written as empty cells.

use std::fs;
use std::path::{Path, PathBuf};

use insights_core::models::{BaseStats, CheckRow, ReconciledEntityPeriod, TeammateRow};
use insights_core::{InsightsError, Period, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::info;

use crate::reconcile::labeled_threshold;

pub const USAGE_FILE: &str = "usage_data.csv";
pub const TEAMMATES_FILE: &str = "teammates_data.csv";
pub const CHECKS_FILE: &str = "checks_data.csv";

pub const USAGE_HEADERS: &[&str] = &[
    "Name",
    "Tier",
    "Month",
    "Ranking",
    "Usage Rate",
    "Sprite Links",
    "HP",
    "Attack",
    "Defense",
    "Sp.Attack",
    "Sp.Defense",
    "Speed",
    "Type1",
    "Type2",
    "BST",
];
pub const TEAMMATE_HEADERS: &[&str] = &["Pokemon", "Teammate", "Usage %", "Month", "Tier", "Rating"];
pub const CHECK_HEADERS: &[&str] = &[
    "Pokemon",
    "Check",
    "Usage %",
    "Performance",
    "Month",
    "Tier",
    "Rating",
];

/// Locations of the three artifacts inside an output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub usage: PathBuf,
    pub teammates: PathBuf,
    pub checks: PathBuf,
}

impl ArtifactPaths {
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            usage: dir.join(USAGE_FILE),
            teammates: dir.join(TEAMMATES_FILE),
            checks: dir.join(CHECKS_FILE),
        }
    }
}

// ── Row layouts ───────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct UsageRecord {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "Tier")]
    tier: String,
    #[serde(rename = "Month")]
    month: Period,
    #[serde(rename = "Ranking")]
    ranking: u32,
    #[serde(rename = "Usage Rate")]
    usage_rate: f64,
    #[serde(rename = "Sprite Links")]
    sprite_link: Option<String>,
    #[serde(rename = "HP")]
    hp: Option<f64>,
    #[serde(rename = "Attack")]
    attack: Option<f64>,
    #[serde(rename = "Defense")]
    defense: Option<f64>,
    #[serde(rename = "Sp.Attack")]
    sp_attack: Option<f64>,
    #[serde(rename = "Sp.Defense")]
    sp_defense: Option<f64>,
    #[serde(rename = "Speed")]
    speed: Option<f64>,
    #[serde(rename = "Type1")]
    type1: Option<String>,
    #[serde(rename = "Type2")]
    type2: Option<String>,
    #[serde(rename = "BST")]
    bst: Option<f64>,
}

impl From<&ReconciledEntityPeriod> for UsageRecord {
    fn from(r: &ReconciledEntityPeriod) -> Self {
        Self {
            name: r.name.clone(),
            tier: r.category.clone(),
            month: r.period,
            ranking: r.rank_threshold,
            usage_rate: r.usage_percent,
            sprite_link: r.image_url.clone(),
            hp: r.stats.hp,
            attack: r.stats.attack,
            defense: r.stats.defense,
            sp_attack: r.stats.sp_attack,
            sp_defense: r.stats.sp_defense,
            speed: r.stats.speed,
            type1: r.primary_tag.clone(),
            type2: r.secondary_tag.clone(),
            bst: r.aggregate_score,
        }
    }
}

impl From<UsageRecord> for ReconciledEntityPeriod {
    fn from(r: UsageRecord) -> Self {
        Self {
            name: r.name,
            category: r.tier,
            period: r.month,
            rank_threshold: r.ranking,
            usage_percent: r.usage_rate,
            stats: BaseStats {
                hp: r.hp,
                attack: r.attack,
                defense: r.defense,
                sp_attack: r.sp_attack,
                sp_defense: r.sp_defense,
                speed: r.speed,
            },
            primary_tag: r.type1,
            secondary_tag: r.type2,
            aggregate_score: r.bst,
            image_url: r.sprite_link,
        }
    }
}

#[derive(Debug, Serialize)]
struct TeammateRecord<'a> {
    #[serde(rename = "Pokemon")]
    pokemon: &'a str,
    #[serde(rename = "Teammate")]
    teammate: &'a str,
    #[serde(rename = "Usage %")]
    usage: f64,
    #[serde(rename = "Month")]
    month: Period,
    #[serde(rename = "Tier")]
    tier: &'a str,
    #[serde(rename = "Rating")]
    rating: u32,
}

#[derive(Debug, Serialize)]
struct CheckRecord<'a> {
    #[serde(rename = "Pokemon")]
    pokemon: &'a str,
    #[serde(rename = "Check")]
    check: &'a str,
    #[serde(rename = "Usage %")]
    usage: f64,
    #[serde(rename = "Performance")]
    performance: &'a str,
    #[serde(rename = "Month")]
    month: Period,
    #[serde(rename = "Tier")]
    tier: &'a str,
    #[serde(rename = "Rating")]
    rating: u32,
}

// ── Writing ───────────────────────────────────────────────────────────────────

/// Serialise `records` to `path` through a temp file and rename.
///
/// `headers` is written first, so an artifact with no rows still names its
/// columns. Field order of `T` must match it.
fn write_records<T, I>(path: &Path, headers: &[&str], records: I) -> Result<usize>
where
    T: Serialize,
    I: IntoIterator<Item = T>,
{
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("csv.tmp");

    let mut count = 0usize;
    {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_path(&tmp)?;
        wtr.write_record(headers)?;
        for record in records {
            wtr.serialize(record)?;
            count += 1;
        }
        wtr.flush()?;
    }
    fs::rename(&tmp, path)?;

    info!("Wrote {} rows to {}", count, path.display());
    Ok(count)
}

pub fn write_usage(path: &Path, rows: &[ReconciledEntityPeriod]) -> Result<usize> {
    write_records(path, USAGE_HEADERS, rows.iter().map(UsageRecord::from))
}

pub fn write_teammates(path: &Path, rows: &[TeammateRow]) -> Result<usize> {
    write_records(
        path,
        TEAMMATE_HEADERS,
        rows.iter().map(|r| TeammateRecord {
            pokemon: &r.subject,
            teammate: &r.partner,
            usage: r.co_occurrence_percent,
            month: r.coordinate.period,
            tier: &r.coordinate.category,
            rating: labeled_threshold(&r.coordinate),
        }),
    )
}

pub fn write_checks(path: &Path, rows: &[CheckRow]) -> Result<usize> {
    write_records(
        path,
        CHECK_HEADERS,
        rows.iter().map(|r| CheckRecord {
            pokemon: &r.subject,
            check: &r.opponent,
            usage: r.effectiveness_score,
            performance: &r.performance,
            month: r.coordinate.period,
            tier: &r.coordinate.category,
            rating: labeled_threshold(&r.coordinate),
        }),
    )
}

// ── Reading ───────────────────────────────────────────────────────────────────

fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = fs::File::open(path).map_err(|source| InsightsError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = csv::Reader::from_reader(file);
    let mut out = Vec::new();
    for result in rdr.deserialize() {
        out.push(result?);
    }
    Ok(out)
}

/// Read a usage artifact back into reconciled rows.
pub fn read_usage(path: &Path) -> Result<Vec<ReconciledEntityPeriod>> {
    let records: Vec<UsageRecord> = read_records(path)?;
    Ok(records.into_iter().map(ReconciledEntityPeriod::from).collect())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
