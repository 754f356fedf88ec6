//! Static reference tables: per-entity base attributes and sprite images.
//!
//! Both tables are loaded once per run, keyed by normalised name, and then
//! only read. Duplicate names keep the first row seen.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use insights_core::identity::normalize;
use insights_core::models::{AttributeRecord, BaseStats, ImageReference};
use insights_core::{InsightsError, Result};
use regex::Regex;
use tracing::{debug, info};

pub const NAME_COLUMN: &str = "Name";
pub const STAT_COLUMNS: [&str; 6] = ["HP", "Attack", "Defense", "Sp.Attack", "Sp.Defense", "Speed"];
pub const PRIMARY_TAG_COLUMN: &str = "Type1";
pub const SECONDARY_TAG_COLUMN: &str = "Type2";
/// Accepted headers for the image column, in order of preference.
pub const IMAGE_COLUMNS: [&str; 2] = ["Image URL", "Sprite Links"];

// ── ReferenceTables ───────────────────────────────────────────────────────────

/// Immutable lookup maps the reconciliation engine joins against.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTables {
    attributes: HashMap<String, AttributeRecord>,
    images: HashMap<String, String>,
}

impl ReferenceTables {
    /// Index both tables by normalised name; the first occurrence of a name wins.
    pub fn new<A, I>(attributes: A, images: I) -> Self
    where
        A: IntoIterator<Item = AttributeRecord>,
        I: IntoIterator<Item = ImageReference>,
    {
        let mut attr_map = HashMap::new();
        for mut record in attributes {
            record.name = normalize(&record.name);
            attr_map.entry(record.name.clone()).or_insert(record);
        }

        let mut image_map = HashMap::new();
        for image in images {
            image_map.entry(normalize(&image.name)).or_insert(image.url);
        }

        Self {
            attributes: attr_map,
            images: image_map,
        }
    }

    /// Attribute row for an already-normalised name.
    pub fn attributes(&self, name: &str) -> Option<&AttributeRecord> {
        self.attributes.get(name)
    }

    /// Image URL for an already-normalised name.
    pub fn image_url(&self, name: &str) -> Option<&str> {
        self.images.get(name).map(String::as_str)
    }

    pub fn attribute_count(&self) -> usize {
        self.attributes.len()
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

// ── CSV loading ───────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|source| InsightsError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h.trim() == name)
}

fn require_column(headers: &csv::StringRecord, name: &str, source: &Path) -> Result<usize> {
    column_index(headers, name).ok_or_else(|| InsightsError::MissingColumn {
        column: name.to_string(),
        path: source.to_path_buf(),
    })
}

/// Non-numeric, empty and non-finite cells become `None`.
fn numeric_cell(record: &csv::StringRecord, idx: usize) -> Option<f64> {
    let value = record.get(idx)?.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

fn text_cell(record: &csv::StringRecord, idx: Option<usize>) -> Option<String> {
    let value = record.get(idx?)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Load the attribute table from a CSV file.
pub fn load_attributes(path: &Path) -> Result<Vec<AttributeRecord>> {
    let records = read_attributes(open(path)?, path)?;
    info!(
        "Loaded {} attribute rows from {}",
        records.len(),
        path.display()
    );
    Ok(records)
}

/// Read attribute rows from any CSV source. `source` is only used in errors.
///
/// `Name` and the six stat columns are required; `Type1`/`Type2` are
/// optional. Rows with an empty name are dropped.
pub fn read_attributes<R: Read>(reader: R, source: &Path) -> Result<Vec<AttributeRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = require_column(&headers, NAME_COLUMN, source)?;
    let mut stat_idx = [0usize; 6];
    for (slot, column) in stat_idx.iter_mut().zip(STAT_COLUMNS) {
        *slot = require_column(&headers, column, source)?;
    }
    let primary_idx = column_index(&headers, PRIMARY_TAG_COLUMN);
    let secondary_idx = column_index(&headers, SECONDARY_TAG_COLUMN);

    let mut out = Vec::new();
    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        let Some(name) = text_cell(&record, Some(name_idx)) else {
            debug!("attribute row {} has no name, skipping", line + 2);
            continue;
        };

        let [hp, attack, defense, sp_attack, sp_defense, speed] =
            stat_idx.map(|idx| numeric_cell(&record, idx));

        out.push(AttributeRecord {
            name: normalize(&name),
            stats: BaseStats {
                hp,
                attack,
                defense,
                sp_attack,
                sp_defense,
                speed,
            },
            primary_tag: text_cell(&record, primary_idx),
            secondary_tag: text_cell(&record, secondary_idx),
        });
    }

    Ok(out)
}

/// Load the image table from a CSV file.
pub fn load_images(path: &Path) -> Result<Vec<ImageReference>> {
    let images = read_images(open(path)?, path)?;
    info!("Loaded {} image rows from {}", images.len(), path.display());
    Ok(images)
}

/// Read image rows from any CSV source. Requires `Name` and one of
/// [`IMAGE_COLUMNS`]; rows with an empty name or URL are dropped.
pub fn read_images<R: Read>(reader: R, source: &Path) -> Result<Vec<ImageReference>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);
    let headers = rdr.headers()?.clone();

    let name_idx = require_column(&headers, NAME_COLUMN, source)?;
    let url_idx = IMAGE_COLUMNS
        .iter()
        .find_map(|c| column_index(&headers, c))
        .ok_or_else(|| InsightsError::MissingColumn {
            column: IMAGE_COLUMNS[0].to_string(),
            path: source.to_path_buf(),
        })?;

    let mut out = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if let (Some(name), Some(url)) = (
            text_cell(&record, Some(name_idx)),
            text_cell(&record, Some(url_idx)),
        ) {
            out.push(ImageReference {
                name: normalize(&name),
                url,
            });
        }
    }

    Ok(out)
}

// ── Sprite index ──────────────────────────────────────────────────────────────

fn card_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*class\s*=\s*"[^"]*\binfocard\b[^"]*"[^>]*>(.*?)</a>"#)
            .expect("regex is valid")
    })
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<img\s[^>]*\bsrc\s*=\s*"([^"]*)""#).expect("regex is valid")
    })
}

fn tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<[^>]*>").expect("regex is valid"))
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#039;", "'")
        .replace("&apos;", "'")
        .replace("&eacute;", "é")
        .replace("&amp;", "&")
}

/// Extract `(name, image)` pairs from the sprite index page.
///
/// Every `<a class="infocard">` card contributes its visible text as the
/// name and the `src` of its first `<img>`. Cards without an image or a
/// name are ignored.
pub fn parse_sprite_index(html: &str) -> Vec<ImageReference> {
    let mut out = Vec::new();

    for card in card_re().captures_iter(html) {
        let Some(inner) = card.get(1).map(|m| m.as_str()) else {
            continue;
        };
        let Some(url) = img_src_re()
            .captures(inner)
            .and_then(|c| c.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|u| !u.is_empty())
        else {
            continue;
        };

        let text = decode_entities(&tag_re().replace_all(inner, " "));
        let name = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if name.is_empty() {
            continue;
        }

        out.push(ImageReference {
            name: normalize(&name),
            url,
        });
    }

    debug!("sprite index yielded {} cards", out.len());
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
