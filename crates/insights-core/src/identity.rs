//! Canonical entity names.
//!
//! Usage reports, the attribute table and the sprite index all spell names
//! slightly differently (padding, capitalisation). Every cross-source join
//! goes through [`normalize`].

/// Canonicalise a free-text entity name.
///
/// Trims surrounding whitespace and title-cases the rest: a cased letter that
/// follows another cased letter is lower-cased, every other cased letter is
/// upper-cased (`"landorus-therian"` → `"Landorus-Therian"`).
///
/// Characters whose case mapping expands to more than one character (e.g.
/// `ß`) are left untouched, which keeps the function idempotent.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    let mut prev_cased = false;

    for ch in trimmed.chars() {
        let mapped = if prev_cased {
            single_mapping(ch.to_lowercase()).unwrap_or(ch)
        } else {
            single_mapping(ch.to_uppercase()).unwrap_or(ch)
        };
        out.push(mapped);
        prev_cased = is_cased(mapped);
    }

    out
}

fn single_mapping(mut iter: impl Iterator<Item = char>) -> Option<char> {
    let first = iter.next()?;
    match iter.next() {
        None => Some(first),
        Some(_) => None,
    }
}

fn is_cased(ch: char) -> bool {
    ch.is_lowercase() || ch.is_uppercase()
}
