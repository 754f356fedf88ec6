//! Text formatting for terminal output and Markdown tables.

/// Format a number with thousands separators and a fixed number of decimals.
///
/// # Examples
///
/// ```
/// use insights_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5, 1), "1,234.5");
/// assert_eq!(format_number(552.0, 0), "552");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// ```
pub fn format_number(value: f64, decimals: usize) -> String {
    let fixed = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (fixed.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c != '0' && c != '.') {
        "-"
    } else {
        ""
    };
    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}

/// Format a usage rate the way the reports print it: `"35.123%"`.
pub fn format_percent(value: f64, decimals: usize) -> String {
    format!("{:.*}%", decimals, value)
}

/// Format an optional value, printing `"-"` for nulls.
pub fn format_optional(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format_number(v, decimals))
        .unwrap_or_else(|| "-".to_string())
}

/// Render a GitHub-flavoured Markdown table.
///
/// Cells containing `|` are escaped; short rows are padded with empty cells.
pub fn markdown_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let escape = |s: &str| s.replace('|', "\\|");
    let mut out = String::new();

    out.push_str("| ");
    out.push_str(&headers.iter().map(|h| escape(h)).collect::<Vec<_>>().join(" | "));
    out.push_str(" |\n|");
    for _ in headers {
        out.push_str(":---|");
    }
    out.push('\n');

    for row in rows {
        let cells: Vec<String> = (0..headers.len())
            .map(|i| row.get(i).map(|c| escape(c)).unwrap_or_default())
            .collect();
        out.push_str("| ");
        out.push_str(&cells.join(" | "));
        out.push_str(" |\n");
    }

    out
}
