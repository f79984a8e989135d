//! Tag rows and the completion entries derived from them.
//!
//! A [`TagRow`] is one parsed CSV line. Every row expands into one primary
//! [`CompletionEntry`] plus one entry per non-empty alias; all of them insert
//! the (escaped) primary tag.

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters that delimit emphasis and scheduling blocks in the prompt language.
pub const DELIMITER_CHARS: [char; 4] = ['(', ')', '[', ']'];

/// Popularity count of a tag.
///
/// CSV sources sometimes put category labels (e.g. `danger`) in the count
/// column. Those are kept verbatim and always pass the threshold filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagCount {
    Numeric(f64),
    Text(String),
}

impl TagCount {
    /// Parse the raw count column.
    ///
    /// Surrounding whitespace is ignored and an empty column counts as `0`.
    /// `Infinity` and out-of-range literals such as `1e400` are numeric;
    /// `NaN`, `inf` and other spellings are text.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Self::Numeric(0.0);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_nan() => Self::Text(raw.to_string()),
            Ok(value) if value.is_infinite() && !is_infinity_literal(trimmed) => {
                Self::Text(raw.to_string())
            }
            Ok(value) => Self::Numeric(value),
            Err(_) => Self::Text(raw.to_string()),
        }
    }

    /// Numeric value, if the count is numeric
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Numeric(value) => Some(*value),
            Self::Text(_) => None,
        }
    }

    /// Whether an entry with this count is kept at the given threshold.
    pub fn passes_threshold(&self, threshold: f64) -> bool {
        match self {
            Self::Numeric(value) => *value > threshold,
            Self::Text(_) => true,
        }
    }
}

impl fmt::Display for TagCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(value) => f.write_str(&format_count(*value)),
            Self::Text(text) => f.write_str(text),
        }
    }
}

/// Whether an infinite parse result came from digits or a spelled-out
/// `Infinity` rather than `inf`/`infinity` in another case.
fn is_infinity_literal(text: &str) -> bool {
    let unsigned = text.trim_start_matches(['+', '-']);
    unsigned == "Infinity" || unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

/// Render a count with thousands separators, keeping at most three fraction digits.
pub fn format_count(value: f64) -> String {
    if value.is_infinite() {
        return if value < 0.0 { "-∞" } else { "∞" }.to_string();
    }
    // Past 2^53 there are no fraction digits left to round
    let rounded = if value.abs() < 9.0e15 {
        (value * 1000.0).round() / 1000.0
    } else {
        value
    };
    let sign = if rounded < 0.0 { "-" } else { "" };
    let magnitude = rounded.abs();
    let whole = magnitude.trunc();
    let millis = ((magnitude - whole) * 1000.0).round() as u64;

    let mut out = format!("{sign}{}", group_whole(whole));
    if millis > 0 {
        let fraction = format!("{millis:03}");
        out.push('.');
        out.push_str(fraction.trim_end_matches('0'));
    }
    out
}

/// Thousands-grouped digits of a non-negative integral value of any size.
fn group_whole(whole: f64) -> String {
    if whole < u128::MAX as f64 {
        return (whole as u128).to_formatted_string(&Locale::en);
    }
    let digits = format!("{whole:.0}");
    let separator = Locale::en.separator();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(c);
    }
    out
}

/// Backslash-escape prompt delimiters so a tag is inserted literally.
///
/// Characters that already follow a backslash are copied untouched, which
/// makes the function idempotent.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 4);
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            c if DELIMITER_CHARS.contains(&c) => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out
}

/// Kind of a completion item, mirrored to the editor's icon set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    #[default]
    Text,
    Value,
    Keyword,
    Snippet,
    Function,
    Reference,
}

/// One parsed CSV line: `tag, category, count, alias`
#[derive(Debug, Clone, PartialEq)]
pub struct TagRow {
    pub tag: String,
    pub category: String,
    pub count: TagCount,
    pub aliases: Vec<String>,
}

impl TagRow {
    /// Build a row from its four raw columns.
    pub fn from_columns(tag: &str, category: &str, count: &str, alias: &str) -> Self {
        Self {
            tag: tag.to_string(),
            category: category.to_string(),
            count: TagCount::parse(count),
            aliases: alias
                .split(',')
                .filter(|alias| !alias.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    /// Number of completion entries this row expands into
    pub fn entry_count(&self) -> usize {
        1 + self.aliases.len()
    }

    /// Expand the row into its primary entry followed by one entry per alias.
    pub fn entries(&self, source: Option<&str>) -> Vec<CompletionEntry> {
        let description = match source {
            Some(name) => format!("({name}) {}", self.count),
            None => self.count.to_string(),
        };
        let insert_text = escape(&self.tag);

        let mut entries = Vec::with_capacity(self.entry_count());
        entries.push(CompletionEntry {
            label: self.tag.clone(),
            detail: None,
            description: description.clone(),
            insert_text: insert_text.clone(),
            count: self.count.clone(),
            source: source.map(str::to_string),
        });
        for alias in &self.aliases {
            entries.push(CompletionEntry {
                label: alias.clone(),
                detail: Some(format!(" -> {}", self.tag)),
                description: description.clone(),
                insert_text: insert_text.clone(),
                count: self.count.clone(),
                source: source.map(str::to_string),
            });
        }
        entries
    }
}

/// A tag completion candidate as stored in the tag store.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionEntry {
    /// Text shown in the suggestion list (tag or alias)
    pub label: String,
    /// For alias entries, ` -> canonical_tag`
    pub detail: Option<String>,
    /// Source annotation and formatted count
    pub description: String,
    /// Escaped primary tag
    pub insert_text: String,
    /// Raw count used by the threshold filter
    pub count: TagCount,
    /// Name of the CSV source this entry came from
    pub source: Option<String>,
}

impl CompletionEntry {
    /// Whether this entry is an alias of another tag
    pub fn is_alias(&self) -> bool {
        self.detail.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_parse() {
        assert_eq!(TagCount::parse("1234"), TagCount::Numeric(1234.0));
        assert_eq!(TagCount::parse(" 12 "), TagCount::Numeric(12.0));
        assert_eq!(TagCount::parse(""), TagCount::Numeric(0.0));
        assert_eq!(
            TagCount::parse("danger"),
            TagCount::Text("danger".to_string())
        );
        assert_eq!(TagCount::parse("NaN"), TagCount::Text("NaN".to_string()));
        assert_eq!(TagCount::parse("inf"), TagCount::Text("inf".to_string()));
    }

    #[test]
    fn test_count_parse_infinite_is_numeric() {
        assert_eq!(TagCount::parse("Infinity"), TagCount::Numeric(f64::INFINITY));
        assert_eq!(TagCount::parse("-Infinity"), TagCount::Numeric(f64::NEG_INFINITY));
        assert_eq!(TagCount::parse("1e400"), TagCount::Numeric(f64::INFINITY));
        assert_eq!(TagCount::parse("1e400").to_string(), "∞");
        assert!(TagCount::parse("Infinity").passes_threshold(1e12));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0.0), "0");
        assert_eq!(format_count(999.0), "999");
        assert_eq!(format_count(1234567.0), "1,234,567");
        assert_eq!(format_count(1234.5), "1,234.5");
        assert_eq!(format_count(-2500.0), "-2,500");
        assert_eq!(format_count(0.12345), "0.123");
    }

    #[test]
    fn test_format_count_beyond_integer_range() {
        assert_eq!(format_count(1e20), "100,000,000,000,000,000,000");
        assert_eq!(format_count(-1e20), "-100,000,000,000,000,000,000");

        let huge = format_count(1e40);
        assert!(huge.starts_with("10,000,000,000,000,000,"));
        assert_eq!(huge.split(',').count(), 14);
        assert!(huge.split(',').skip(1).all(|group| group.len() == 3));
        assert_eq!(format_count(f64::MAX).split(',').count(), 103);
    }

    #[test]
    fn test_threshold() {
        assert!(TagCount::Numeric(101.0).passes_threshold(100.0));
        assert!(!TagCount::Numeric(100.0).passes_threshold(100.0));
        assert!(TagCount::Text("danger".into()).passes_threshold(1e12));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("tag_(artist)"), "tag_\\(artist\\)");
        assert_eq!(escape("[a]"), "\\[a\\]");
        assert_eq!(escape("{a}"), "{a}");
        assert_eq!(escape(&escape("a(b)[c]")), escape("a(b)[c]"));
    }

    #[test]
    fn test_row_entries() {
        let row = TagRow::from_columns("1girl", "0", "4114588", "1girls,sole_female");
        let entries = row.entries(Some("danbooru"));
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].label, "1girl");
        assert!(!entries[0].is_alias());
        assert_eq!(entries[0].description, "(danbooru) 4,114,588");
        assert_eq!(entries[1].label, "1girls");
        assert_eq!(entries[1].detail.as_deref(), Some(" -> 1girl"));
        assert_eq!(entries[2].insert_text, "1girl");
    }

    #[test]
    fn test_row_without_source_or_aliases() {
        let row = TagRow::from_columns("hat_(object)", "0", "danger", "");
        let entries = row.entries(None);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].description, "danger");
        assert_eq!(entries[0].insert_text, "hat_\\(object\\)");
    }

    #[test]
    fn test_empty_aliases_skipped() {
        let row = TagRow::from_columns("a", "0", "5", ",b,,c,");
        assert_eq!(row.aliases, vec!["b".to_string(), "c".to_string()]);
        assert_eq!(row.entry_count(), 3);
    }
}
