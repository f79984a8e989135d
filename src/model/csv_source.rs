//! CSV tag sources.
//!
//! Each source is a headerless CSV with exactly four columns
//! (`tag,category,count,alias`). The alias column is itself a comma-joined
//! list, so it is quoted in well-formed files.

use super::tag::TagRow;
use std::sync::Arc;

/// Number of columns every tag CSV row must have
pub const TAG_CSV_COLUMNS: usize = 4;

/// A named CSV payload and the rows parsed from it.
#[derive(Debug, Clone)]
pub struct CsvSource {
    /// Basename of the source file (e.g. `danbooru`)
    pub name: String,
    /// Raw CSV text as delivered by the host
    pub raw: String,
    /// Rows parsed from `raw`
    pub rows: Arc<Vec<TagRow>>,
}

impl CsvSource {
    /// Parse `raw` into a source. Fails without side effects on the first bad row.
    pub fn parse(name: &str, raw: &str) -> Result<Self, IngestError> {
        let rows = parse_tag_csv(name, raw)?;
        Ok(Self {
            name: name.to_string(),
            raw: raw.to_string(),
            rows: Arc::new(rows),
        })
    }

    /// Total number of completion entries the source expands into
    pub fn entry_count(&self) -> usize {
        self.rows.iter().map(TagRow::entry_count).sum()
    }
}

/// Parse tag CSV text into rows.
pub fn parse_tag_csv(source: &str, text: &str) -> Result<Vec<TagRow>, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.map_err(|e| IngestError::Csv {
            source: source.to_string(),
            message: e.to_string(),
        })?;

        if record.len() != TAG_CSV_COLUMNS {
            let line = record
                .position()
                .map(|p| p.line())
                .unwrap_or(index as u64 + 1);
            return Err(IngestError::ColumnCount {
                source: source.to_string(),
                line,
                found: record.len(),
            });
        }

        rows.push(TagRow::from_columns(
            &record[0], &record[1], &record[2], &record[3],
        ));
    }

    Ok(rows)
}

/// Errors raised while ingesting a CSV source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestError {
    /// The source file could not be read
    Io { source: String, message: String },
    /// The CSV reader rejected the text (bad quoting, invalid UTF-8)
    Csv { source: String, message: String },
    /// A row did not have exactly four columns
    ColumnCount {
        source: String,
        line: u64,
        found: usize,
    },
}

impl std::fmt::Display for IngestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IngestError::Io { source, message } => {
                write!(f, "Cannot read CSV \"{source}\": {message}")
            }
            IngestError::Csv { source, message } => {
                write!(f, "CSV error in \"{source}\": {message}")
            }
            IngestError::ColumnCount {
                source,
                line,
                found,
            } => write!(
                f,
                "CSV error in \"{source}\" line {line}: expected {TAG_CSV_COLUMNS} columns, found {found}"
            ),
        }
    }
}

impl std::error::Error for IngestError {}
