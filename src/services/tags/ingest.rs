//! CSV ingestion into the tag store.
//!
//! Sources are parsed completely before anything is committed, so a corrupt
//! source never leaves a partial tag set behind.

use super::store::TagStore;
use crate::model::csv_source::{CsvSource, IngestError};
use crate::model::tag::CompletionEntry;

/// Difference between the enabled source list and a requested one.
///
/// Comparison is by name, ignoring order and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceDiff {
    /// Requested names not currently enabled, in request order
    pub add: Vec<String>,
    /// Enabled names no longer requested, in enabled order
    pub remove: Vec<String>,
}

impl SourceDiff {
    pub fn between(current: &[String], requested: &[String]) -> Self {
        let remove = current
            .iter()
            .filter(|name| !requested.contains(name))
            .cloned()
            .collect();

        let mut add: Vec<String> = Vec::new();
        for name in requested {
            if !current.contains(name) && !add.contains(name) {
                add.push(name.clone());
            }
        }

        Self { add, remove }
    }

    /// True when both lists name the same set of sources
    pub fn is_empty(&self) -> bool {
        self.add.is_empty() && self.remove.is_empty()
    }
}

/// What `add_loaded_csv` did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Same set of sources; nothing was touched
    Unchanged,
    /// Only additions: the listed sources were ingested on top of the existing entries
    Added(Vec<String>),
    /// At least one source was removed: the dataset was cleared and rebuilt
    Rebuilt,
}

impl TagStore {
    /// Replace the tag set with the contents of a single source.
    pub fn load_csv(&mut self, name: &str, csv: &str) -> Result<usize, IngestError> {
        let source = CsvSource::parse(name, csv)?;
        if !self.entries.is_empty() {
            self.clear_csv();
        }
        Ok(self.add_source(source))
    }

    /// Add a source on top of the existing tag set.
    ///
    /// Returns the number of entries added. Re-adding a source that is
    /// already ingested with identical text adds nothing; new text for an
    /// ingested source triggers a rebuild of the enabled set.
    pub fn add_csv(&mut self, name: &str, csv: &str) -> Result<usize, IngestError> {
        if self.is_ingested(name) && self.source(name).is_some_and(|s| s.raw == csv) {
            tracing::debug!("CSV \"{}\" already ingested, skipping", name);
            return Ok(0);
        }

        let source = CsvSource::parse(name, csv)?;
        if self.is_ingested(name) {
            tracing::debug!("CSV \"{}\" changed, rebuilding tag set", name);
            let added = source.entry_count();
            self.store_source(source);
            let enabled = self.enabled.clone();
            self.rebuild(&enabled);
            return Ok(added);
        }
        Ok(self.add_source(source))
    }

    /// Remove every ingested entry. Loaded sources and the enabled list are kept.
    pub fn clear_csv(&mut self) {
        self.reset_entries();
    }

    /// Make `names` the enabled source set.
    ///
    /// Any removal clears the dataset and rebuilds it from `names`;
    /// pure additions only ingest the new sources. Names that were never
    /// loaded are logged and skipped.
    pub fn add_loaded_csv(&mut self, names: &[String]) -> ToggleOutcome {
        let diff = SourceDiff::between(&self.enabled, names);
        if diff.is_empty() {
            return ToggleOutcome::Unchanged;
        }

        self.enabled = names.to_vec();
        if !diff.remove.is_empty() {
            tracing::debug!(
                "CSV sources removed ({:?}), rebuilding from {:?}",
                diff.remove,
                names
            );
            self.rebuild(names);
            return ToggleOutcome::Rebuilt;
        }

        self.ingest_named(&diff.add);
        ToggleOutcome::Added(diff.add)
    }

    fn add_source(&mut self, source: CsvSource) -> usize {
        let name = source.name.clone();
        let entries = source_entries(&source);
        let added = entries.len();

        self.store_source(source);
        if !self.enabled.contains(&name) {
            self.enabled.push(name.clone());
        }
        self.ingested.insert(name.clone());
        self.commit_append(entries);

        tracing::debug!("Ingested CSV \"{}\": {} entries", name, added);
        added
    }

    fn store_source(&mut self, source: CsvSource) {
        match self.loaded.iter_mut().find(|s| s.name == source.name) {
            Some(existing) => *existing = source,
            None => self.loaded.push(source),
        }
    }

    fn rebuild(&mut self, names: &[String]) {
        self.reset_entries();
        self.ingest_named(names);
    }

    fn ingest_named(&mut self, names: &[String]) {
        let mut entries = Vec::new();
        for name in names {
            if self.ingested.contains(name) {
                continue;
            }
            let Some(source) = self.source(name) else {
                tracing::error!("CSV \"{}\" is not loaded", name);
                continue;
            };
            entries.extend(source_entries(source));
            self.ingested.insert(name.clone());
        }
        self.commit_append(entries);
    }
}

fn source_entries(source: &CsvSource) -> Vec<CompletionEntry> {
    source
        .rows
        .iter()
        .flat_map(|row| row.entries(Some(&source.name)))
        .collect()
}
