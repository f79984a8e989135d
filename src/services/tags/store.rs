//! Tag store: every ingested completion entry plus the filtered view.
//!
//! The filtered view is a pure function of the entry list and the
//! threshold. It is published as an immutable snapshot that is replaced
//! wholesale after each change, so a reader holding a snapshot never sees a
//! half-rebuilt list.

use crate::model::csv_source::CsvSource;
use crate::model::tag::CompletionEntry;
use std::collections::HashSet;
use std::sync::Arc;

/// Default popularity threshold: entries need a count above this to be offered
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// Immutable snapshot of completion entries
pub type EntrySnapshot = Arc<[Arc<CompletionEntry>]>;

/// Entries whose numeric count exceeds `threshold`, plus every entry whose
/// count is not numeric. Order is preserved.
pub fn filter_entries(entries: &[Arc<CompletionEntry>], threshold: f64) -> EntrySnapshot {
    entries
        .iter()
        .filter(|entry| entry.count.passes_threshold(threshold))
        .cloned()
        .collect()
}

/// Process-wide tag data, owned by the engine.
///
/// Tag data is only written through the ingest operations (`load_csv`,
/// `add_csv`, `clear_csv`, `add_loaded_csv`); everything else reads.
#[derive(Debug)]
pub struct TagStore {
    pub(super) threshold: f64,
    pub(super) entries: Vec<Arc<CompletionEntry>>,
    pub(super) filtered: EntrySnapshot,
    /// Source names currently enabled, in the order they were requested
    pub(super) enabled: Vec<String>,
    /// Loaded sources in load order
    pub(super) loaded: Vec<CsvSource>,
    /// Sources whose entries are currently part of `entries`
    pub(super) ingested: HashSet<String>,
    replace_underscore: bool,
}

impl Default for TagStore {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl TagStore {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            entries: Vec::new(),
            filtered: Arc::from(Vec::new()),
            enabled: Vec::new(),
            loaded: Vec::new(),
            ingested: HashSet::new(),
            replace_underscore: false,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Change the threshold and recompute the filtered view.
    pub fn set_threshold(&mut self, threshold: f64) {
        self.threshold = threshold;
        self.update_filtered_tags();
    }

    /// Recompute the filtered view from the full entry list.
    pub fn update_filtered_tags(&mut self) {
        self.filtered = filter_entries(&self.entries, self.threshold);
        tracing::debug!(
            "Filtered tags: {} of {} above threshold {}",
            self.filtered.len(),
            self.entries.len(),
            self.threshold
        );
    }

    /// Number of ingested entries (tags plus aliases), before filtering
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// All ingested entries in insertion order
    pub fn entries(&self) -> &[Arc<CompletionEntry>] {
        &self.entries
    }

    /// Current filtered snapshot
    pub fn filtered(&self) -> EntrySnapshot {
        Arc::clone(&self.filtered)
    }

    /// Entries contributed by a given source, in insertion order
    pub fn entries_from(&self, source: &str) -> Vec<Arc<CompletionEntry>> {
        self.entries
            .iter()
            .filter(|entry| entry.source.as_deref() == Some(source))
            .cloned()
            .collect()
    }

    pub fn replace_underscore(&self) -> bool {
        self.replace_underscore
    }

    pub fn set_replace_underscore(&mut self, replace: bool) {
        self.replace_underscore = replace;
    }

    /// Names of loaded sources in load order
    pub fn loaded_csv(&self) -> Vec<String> {
        self.loaded.iter().map(|source| source.name.clone()).collect()
    }

    /// Names of enabled sources
    pub fn enabled_csv(&self) -> Vec<String> {
        self.enabled.clone()
    }

    pub fn source(&self, name: &str) -> Option<&CsvSource> {
        self.loaded.iter().find(|source| source.name == name)
    }

    pub fn is_ingested(&self, name: &str) -> bool {
        self.ingested.contains(name)
    }

    /// Append entries and publish a fresh filtered snapshot.
    pub(super) fn commit_append(&mut self, new_entries: Vec<CompletionEntry>) {
        self.entries.extend(new_entries.into_iter().map(Arc::new));
        self.update_filtered_tags();
    }

    /// Drop every entry and the filtered view.
    pub(super) fn reset_entries(&mut self) {
        self.entries.clear();
        self.ingested.clear();
        self.filtered = Arc::from(Vec::new());
    }
}

/// Non-CSV suggestion categories ("extra networks" such as embeddings and
/// LoRAs), grouped by type in registration order.
#[derive(Debug, Clone, Default)]
pub struct ExtraNetworks {
    groups: Vec<(String, Vec<String>)>,
}

impl ExtraNetworks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or extend the list for `kind`.
    ///
    /// The list is replaced when `clear` is set or the type is new,
    /// otherwise `names` are appended.
    pub fn add_data(&mut self, kind: &str, names: &[String], clear: bool) {
        match self.groups.iter_mut().find(|(k, _)| k == kind) {
            Some((_, list)) if !clear => list.extend(names.iter().cloned()),
            Some((_, list)) => *list = names.to_vec(),
            None => self.groups.push((kind.to_string(), names.to_vec())),
        }
    }

    /// Names registered for `kind`
    pub fn get(&self, kind: &str) -> Option<&[String]> {
        self.groups
            .iter()
            .find(|(k, _)| k == kind)
            .map(|(_, list)| list.as_slice())
    }

    /// Groups in registration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.groups
            .iter()
            .map(|(kind, list)| (kind.as_str(), list.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.groups.iter().all(|(_, list)| list.is_empty())
    }
}
