//! Tag dataset: the store and the CSV ingestor that writes to it.

pub mod ingest;
pub mod store;

pub use ingest::{SourceDiff, ToggleOutcome};
pub use store::{filter_entries, EntrySnapshot, ExtraNetworks, TagStore, DEFAULT_THRESHOLD};
