//! Core data model: tag rows, completion entries and CSV sources.

pub mod csv_source;
pub mod tag;
