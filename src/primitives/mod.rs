//! Low-level primitives for the prompt languages
//!
//! Word boundaries used by completion, and the line tokenizer.

pub mod highlighter;
pub mod word;
