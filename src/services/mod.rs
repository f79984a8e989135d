//! Completion services: the tag dataset, the completion provider, dynamic
//! suggestions and snippets.

pub mod completion;
pub mod dynamic_suggest;
pub mod snippets;
pub mod tags;
