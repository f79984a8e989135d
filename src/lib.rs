//! Tag completion and multi-instance settings synchronization for prompt
//! editors.
//!
//! [`engine::PromptEngine`] owns the tag dataset, answers completion
//! requests routed from an [`host::EditorHost`], runs keybinding-triggered
//! suggestion producers and keeps the settings of every live editor
//! instance in step.

pub mod config;
pub mod config_io;
pub mod engine;
pub mod hooks;
pub mod host;
pub mod instances;
pub mod model;
pub mod partial_config;
pub mod primitives;
pub mod services;
pub mod settings_sync;

pub use engine::PromptEngine;
