use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::primitives::highlighter::PromptLanguage;
use crate::services::tags::DEFAULT_THRESHOLD;

/// Editing mode of an instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum EditorMode {
    Normal,
    #[default]
    Vim,
}

impl std::fmt::Display for EditorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EditorMode::Normal => write!(f, "NORMAL"),
            EditorMode::Vim => write!(f, "VIM"),
        }
    }
}

/// Settings of one editor instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InstanceSettings {
    /// Show the minimap (default: false)
    #[serde(default = "default_false")]
    pub minimap: bool,

    /// Show line numbers (default: true)
    #[serde(default = "default_true")]
    pub line_numbers: bool,

    /// Insert tags with spaces instead of underscores (default: false)
    #[serde(default = "default_false")]
    pub replace_underscore: bool,

    /// Editing mode, `NORMAL` or `VIM`
    #[serde(default)]
    pub mode: EditorMode,

    /// Editor theme id (e.g., "vs", "vs-dark", "hc-black")
    #[serde(default = "default_theme")]
    pub theme: String,

    /// Language id (`sd-prompt` or `sd-dynamic-prompt`)
    #[serde(default = "default_language")]
    pub language: String,

    /// Show the settings header above the editor (default: true)
    #[serde(default = "default_true")]
    pub show_header: bool,

    /// Font size in pixels
    #[serde(default = "default_font_size")]
    pub font_size: u32,

    /// CSS font family
    #[serde(default = "default_font_family")]
    pub font_family: String,

    /// Enabled state per CSV source context key (e.g., "prompt-editor.danbooru")
    #[serde(default)]
    pub csv_toggle: BTreeMap<String, bool>,
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_theme() -> String {
    "vs".to_string()
}

fn default_language() -> String {
    PromptLanguage::Prompt.id().to_string()
}

fn default_font_size() -> u32 {
    14
}

fn default_font_family() -> String {
    "Consolas, 'Courier New', monospace".to_string()
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_csv_files() -> Vec<String> {
    vec!["danbooru.csv".to_string(), "extra-quality-tags.csv".to_string()]
}

fn default_languages() -> Vec<String> {
    PromptLanguage::ALL.iter().map(|lang| lang.id().to_string()).collect()
}

fn default_snippet_keybinding() -> String {
    "ctrl+shift+space".to_string()
}

impl Default for InstanceSettings {
    fn default() -> Self {
        Self {
            minimap: default_false(),
            line_numbers: default_true(),
            replace_underscore: default_false(),
            mode: EditorMode::default(),
            theme: default_theme(),
            language: default_language(),
            show_header: default_true(),
            font_size: default_font_size(),
            font_family: default_font_family(),
            csv_toggle: BTreeMap::new(),
        }
    }
}

impl InstanceSettings {
    /// Source names enabled by `csv_toggle`
    pub fn enabled_sources(&self) -> Vec<String> {
        enabled_sources(&self.csv_toggle)
    }
}

/// Source names whose toggle is on, in key order.
pub fn enabled_sources(toggle: &BTreeMap<String, bool>) -> Vec<String> {
    toggle
        .iter()
        .filter(|(_, enabled)| **enabled)
        .map(|(key, _)| source_name_for_key(key))
        .collect()
}

/// Source name for a toggle key: its last `.`-separated segment
/// (`prompt-editor.danbooru` → `danbooru`).
pub fn source_name_for_key(key: &str) -> String {
    key.rsplit('.').next().unwrap_or(key).to_string()
}

/// Source name for a CSV file name: the part before its extension.
///
/// File names with more than one `.` are rejected.
pub fn source_name_for_file(file_name: &str) -> Result<String, ConfigError> {
    let parts: Vec<&str> = file_name.split('.').collect();
    if parts.len() > 2 {
        return Err(ConfigError::ValidationError(format!(
            "invalid CSV file name (too many '.'): {file_name}"
        )));
    }
    Ok(parts[0].to_string())
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EngineConfig {
    /// Minimum popularity count for a tag to be suggested (default: 100)
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Directory holding the CSV tag sources
    #[serde(default)]
    pub csv_dir: Option<PathBuf>,

    /// CSV files loaded from `csv_dir`, in load order
    #[serde(default = "default_csv_files")]
    pub csv_files: Vec<String>,

    /// Language ids completion sources are registered for
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,

    /// Directory searched for `*/snippets/*.json`
    #[serde(default)]
    pub snippet_dir: Option<PathBuf>,

    /// Keybinding that opens the snippet list
    #[serde(default = "default_snippet_keybinding")]
    pub snippet_keybinding: String,

    /// Settings for new instances before any persisted settings apply
    #[serde(default)]
    pub defaults: InstanceSettings,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            csv_dir: None,
            csv_files: default_csv_files(),
            languages: default_languages(),
            snippet_dir: None,
            snippet_keybinding: default_snippet_keybinding(),
            defaults: InstanceSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: EngineConfig =
            serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path.as_ref(), contents).map_err(|e| ConfigError::IoError(e.to_string()))?;

        Ok(())
    }

    /// CSV files with their source names, paths resolved against `csv_dir`
    pub fn csv_sources(&self) -> Result<Vec<(String, PathBuf)>, ConfigError> {
        let dir = self.csv_dir.clone().unwrap_or_default();
        self.csv_files
            .iter()
            .map(|file| Ok((source_name_for_file(file)?, dir.join(file))))
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.threshold.is_finite() {
            return Err(ConfigError::ValidationError(
                "threshold must be a finite number".to_string(),
            ));
        }

        for file in &self.csv_files {
            source_name_for_file(file)?;
        }

        if self.languages.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one language id is required".to_string(),
            ));
        }

        if self.defaults.font_size == 0 {
            return Err(ConfigError::ValidationError(
                "font_size must be greater than 0".to_string(),
            ));
        }

        if self.snippet_keybinding.is_empty() {
            return Err(ConfigError::ValidationError(
                "snippet_keybinding cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(msg) => write!(f, "IO error: {msg}"),
            ConfigError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            ConfigError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            ConfigError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}
