//! Snippet files offered through a dynamic-suggest keybinding.
//!
//! Snippets live in `<root>/<package>/snippets/*.json`. A file holds either
//! one snippet object or an array of them.

use async_trait::async_trait;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::model::tag::CompletionKind;
use crate::services::dynamic_suggest::{PartialSuggestion, SuggestError, SuggestProducer};

/// A snippet loaded from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snippet {
    pub label: String,
    /// Editor snippet syntax (`${1:placeholder}`)
    pub insert_text: String,
    /// File the snippet came from, relative to the search root
    pub path: String,
    pub detail: Option<String>,
    pub documentation: Option<String>,
}

/// Snippet files under `root`, sorted by path.
pub fn discover_snippet_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(packages) = fs::read_dir(root) else {
        return files;
    };
    for package in packages.flatten() {
        let Ok(entries) = fs::read_dir(package.path().join("snippets")) else {
            continue;
        };
        files.extend(
            entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json")),
        );
    }
    files.sort();
    files
}

/// Snippets declared in one JSON document.
///
/// Items without a string `label` and `insertText` are skipped.
pub fn parse_snippets(path: &str, value: &Value) -> Vec<Snippet> {
    let items: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    };

    items
        .into_iter()
        .filter_map(|item| {
            let label = item.get("label")?.as_str()?;
            let insert_text = item.get("insertText")?.as_str()?;
            let text = |key: &str| item.get(key).and_then(Value::as_str).map(str::to_string);
            Some(Snippet {
                label: label.to_string(),
                insert_text: insert_text.to_string(),
                path: path.to_string(),
                detail: text("detail"),
                documentation: text("documentation"),
            })
        })
        .collect()
}

/// Load every snippet under `root`. Unreadable or invalid files are skipped.
pub fn load_snippets(root: &Path) -> Vec<Snippet> {
    let mut snippets = Vec::new();
    for file in discover_snippet_files(root) {
        let relative = file
            .strip_prefix(root)
            .unwrap_or(&file)
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let value = match fs::read_to_string(&file)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(|e| e.to_string()))
        {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Skipping snippet file {}: {}", file.display(), e);
                continue;
            }
        };
        snippets.extend(parse_snippets(&relative, &value));
    }
    tracing::debug!("Loaded {} snippets from {}", snippets.len(), root.display());
    snippets
}

/// Offers a fixed snippet set as dynamic suggestions.
#[derive(Debug, Clone, Default)]
pub struct SnippetProducer {
    snippets: Vec<Snippet>,
}

impl SnippetProducer {
    pub fn new(snippets: Vec<Snippet>) -> Self {
        Self { snippets }
    }

    pub fn from_dir(root: &Path) -> Self {
        Self::new(load_snippets(root))
    }

    pub fn snippets(&self) -> &[Snippet] {
        &self.snippets
    }
}

#[async_trait]
impl SuggestProducer for SnippetProducer {
    async fn produce(&self) -> Result<Vec<PartialSuggestion>, SuggestError> {
        Ok(self
            .snippets
            .iter()
            .map(|snippet| PartialSuggestion {
                label: snippet.label.clone(),
                insert_text: Some(snippet.insert_text.clone()),
                kind: Some(CompletionKind::Snippet),
                detail: snippet.detail.clone(),
                documentation: snippet.documentation.clone(),
            })
            .collect())
    }
}
