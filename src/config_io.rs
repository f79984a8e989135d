//! Persisted settings.
//!
//! Settings are stored as one JSON document per user. The `editor` key holds
//! the instance settings; every other key belongs to someone else and is
//! written back untouched.
//!
//! Writes are debounced by content: saving a snapshot that equals the last
//! saved one is skipped.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

use crate::config::InstanceSettings;
use crate::partial_config::PartialInstanceSettings;

/// Recursively strip null values from a JSON value.
/// Empty objects left behind are dropped as well.
fn strip_nulls(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let filtered: serde_json::Map<String, Value> = map
                .into_iter()
                .filter_map(|(k, v)| strip_nulls(v).map(|v| (k, v)))
                .collect();
            if filtered.is_empty() {
                None
            } else {
                Some(Value::Object(filtered))
            }
        }
        Value::Array(arr) => {
            let filtered: Vec<Value> = arr.into_iter().filter_map(strip_nulls).collect();
            Some(Value::Array(filtered))
        }
        other => Some(other),
    }
}

/// Settings persistence error types
#[derive(Debug)]
pub enum SettingsError {
    IoError(String),
    ParseError(String),
    SerializeError(String),
    InvalidUser(String),
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "IO error: {msg}"),
            SettingsError::ParseError(msg) => write!(f, "Parse error: {msg}"),
            SettingsError::SerializeError(msg) => write!(f, "Serialize error: {msg}"),
            SettingsError::InvalidUser(user) => write!(f, "Invalid user name: {user:?}"),
        }
    }
}

impl std::error::Error for SettingsError {}

/// The persisted settings document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsDocument {
    /// Instance settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub editor: Option<PartialInstanceSettings>,

    /// Keys owned by other components, preserved verbatim
    #[serde(flatten)]
    pub other: serde_json::Map<String, Value>,
}

impl SettingsDocument {
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        serde_json::from_str(text).map_err(|e| SettingsError::ParseError(e.to_string()))
    }

    /// Pretty JSON with null values removed
    pub fn to_json(&self) -> Result<String, SettingsError> {
        let value =
            serde_json::to_value(self).map_err(|e| SettingsError::SerializeError(e.to_string()))?;
        let clean = strip_nulls(value).unwrap_or(Value::Object(Default::default()));
        serde_json::to_string_pretty(&clean)
            .map_err(|e| SettingsError::SerializeError(e.to_string()))
    }
}

/// Storage backend for settings documents, keyed by user (`None` without auth).
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Stored document, or `None` when nothing was stored yet.
    async fn load(&self, user: Option<&str>) -> Result<Option<SettingsDocument>, SettingsError>;

    async fn store(
        &self,
        user: Option<&str>,
        document: &SettingsDocument,
    ) -> Result<(), SettingsError>;
}

/// One JSON file per user under `<root>/settings/`.
#[derive(Debug, Clone)]
pub struct FileSettingsStore {
    root: PathBuf,
}

impl FileSettingsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn settings_dir(&self) -> PathBuf {
        self.root.join("settings")
    }

    /// `global.json` without a user, `user_<name>.json` otherwise
    pub fn path_for(&self, user: Option<&str>) -> Result<PathBuf, SettingsError> {
        let file = match user {
            None => "global.json".to_string(),
            Some(name) => {
                let valid = !name.is_empty()
                    && name
                        .chars()
                        .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
                if !valid {
                    return Err(SettingsError::InvalidUser(name.to_string()));
                }
                format!("user_{name}.json")
            }
        };
        Ok(self.settings_dir().join(file))
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn load(&self, user: Option<&str>) -> Result<Option<SettingsDocument>, SettingsError> {
        let path = self.path_for(user)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(SettingsError::IoError(format!("{}: {}", path.display(), e))),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| SettingsError::ParseError(format!("{}: {}", path.display(), e)))
    }

    async fn store(
        &self,
        user: Option<&str>,
        document: &SettingsDocument,
    ) -> Result<(), SettingsError> {
        let path = self.path_for(user)?;
        let dir = self.settings_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| SettingsError::IoError(format!("{}: {}", dir.display(), e)))?;

        // Write atomically: temp file + rename
        let json = document.to_json()?;
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json)
            .await
            .map_err(|e| SettingsError::IoError(format!("{}: {}", temp_path.display(), e)))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| SettingsError::IoError(format!("{}: {}", path.display(), e)))?;

        tracing::debug!("Stored settings to {}", path.display());
        Ok(())
    }
}

/// In-memory store, used when embedding and in tests.
#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    documents: Mutex<HashMap<Option<String>, SettingsDocument>>,
    writes: AtomicUsize,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `store` calls
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn load(&self, user: Option<&str>) -> Result<Option<SettingsDocument>, SettingsError> {
        let documents = self.documents.lock().await;
        Ok(documents.get(&user.map(str::to_string)).cloned())
    }

    async fn store(
        &self,
        user: Option<&str>,
        document: &SettingsDocument,
    ) -> Result<(), SettingsError> {
        let mut documents = self.documents.lock().await;
        documents.insert(user.map(str::to_string), document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Tracks the persisted document and the last saved instance snapshot.
#[derive(Debug, Clone, Default)]
pub struct SettingsPersister {
    user: Option<String>,
    document: SettingsDocument,
    last_saved: Option<InstanceSettings>,
}

impl SettingsPersister {
    pub fn new(user: Option<String>) -> Self {
        Self {
            user,
            ..Self::default()
        }
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn document(&self) -> &SettingsDocument {
        &self.document
    }

    /// Load the stored document and return its `editor` settings.
    pub async fn load(
        &mut self,
        store: &dyn SettingsStore,
    ) -> Result<Option<PartialInstanceSettings>, SettingsError> {
        let Some(document) = store.load(self.user.as_deref()).await? else {
            return Ok(None);
        };
        self.document = document;
        Ok(self.document.editor.clone())
    }

    /// Persist `current` unless it equals the last saved snapshot.
    ///
    /// Returns whether a write happened.
    pub async fn save(
        &mut self,
        store: &dyn SettingsStore,
        current: &InstanceSettings,
    ) -> Result<bool, SettingsError> {
        if self.last_saved.as_ref() == Some(current) {
            return Ok(false);
        }

        let mut document = self.document.clone();
        document.editor = Some(PartialInstanceSettings::from(current));
        store.store(self.user.as_deref(), &document).await?;

        self.document = document;
        self.last_saved = Some(current.clone());
        Ok(true)
    }
}

/// Resolve the settings root for a working directory (`<dir>/.prompt-editor`).
pub fn default_settings_root(working_dir: &Path) -> PathBuf {
    working_dir.join(".prompt-editor")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_nulls() {
        let value = json!({"a": null, "b": {"c": null}, "d": [1, null], "e": 2});
        assert_eq!(strip_nulls(value), Some(json!({"d": [1], "e": 2})));
    }

    #[test]
    fn test_document_preserves_other_keys() {
        let text = r#"{"editor": {"theme": "vs-dark"}, "sidebar": {"open": true}}"#;
        let document = SettingsDocument::from_json(text).unwrap();
        assert_eq!(document.editor.as_ref().unwrap().theme.as_deref(), Some("vs-dark"));
        assert_eq!(document.other["sidebar"], json!({"open": true}));

        let written: Value = serde_json::from_str(&document.to_json().unwrap()).unwrap();
        assert_eq!(
            written,
            json!({"editor": {"theme": "vs-dark"}, "sidebar": {"open": true}})
        );
    }

    #[test]
    fn test_user_paths() {
        let store = FileSettingsStore::new("/data");
        assert_eq!(
            store.path_for(None).unwrap(),
            PathBuf::from("/data/settings/global.json")
        );
        assert_eq!(
            store.path_for(Some("alice")).unwrap(),
            PathBuf::from("/data/settings/user_alice.json")
        );
        assert!(store.path_for(Some("../etc")).is_err());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path());
        assert_eq!(store.load(None).await.unwrap(), None);

        let document = SettingsDocument {
            editor: Some(PartialInstanceSettings {
                minimap: Some(true),
                ..Default::default()
            }),
            other: serde_json::Map::new(),
        };
        store.store(None, &document).await.unwrap();
        assert_eq!(store.load(None).await.unwrap(), Some(document));
    }

    #[tokio::test]
    async fn test_file_store_reports_corrupt_document() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path());
        std::fs::create_dir_all(store.settings_dir()).unwrap();
        std::fs::write(store.path_for(None).unwrap(), "{oops").unwrap();
        assert!(matches!(
            store.load(None).await,
            Err(SettingsError::ParseError(_))
        ));
    }

    #[tokio::test]
    async fn test_persister_skips_identical_snapshot() {
        let store = MemorySettingsStore::new();
        let mut persister = SettingsPersister::new(None);
        let mut settings = InstanceSettings::default();

        assert!(persister.save(&store, &settings).await.unwrap());
        assert!(!persister.save(&store, &settings).await.unwrap());
        assert_eq!(store.writes(), 1);

        settings.theme = "vs-dark".to_string();
        assert!(persister.save(&store, &settings).await.unwrap());
        assert_eq!(store.writes(), 2);

        let mut reloaded = SettingsPersister::new(None);
        let editor = reloaded.load(&store).await.unwrap().unwrap();
        assert_eq!(editor.theme.as_deref(), Some("vs-dark"));
    }
}
