//! The engine: tag data, completion, dynamic suggestions and the live
//! instances with their synchronized settings, owned in one place.

use std::path::Path;
use std::sync::Arc;

use crate::config::{EngineConfig, InstanceSettings};
use crate::config_io::{SettingsError, SettingsPersister, SettingsStore};
use crate::host::{EditorHost, SourceHandle};
use crate::instances::{InstanceId, InstanceRegistry, SettingsPresenter};
use crate::model::csv_source::IngestError;
use crate::partial_config::{Merge, PartialInstanceSettings};
use crate::services::completion::{self, CompletionList, CompletionRequest};
use crate::services::dynamic_suggest::{DynamicSuggestRegistry, SuggestProducer, TriggerOutcome};
use crate::services::snippets::SnippetProducer;
use crate::services::tags::{ExtraNetworks, TagStore, ToggleOutcome};
use crate::settings_sync::{ApplyReport, ApplyTarget, SettingsSyncBroker};

/// Id under which the snippet producer is registered
pub const SNIPPETS_ID: &str = "snippets";

pub struct PromptEngine {
    config: EngineConfig,
    tags: TagStore,
    extra: ExtraNetworks,
    dynamic: DynamicSuggestRegistry,
    instances: InstanceRegistry,
    /// Settings received through `update_settings`, used for new instances
    settings: PartialInstanceSettings,
    persister: SettingsPersister,
    completion_sources: Vec<SourceHandle>,
}

impl PromptEngine {
    pub fn new(config: EngineConfig) -> Self {
        let tags = TagStore::new(config.threshold);
        let dynamic = DynamicSuggestRegistry::with_languages(config.languages.clone());
        Self {
            config,
            tags,
            extra: ExtraNetworks::new(),
            dynamic,
            instances: InstanceRegistry::new(),
            settings: PartialInstanceSettings::default(),
            persister: SettingsPersister::default(),
            completion_sources: Vec::new(),
        }
    }

    /// Persist settings under a user name instead of the global document.
    pub fn with_user(mut self, user: Option<String>) -> Self {
        self.persister = SettingsPersister::new(user);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn tags(&self) -> &TagStore {
        &self.tags
    }

    pub fn extra_networks(&self) -> &ExtraNetworks {
        &self.extra
    }

    // Tag data

    pub fn load_csv(&mut self, name: &str, csv: &str) -> Result<usize, IngestError> {
        self.tags.load_csv(name, csv)
    }

    pub fn add_csv(&mut self, name: &str, csv: &str) -> Result<usize, IngestError> {
        self.tags.add_csv(name, csv)
    }

    pub fn clear_csv(&mut self) {
        self.tags.clear_csv();
    }

    pub fn add_loaded_csv(&mut self, names: &[String]) -> ToggleOutcome {
        self.tags.add_loaded_csv(names)
    }

    /// Read a CSV file and add it as source `name`.
    pub async fn add_csv_file(&mut self, name: &str, path: &Path) -> Result<usize, IngestError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| IngestError::Io {
                source: name.to_string(),
                message: format!("{}: {}", path.display(), e),
            })?;
        self.tags.add_csv(name, &text)
    }

    /// Load every CSV file named in the configuration.
    ///
    /// A file that fails is logged and skipped. Returns the number of
    /// entries added.
    pub async fn load_configured_csv(&mut self) -> usize {
        let sources = match self.config.csv_sources() {
            Ok(sources) => sources,
            Err(e) => {
                tracing::error!("Invalid CSV configuration: {}", e);
                return 0;
            }
        };

        let mut added = 0;
        for (name, path) in sources {
            match self.add_csv_file(&name, &path).await {
                Ok(count) => added += count,
                Err(e) => tracing::error!("{}", e),
            }
        }
        added
    }

    pub fn add_data(&mut self, kind: &str, names: &[String], clear: bool) {
        self.extra.add_data(kind, names, clear);
    }

    /// Number of ingested entries, aliases included
    pub fn get_count(&self) -> usize {
        self.tags.count()
    }

    pub fn update_filtered_tags(&mut self) {
        self.tags.update_filtered_tags();
    }

    pub fn set_threshold(&mut self, threshold: f64) {
        self.tags.set_threshold(threshold);
    }

    // Completion

    /// Register the tag completion source for every configured language.
    pub fn register_completion_sources(&mut self, host: &mut dyn EditorHost) {
        self.dispose_completion_sources(host);
        for language in &self.config.languages {
            self.completion_sources
                .push(host.register_completion_source(language));
        }
    }

    pub fn dispose_completion_sources(&mut self, host: &mut dyn EditorHost) {
        for handle in self.completion_sources.drain(..) {
            host.dispose_completion_source(handle);
        }
    }

    /// Tag and extra-network suggestions for a request.
    pub fn complete(&self, request: &CompletionRequest) -> CompletionList {
        completion::provide(&self.tags, &self.extra, request)
    }

    /// Answer a completion request routed by the host to `handle`.
    ///
    /// `None` when the handle belongs to neither the tag source nor the open
    /// dynamic session.
    pub fn provide(
        &mut self,
        handle: SourceHandle,
        request: &CompletionRequest,
    ) -> Option<CompletionList> {
        if self.completion_sources.contains(&handle) {
            return Some(self.complete(request));
        }
        self.dynamic.provide(handle)
    }

    // Dynamic suggestions

    pub fn dynamic_suggest(&self) -> &DynamicSuggestRegistry {
        &self.dynamic
    }

    pub fn register_dynamic_suggest(
        &mut self,
        id: &str,
        keybinding: &str,
        producer: Arc<dyn SuggestProducer>,
    ) {
        self.dynamic.register(id, keybinding, producer);
    }

    pub fn unregister_dynamic_suggest(&mut self, id: &str) -> bool {
        self.dynamic.unregister(id)
    }

    /// Register the snippet producer when a snippet directory is configured.
    pub fn register_snippets(&mut self) -> usize {
        let Some(dir) = self.config.snippet_dir.clone() else {
            return 0;
        };
        let producer = SnippetProducer::from_dir(&dir);
        let count = producer.snippets().len();
        let keybinding = self.config.snippet_keybinding.clone();
        self.dynamic.register(SNIPPETS_ID, &keybinding, Arc::new(producer));
        count
    }

    pub async fn trigger_dynamic_suggest(
        &mut self,
        id: &str,
        host: &mut dyn EditorHost,
    ) -> TriggerOutcome {
        self.dynamic.trigger(id, host).await
    }

    /// Trigger the producer bound to a keybinding, if any.
    pub async fn handle_keybinding(
        &mut self,
        keybinding: &str,
        host: &mut dyn EditorHost,
    ) -> Option<TriggerOutcome> {
        let id = self.dynamic.id_for_keybinding(keybinding)?.to_string();
        Some(self.dynamic.trigger(&id, host).await)
    }

    /// Dispose a dynamic session whose list was delivered.
    pub fn tick(&mut self, host: &mut dyn EditorHost) -> bool {
        self.dynamic.tick(host)
    }

    // Instances and settings

    pub fn instances(&self) -> &InstanceRegistry {
        &self.instances
    }

    pub fn instances_mut(&mut self) -> &mut InstanceRegistry {
        &mut self.instances
    }

    /// Create an instance with the configured defaults overlaid by the
    /// settings received so far.
    ///
    /// Every field is presented to the new instance, even when it matches
    /// the defaults.
    pub fn create_instance(&mut self, presenter: Box<dyn SettingsPresenter>) -> InstanceId {
        let settings = self.settings.resolve(&self.config.defaults);
        let initial = PartialInstanceSettings::from(&settings);
        let id = self.instances.create(settings, presenter);
        SettingsSyncBroker::new(&mut self.instances, &mut self.tags).apply(
            ApplyTarget::Created(id),
            &initial,
            true,
        );
        id
    }

    pub fn dispose_instance(&mut self, id: InstanceId) -> bool {
        self.instances.dispose(id).is_some()
    }

    pub fn get_settings(&self, id: InstanceId) -> Option<&InstanceSettings> {
        self.instances.get(id).map(|instance| instance.settings())
    }

    /// Apply settings changed on one instance and broadcast the changes.
    pub fn set_settings(
        &mut self,
        id: InstanceId,
        settings: &PartialInstanceSettings,
        force: bool,
    ) -> ApplyReport {
        SettingsSyncBroker::new(&mut self.instances, &mut self.tags).apply(
            ApplyTarget::Instance(id),
            settings,
            force,
        )
    }

    /// Take externally provided settings and apply them to every instance.
    pub fn update_settings(&mut self, settings: &PartialInstanceSettings) -> ApplyReport {
        let mut merged = settings.clone();
        merged.merge_from(&self.settings);
        self.settings = merged;

        if let Some(replace) = settings.replace_underscore {
            self.tags.set_replace_underscore(replace);
        }
        SettingsSyncBroker::new(&mut self.instances, &mut self.tags).apply(
            ApplyTarget::All,
            settings,
            true,
        )
    }

    /// Load the persisted settings and apply them to every instance.
    pub async fn load_settings(
        &mut self,
        store: &dyn SettingsStore,
    ) -> Result<ApplyReport, SettingsError> {
        match self.persister.load(store).await? {
            Some(editor) => Ok(self.update_settings(&editor)),
            None => Ok(ApplyReport::default()),
        }
    }

    /// Persist an instance's settings unless they equal the last saved ones.
    pub async fn save_settings(
        &mut self,
        store: &dyn SettingsStore,
        id: InstanceId,
    ) -> Result<bool, SettingsError> {
        let Some(current) = self.get_settings(id).cloned() else {
            return Ok(false);
        };
        self.persister.save(store, &current).await
    }
}
