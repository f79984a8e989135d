//! Live editor instances.
//!
//! Instances are kept in ascending id order, which is the order broadcasts
//! visit them in.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::InstanceSettings;
use crate::hooks::{HookCallback, HookRegistry};
use crate::settings_sync::{SettingChange, SettingField};

/// Identifier of an editor instance, unique for the engine's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Presentation side of an instance (the widget that shows the settings).
pub trait SettingsPresenter {
    /// Show an applied setting change.
    fn apply(&mut self, change: &SettingChange);

    /// Move keyboard focus to this instance.
    fn focus(&mut self) {}
}

/// Presenter that displays nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl SettingsPresenter for NullPresenter {
    fn apply(&mut self, _change: &SettingChange) {}
}

/// One editor instance: its settings, its presenter and its change hooks
pub struct EditorInstance {
    id: InstanceId,
    settings: InstanceSettings,
    presenter: Box<dyn SettingsPresenter>,
    hooks: HookRegistry,
}

impl EditorInstance {
    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn settings(&self) -> &InstanceSettings {
        &self.settings
    }

    pub fn hooks_mut(&mut self) -> &mut HookRegistry {
        &mut self.hooks
    }

    /// Apply a change: presenter first, then the stored settings, then hooks.
    pub fn apply_change(&mut self, change: &SettingChange) {
        self.presenter.apply(change);
        change.apply_to(&mut self.settings);
        self.hooks.run_hooks(self.id, change);
    }

    pub fn focus(&mut self) {
        self.presenter.focus();
    }
}

impl fmt::Debug for EditorInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorInstance")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .field("hooks", &self.hooks)
            .finish()
    }
}

/// Every live instance, ordered by id.
#[derive(Debug, Default)]
pub struct InstanceRegistry {
    instances: BTreeMap<InstanceId, EditorInstance>,
    next_id: u64,
    last_focused: Option<InstanceId>,
}

impl InstanceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an instance with the given settings.
    pub fn create(
        &mut self,
        settings: InstanceSettings,
        presenter: Box<dyn SettingsPresenter>,
    ) -> InstanceId {
        self.next_id += 1;
        let id = InstanceId(self.next_id);
        self.instances.insert(
            id,
            EditorInstance {
                id,
                settings,
                presenter,
                hooks: HookRegistry::new(),
            },
        );
        tracing::debug!("Created editor instance {}", id);
        id
    }

    /// Remove an instance. Disposing an unknown id does nothing.
    pub fn dispose(&mut self, id: InstanceId) -> Option<EditorInstance> {
        if self.last_focused == Some(id) {
            self.last_focused = None;
        }
        let removed = self.instances.remove(&id);
        if removed.is_some() {
            tracing::debug!("Disposed editor instance {}", id);
        }
        removed
    }

    pub fn get(&self, id: InstanceId) -> Option<&EditorInstance> {
        self.instances.get(&id)
    }

    pub fn get_mut(&mut self, id: InstanceId) -> Option<&mut EditorInstance> {
        self.instances.get_mut(&id)
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Instance ids in ascending order
    pub fn ids(&self) -> Vec<InstanceId> {
        self.instances.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EditorInstance> {
        self.instances.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut EditorInstance> {
        self.instances.values_mut()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Focus an instance and remember it as last focused.
    pub fn focus(&mut self, id: InstanceId) -> bool {
        let Some(instance) = self.instances.get_mut(&id) else {
            return false;
        };
        instance.focus();
        self.last_focused = Some(id);
        true
    }

    pub fn last_focused(&self) -> Option<InstanceId> {
        self.last_focused
    }

    /// Register a change hook on one instance.
    pub fn add_hook(
        &mut self,
        id: InstanceId,
        field: Option<SettingField>,
        callback: HookCallback,
    ) -> bool {
        let Some(instance) = self.instances.get_mut(&id) else {
            return false;
        };
        match field {
            Some(field) => instance.hooks.add_hook(field, callback),
            None => instance.hooks.add_any_hook(callback),
        }
        true
    }
}
