//! Setting change hooks.
//!
//! Callbacks registered per instance and run after a setting change has
//! been applied to it. A hook is registered either for one field or for
//! every change.

use std::collections::HashMap;

use crate::instances::InstanceId;
use crate::settings_sync::{SettingChange, SettingField};

/// Type for hook callbacks
pub type HookCallback = Box<dyn Fn(InstanceId, &SettingChange) + Send + Sync>;

/// Registry for managing hooks
#[derive(Default)]
pub struct HookRegistry {
    /// Map from field to list of callbacks
    hooks: HashMap<SettingField, Vec<HookCallback>>,
    /// Callbacks run for every field
    any: Vec<HookCallback>,
}

impl HookRegistry {
    /// Create a new hook registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a hook callback for a specific field
    pub fn add_hook(&mut self, field: SettingField, callback: HookCallback) {
        self.hooks.entry(field).or_default().push(callback);
    }

    /// Add a hook callback run for every change
    pub fn add_any_hook(&mut self, callback: HookCallback) {
        self.any.push(callback);
    }

    /// Remove all hooks for a specific field
    pub fn remove_hooks(&mut self, field: SettingField) {
        self.hooks.remove(&field);
    }

    /// Number of hooks that would run for `field`
    pub fn hook_count(&self, field: SettingField) -> usize {
        self.hooks.get(&field).map_or(0, Vec::len) + self.any.len()
    }

    /// Run the field's hooks, then the catch-all hooks
    pub fn run_hooks(&self, instance: InstanceId, change: &SettingChange) {
        let field = change.field();
        if let Some(hooks) = self.hooks.get(&field) {
            for callback in hooks {
                callback(instance, change);
            }
        }
        for callback in &self.any {
            callback(instance, change);
        }
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("fields", &self.hooks.keys().collect::<Vec<_>>())
            .field("any", &self.any.len())
            .finish()
    }
}
