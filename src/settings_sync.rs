//! Settings fan-out across editor instances.
//!
//! Settings arrive as a [`PartialInstanceSettings`]: from a user changing one
//! instance, or from a loaded settings document meant for every instance.
//! Each present field is compared with the target's current value and only
//! real changes are applied, so a broadcast never echoes back into another
//! broadcast.
//!
//! Fields are processed in a fixed order (see [`SettingField::ORDER`]).

use std::collections::BTreeMap;

use crate::config::{enabled_sources, EditorMode, InstanceSettings};
use crate::instances::{InstanceId, InstanceRegistry};
use crate::partial_config::PartialInstanceSettings;
use crate::services::tags::{TagStore, ToggleOutcome};

/// A settings field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SettingField {
    Minimap,
    ShowHeader,
    LineNumbers,
    ReplaceUnderscore,
    Language,
    Theme,
    Mode,
    FontSize,
    FontFamily,
    CsvToggle,
}

impl SettingField {
    /// Order in which fields are applied
    pub const ORDER: [SettingField; 10] = [
        Self::Minimap,
        Self::ShowHeader,
        Self::LineNumbers,
        Self::ReplaceUnderscore,
        Self::Language,
        Self::Theme,
        Self::Mode,
        Self::FontSize,
        Self::FontFamily,
        Self::CsvToggle,
    ];
}

/// A single field change, as shown by presenters and passed to hooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingChange {
    Minimap(bool),
    ShowHeader(bool),
    LineNumbers(bool),
    ReplaceUnderscore(bool),
    Language(String),
    Theme(String),
    Mode(EditorMode),
    FontSize(u32),
    FontFamily(String),
    CsvToggle { key: String, enabled: bool },
}

impl SettingChange {
    pub fn field(&self) -> SettingField {
        match self {
            Self::Minimap(_) => SettingField::Minimap,
            Self::ShowHeader(_) => SettingField::ShowHeader,
            Self::LineNumbers(_) => SettingField::LineNumbers,
            Self::ReplaceUnderscore(_) => SettingField::ReplaceUnderscore,
            Self::Language(_) => SettingField::Language,
            Self::Theme(_) => SettingField::Theme,
            Self::Mode(_) => SettingField::Mode,
            Self::FontSize(_) => SettingField::FontSize,
            Self::FontFamily(_) => SettingField::FontFamily,
            Self::CsvToggle { .. } => SettingField::CsvToggle,
        }
    }

    /// Write the change into stored settings.
    pub fn apply_to(&self, settings: &mut InstanceSettings) {
        match self {
            Self::Minimap(v) => settings.minimap = *v,
            Self::ShowHeader(v) => settings.show_header = *v,
            Self::LineNumbers(v) => settings.line_numbers = *v,
            Self::ReplaceUnderscore(v) => settings.replace_underscore = *v,
            Self::Language(v) => settings.language = v.clone(),
            Self::Theme(v) => settings.theme = v.clone(),
            Self::Mode(v) => settings.mode = *v,
            Self::FontSize(v) => settings.font_size = *v,
            Self::FontFamily(v) => settings.font_family = v.clone(),
            Self::CsvToggle { key, enabled } => {
                settings.csv_toggle.insert(key.clone(), *enabled);
            }
        }
    }

    /// Incoming value of a scalar field. `None` when absent, and always for
    /// `CsvToggle`, which is diffed per key.
    pub fn incoming(field: SettingField, partial: &PartialInstanceSettings) -> Option<Self> {
        match field {
            SettingField::Minimap => partial.minimap.map(Self::Minimap),
            SettingField::ShowHeader => partial.show_header.map(Self::ShowHeader),
            SettingField::LineNumbers => partial.line_numbers.map(Self::LineNumbers),
            SettingField::ReplaceUnderscore => {
                partial.replace_underscore.map(Self::ReplaceUnderscore)
            }
            SettingField::Language => partial.language.clone().map(Self::Language),
            SettingField::Theme => partial.theme.clone().map(Self::Theme),
            SettingField::Mode => partial.mode.map(Self::Mode),
            SettingField::FontSize => partial.font_size.map(Self::FontSize),
            SettingField::FontFamily => partial.font_family.clone().map(Self::FontFamily),
            SettingField::CsvToggle => None,
        }
    }

    /// Current value of a scalar field. `None` for `CsvToggle`.
    pub fn current(field: SettingField, settings: &InstanceSettings) -> Option<Self> {
        let partial = PartialInstanceSettings::from(settings);
        Self::incoming(field, &partial)
    }
}

/// Whether an incoming value has to be applied.
pub fn should_apply<T: PartialEq + ?Sized>(incoming: &T, current: &T, force: bool) -> bool {
    force || incoming != current
}

/// Instances a settings object is applied to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyTarget {
    /// Compare against one instance; its changes are broadcast to all
    Instance(InstanceId),
    /// Compare and update every instance individually
    All,
    /// Present settings to one newly created instance only. Nothing is
    /// broadcast and the tag store is left alone.
    Created(InstanceId),
}

/// What an apply call changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Fields that changed on at least one instance, in apply order
    pub changed: Vec<SettingField>,
    /// Number of presenter `apply` calls made
    pub applied: usize,
    /// Result of the CSV source recomputation, when a toggle map was given
    pub csv: Option<ToggleOutcome>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Applies settings to instances and keeps the tag store in step.
pub struct SettingsSyncBroker<'a> {
    instances: &'a mut InstanceRegistry,
    tags: &'a mut TagStore,
}

impl<'a> SettingsSyncBroker<'a> {
    pub fn new(instances: &'a mut InstanceRegistry, tags: &'a mut TagStore) -> Self {
        Self { instances, tags }
    }

    /// Apply `settings` to `target`. With `force` every present field is
    /// applied even when it matches.
    pub fn apply(
        &mut self,
        target: ApplyTarget,
        settings: &PartialInstanceSettings,
        force: bool,
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        if let ApplyTarget::Instance(id) | ApplyTarget::Created(id) = target {
            if !self.instances.contains(id) {
                tracing::warn!("Settings applied to unknown instance {}", id);
                return report;
            }
        }

        for field in SettingField::ORDER {
            if field == SettingField::CsvToggle {
                if let Some(toggle) = &settings.csv_toggle {
                    self.apply_csv_toggle(target, toggle, force, &mut report);
                }
                continue;
            }

            let Some(change) = SettingChange::incoming(field, settings) else {
                continue;
            };
            let applied = match target {
                ApplyTarget::Instance(origin) => {
                    let current = self
                        .instances
                        .get(origin)
                        .and_then(|instance| SettingChange::current(field, instance.settings()));
                    if should_apply(&Some(&change), &current.as_ref(), force) {
                        self.broadcast(&change)
                    } else {
                        0
                    }
                }
                ApplyTarget::All => self.apply_each(&change, force),
                ApplyTarget::Created(id) => self.apply_one(id, &change, force),
            };
            if applied == 0 {
                continue;
            }

            tracing::debug!("Applied {:?} to {} instance(s)", change, applied);
            report.applied += applied;
            report.changed.push(field);

            match (&change, target) {
                (_, ApplyTarget::Created(_)) => {}
                (SettingChange::ReplaceUnderscore(replace), _) => {
                    self.tags.set_replace_underscore(*replace);
                }
                (SettingChange::Mode(_), ApplyTarget::Instance(origin)) => {
                    self.instances.focus(origin);
                }
                _ => {}
            }
        }

        report
    }

    fn apply_csv_toggle(
        &mut self,
        target: ApplyTarget,
        incoming: &BTreeMap<String, bool>,
        force: bool,
        report: &mut ApplyReport,
    ) {
        let mut applied = 0;
        for (key, enabled) in incoming {
            let change = SettingChange::CsvToggle {
                key: key.clone(),
                enabled: *enabled,
            };
            applied += match target {
                ApplyTarget::Instance(origin) => {
                    let current = self
                        .instances
                        .get(origin)
                        .and_then(|instance| instance.settings().csv_toggle.get(key).copied());
                    if should_apply(&Some(*enabled), &current, force) {
                        self.broadcast(&change)
                    } else {
                        0
                    }
                }
                ApplyTarget::All => self.apply_each(&change, force),
                ApplyTarget::Created(id) => self.apply_one(id, &change, force),
            };
        }

        if applied > 0 {
            report.applied += applied;
            report.changed.push(SettingField::CsvToggle);
        }

        // A new instance only shows the map it was created with
        if let ApplyTarget::Created(_) = target {
            return;
        }

        // The resulting map: the origin's, or the first instance's for a
        // fan-out. Without instances the incoming map stands in.
        let reference = match target {
            ApplyTarget::Instance(origin) | ApplyTarget::Created(origin) => {
                self.instances.get(origin)
            }
            ApplyTarget::All => self.instances.iter().next(),
        };
        let mut enabled = match reference {
            Some(instance) => instance.settings().enabled_sources(),
            None => enabled_sources(incoming),
        };
        // Rebuild in load order; names never loaded go last
        let loaded = self.tags.loaded_csv();
        enabled.sort_by_key(|name| {
            loaded
                .iter()
                .position(|source| source == name)
                .unwrap_or(usize::MAX)
        });
        report.csv = Some(self.tags.add_loaded_csv(&enabled));
    }

    /// Apply a change to every instance. Returns the number of instances.
    fn broadcast(&mut self, change: &SettingChange) -> usize {
        let mut count = 0;
        for instance in self.instances.iter_mut() {
            instance.apply_change(change);
            count += 1;
        }
        count
    }

    /// Apply a change to a single instance if its current value differs.
    fn apply_one(&mut self, id: InstanceId, change: &SettingChange, force: bool) -> usize {
        let Some(instance) = self.instances.get_mut(id) else {
            return 0;
        };
        let current = match change {
            SettingChange::CsvToggle { key, .. } => instance
                .settings()
                .csv_toggle
                .get(key)
                .map(|enabled| SettingChange::CsvToggle {
                    key: key.clone(),
                    enabled: *enabled,
                }),
            _ => SettingChange::current(change.field(), instance.settings()),
        };
        if !should_apply(&Some(change), &current.as_ref(), force) {
            return 0;
        }
        instance.apply_change(change);
        1
    }

    /// Apply a change to each instance whose current value differs.
    fn apply_each(&mut self, change: &SettingChange, force: bool) -> usize {
        let mut count = 0;
        for instance in self.instances.iter_mut() {
            let differs = match change {
                SettingChange::CsvToggle { key, enabled } => should_apply(
                    &Some(*enabled),
                    &instance.settings().csv_toggle.get(key).copied(),
                    force,
                ),
                _ => should_apply(
                    &Some(change),
                    &SettingChange::current(change.field(), instance.settings()).as_ref(),
                    force,
                ),
            };
            if differs {
                instance.apply_change(change);
                count += 1;
            }
        }
        count
    }
}
