//! Partial instance settings for layered merging.
//!
//! Every field is optional. A partial is what `apply` receives and what the
//! persisted settings document stores: absent fields leave the target
//! untouched.

use crate::config::{EditorMode, InstanceSettings};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Trait for merging configuration layers.
/// Higher precedence values (self) override lower precedence (other).
pub trait Merge {
    /// Merge values from a lower-precedence layer into this layer.
    /// Values already set in self take precedence over values in other.
    fn merge_from(&mut self, other: &Self);
}

impl<T: Clone> Merge for Option<T> {
    fn merge_from(&mut self, other: &Self) {
        if self.is_none() {
            *self = other.clone();
        }
    }
}

/// Merge two toggle maps where self's entries take precedence.
fn merge_toggle_map(
    target: &mut Option<BTreeMap<String, bool>>,
    other: &Option<BTreeMap<String, bool>>,
) {
    match (target, other) {
        (Some(t), Some(o)) => {
            for (key, value) in o {
                t.entry(key.clone()).or_insert(*value);
            }
        }
        (t @ None, Some(o)) => {
            *t = Some(o.clone());
        }
        _ => {}
    }
}

/// Instance settings where all fields are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default, rename_all = "camelCase")]
pub struct PartialInstanceSettings {
    pub minimap: Option<bool>,
    pub line_numbers: Option<bool>,
    pub replace_underscore: Option<bool>,
    pub mode: Option<EditorMode>,
    pub theme: Option<String>,
    pub language: Option<String>,
    pub show_header: Option<bool>,
    pub font_size: Option<u32>,
    pub font_family: Option<String>,
    pub csv_toggle: Option<BTreeMap<String, bool>>,
}

impl Merge for PartialInstanceSettings {
    fn merge_from(&mut self, other: &Self) {
        self.minimap.merge_from(&other.minimap);
        self.line_numbers.merge_from(&other.line_numbers);
        self.replace_underscore.merge_from(&other.replace_underscore);
        self.mode.merge_from(&other.mode);
        self.theme.merge_from(&other.theme);
        self.language.merge_from(&other.language);
        self.show_header.merge_from(&other.show_header);
        self.font_size.merge_from(&other.font_size);
        self.font_family.merge_from(&other.font_family);
        merge_toggle_map(&mut self.csv_toggle, &other.csv_toggle);
    }
}

impl PartialInstanceSettings {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Resolve to full settings, filling unset fields from `defaults`.
    pub fn resolve(&self, defaults: &InstanceSettings) -> InstanceSettings {
        let mut merged = self.clone();
        merged.merge_from(&PartialInstanceSettings::from(defaults));
        InstanceSettings {
            minimap: merged.minimap.unwrap_or(defaults.minimap),
            line_numbers: merged.line_numbers.unwrap_or(defaults.line_numbers),
            replace_underscore: merged.replace_underscore.unwrap_or(defaults.replace_underscore),
            mode: merged.mode.unwrap_or(defaults.mode),
            theme: merged.theme.unwrap_or_else(|| defaults.theme.clone()),
            language: merged.language.unwrap_or_else(|| defaults.language.clone()),
            show_header: merged.show_header.unwrap_or(defaults.show_header),
            font_size: merged.font_size.unwrap_or(defaults.font_size),
            font_family: merged.font_family.unwrap_or_else(|| defaults.font_family.clone()),
            csv_toggle: merged.csv_toggle.unwrap_or_default(),
        }
    }
}

impl From<&InstanceSettings> for PartialInstanceSettings {
    fn from(settings: &InstanceSettings) -> Self {
        Self {
            minimap: Some(settings.minimap),
            line_numbers: Some(settings.line_numbers),
            replace_underscore: Some(settings.replace_underscore),
            mode: Some(settings.mode),
            theme: Some(settings.theme.clone()),
            language: Some(settings.language.clone()),
            show_header: Some(settings.show_header),
            font_size: Some(settings.font_size),
            font_family: Some(settings.font_family.clone()),
            csv_toggle: Some(settings.csv_toggle.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_keeps_higher_layer() {
        let mut high = PartialInstanceSettings {
            theme: Some("vs-dark".to_string()),
            csv_toggle: Some(BTreeMap::from([("p.a".to_string(), false)])),
            ..Default::default()
        };
        let low = PartialInstanceSettings {
            theme: Some("vs".to_string()),
            minimap: Some(true),
            csv_toggle: Some(BTreeMap::from([
                ("p.a".to_string(), true),
                ("p.b".to_string(), true),
            ])),
            ..Default::default()
        };
        high.merge_from(&low);
        assert_eq!(high.theme.as_deref(), Some("vs-dark"));
        assert_eq!(high.minimap, Some(true));
        assert_eq!(
            high.csv_toggle,
            Some(BTreeMap::from([
                ("p.a".to_string(), false),
                ("p.b".to_string(), true),
            ]))
        );
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let partial: PartialInstanceSettings =
            serde_json::from_str(r#"{"fontSize": 18, "mode": "NORMAL"}"#).unwrap();
        let resolved = partial.resolve(&InstanceSettings::default());
        assert_eq!(resolved.font_size, 18);
        assert_eq!(resolved.mode, EditorMode::Normal);
        assert_eq!(resolved.theme, InstanceSettings::default().theme);
    }

    #[test]
    fn test_full_settings_round_trip_through_partial() {
        let settings = InstanceSettings::default();
        let partial = PartialInstanceSettings::from(&settings);
        assert!(!partial.is_empty());
        assert_eq!(partial.resolve(&InstanceSettings::default()), settings);
        assert!(PartialInstanceSettings::default().is_empty());
    }
}
