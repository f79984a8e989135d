// Settings fan-out across instances: broadcast, per-field diffing, CSV
// toggles and change hooks

mod common;

use common::harness::{EngineTestHarness, Recorded};
use prompt_editor::config::EditorMode;
use prompt_editor::partial_config::PartialInstanceSettings;
use prompt_editor::services::tags::ToggleOutcome;
use prompt_editor::settings_sync::{SettingChange, SettingField};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const A: &str = "a1,0,500,\"a1x,a1y\"\na2,0,300,\n";
const B: &str = "b1,0,1000,\nb2,0,200,b2x\n";

fn theme(name: &str) -> PartialInstanceSettings {
    PartialInstanceSettings {
        theme: Some(name.to_string()),
        ..Default::default()
    }
}

fn toggles(entries: &[(&str, bool)]) -> PartialInstanceSettings {
    PartialInstanceSettings {
        csv_toggle: Some(
            entries
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect::<BTreeMap<_, _>>(),
        ),
        ..Default::default()
    }
}

#[test]
fn test_theme_change_broadcasts_once_in_id_order() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(3);
    harness.log.clear();

    let report = harness.engine.set_settings(ids[1], &theme("vs-dark"), false);
    assert_eq!(report.changed, vec![SettingField::Theme]);
    assert_eq!(report.applied, 3);

    let change = SettingChange::Theme("vs-dark".to_string());
    assert_eq!(harness.log.receivers(&change), vec![0, 1, 2]);
    for id in &ids {
        assert_eq!(harness.engine.get_settings(*id).unwrap().theme, "vs-dark");
    }

    // Same value again: nothing reaches the presenters
    let report = harness.engine.set_settings(ids[2], &theme("vs-dark"), false);
    assert!(report.is_empty());
    assert_eq!(harness.log.apply_calls(), 3);
}

#[test]
fn test_force_reapplies_unchanged_values() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(2);
    let current = harness.engine.get_settings(ids[0]).unwrap().theme.clone();

    let report = harness.engine.set_settings(ids[0], &theme(&current), true);
    assert_eq!(report.applied, 2);
}

#[test]
fn test_fields_apply_in_fixed_order() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(1);
    harness.log.clear();

    let settings = PartialInstanceSettings {
        font_family: Some("monospace".to_string()),
        minimap: Some(true),
        mode: Some(EditorMode::Normal),
        language: Some("sd-dynamic-prompt".to_string()),
        show_header: Some(false),
        font_size: Some(18),
        line_numbers: Some(false),
        replace_underscore: Some(true),
        theme: Some("hc-black".to_string()),
        csv_toggle: None,
    };
    let report = harness.engine.set_settings(ids[0], &settings, false);
    assert_eq!(
        report.changed,
        vec![
            SettingField::Minimap,
            SettingField::ShowHeader,
            SettingField::LineNumbers,
            SettingField::ReplaceUnderscore,
            SettingField::Language,
            SettingField::Theme,
            SettingField::Mode,
            SettingField::FontSize,
            SettingField::FontFamily,
        ]
    );
    let fields: Vec<SettingField> = harness.log.changes().iter().map(|c| c.field()).collect();
    assert_eq!(fields, report.changed);
}

#[test]
fn test_absent_fields_are_untouched() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(1);
    let before = harness.engine.get_settings(ids[0]).unwrap().clone();

    let report = harness
        .engine
        .set_settings(ids[0], &PartialInstanceSettings::default(), true);
    assert!(report.is_empty());
    assert_eq!(harness.engine.get_settings(ids[0]).unwrap(), &before);
}

#[test]
fn test_mode_change_refocuses_origin() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(3);

    let settings = PartialInstanceSettings {
        mode: Some(EditorMode::Normal),
        ..Default::default()
    };
    harness.engine.set_settings(ids[1], &settings, false);

    assert_eq!(harness.engine.instances().last_focused(), Some(ids[1]));
    assert_eq!(harness.log.entries().last(), Some(&Recorded::Focus(1)));
}

#[test]
fn test_replace_underscore_reaches_completion() {
    let mut harness = EngineTestHarness::with_sources(&[("t", "blue_sky,0,500,\n")]);
    let ids = harness.spawn_instances(2);

    harness.engine.set_settings(
        ids[0],
        &PartialInstanceSettings {
            replace_underscore: Some(true),
            ..Default::default()
        },
        false,
    );
    assert!(harness.engine.tags().replace_underscore());

    harness.set_line("bl", 2);
    let list = harness.complete(None);
    assert_eq!(list.suggestions[0].insert_text, "blue sky");
}

#[test]
fn test_fan_out_compares_each_instance() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(3);
    // Only the first instance already has the theme
    harness
        .engine
        .instances_mut()
        .get_mut(ids[0])
        .unwrap()
        .apply_change(&SettingChange::Theme("vs-dark".to_string()));
    harness.log.clear();

    let report = harness.engine.update_settings(&theme("vs-dark"));
    // Forced: every instance gets it, each exactly once
    assert_eq!(report.applied, 3);
    assert_eq!(
        harness.log.receivers(&SettingChange::Theme("vs-dark".to_string())),
        vec![0, 1, 2]
    );
}

#[test]
fn test_csv_toggle_enabling_source_keeps_existing_entries() {
    let mut harness = EngineTestHarness::with_sources(&[("a", A), ("b", B)]);
    let ids = harness.spawn_instances(2);

    let report = harness.engine.set_settings(
        ids[0],
        &toggles(&[("prompt-editor.a", true), ("prompt-editor.b", false)]),
        false,
    );
    assert_eq!(report.csv, Some(ToggleOutcome::Rebuilt));
    assert_eq!(harness.engine.get_count(), 4);
    let before = harness.engine.tags().entries_from("a");

    let report = harness
        .engine
        .set_settings(ids[1], &toggles(&[("prompt-editor.b", true)]), false);
    assert_eq!(report.changed, vec![SettingField::CsvToggle]);
    assert_eq!(report.csv, Some(ToggleOutcome::Added(vec!["b".to_string()])));

    let after = harness.engine.tags().entries_from("a");
    assert_eq!(before.len(), after.len());
    assert!(before.iter().zip(&after).all(|(x, y)| Arc::ptr_eq(x, y)));
    assert_eq!(harness.engine.get_count(), 7);

    for id in &ids {
        let toggle = &harness.engine.get_settings(*id).unwrap().csv_toggle;
        assert_eq!(toggle.get("prompt-editor.b"), Some(&true));
    }
}

#[test]
fn test_csv_toggle_only_changed_keys_are_applied() {
    let mut harness = EngineTestHarness::with_sources(&[("a", A), ("b", B)]);
    let ids = harness.spawn_instances(1);
    harness.engine.set_settings(
        ids[0],
        &toggles(&[("prompt-editor.a", true), ("prompt-editor.b", true)]),
        false,
    );
    harness.log.clear();

    let report = harness.engine.set_settings(
        ids[0],
        &toggles(&[("prompt-editor.a", true), ("prompt-editor.b", false)]),
        false,
    );
    assert_eq!(
        harness.log.changes(),
        vec![SettingChange::CsvToggle {
            key: "prompt-editor.b".to_string(),
            enabled: false
        }]
    );
    assert_eq!(report.csv, Some(ToggleOutcome::Rebuilt));
    assert!(harness.engine.tags().entries_from("b").is_empty());

    // Unchanged map: recomputation is a no-op
    let report = harness.engine.set_settings(
        ids[0],
        &toggles(&[("prompt-editor.a", true), ("prompt-editor.b", false)]),
        false,
    );
    assert!(report.is_empty());
    assert_eq!(report.csv, Some(ToggleOutcome::Unchanged));
}

#[test]
fn test_csv_rebuild_keeps_load_order() {
    let mut harness = EngineTestHarness::with_sources(&[
        ("zeta", "z1,0,500,\n"),
        ("alpha", "a1,0,500,\n"),
        ("mid", "m1,0,500,\n"),
    ]);
    let ids = harness.spawn_instances(1);

    let report = harness.engine.set_settings(
        ids[0],
        &toggles(&[
            ("prompt-editor.alpha", true),
            ("prompt-editor.mid", false),
            ("prompt-editor.zeta", true),
        ]),
        false,
    );
    assert_eq!(report.csv, Some(ToggleOutcome::Rebuilt));
    assert_eq!(
        harness.engine.tags().enabled_csv(),
        vec!["zeta".to_string(), "alpha".to_string()]
    );
    let labels: Vec<String> = harness
        .engine
        .tags()
        .entries()
        .iter()
        .map(|entry| entry.label.clone())
        .collect();
    assert_eq!(labels, vec!["z1", "a1"]);
}

#[test]
fn test_change_hooks_run_after_presenter() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let any_calls = Arc::new(AtomicUsize::new(0));
    let log = harness.log.clone();
    let sink = Arc::clone(&seen);
    harness.engine.instances_mut().add_hook(
        ids[1],
        Some(SettingField::Theme),
        Box::new(move |id, change| {
            // The presenter already saw the change
            assert!(log.changes().contains(change));
            sink.lock().unwrap().push((id, change.clone()));
        }),
    );
    let counter = Arc::clone(&any_calls);
    harness.engine.instances_mut().add_hook(
        ids[0],
        None,
        Box::new(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
    );

    harness.engine.set_settings(ids[0], &theme("vs-dark"), false);
    harness.engine.set_settings(
        ids[0],
        &PartialInstanceSettings {
            minimap: Some(true),
            ..Default::default()
        },
        false,
    );

    assert_eq!(
        *seen.lock().unwrap(),
        vec![(ids[1], SettingChange::Theme("vs-dark".to_string()))]
    );
    assert_eq!(any_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_new_instance_is_shown_every_field() {
    let mut harness = EngineTestHarness::with_sources(&[("a", A)]);
    harness.engine.update_settings(&PartialInstanceSettings {
        theme: Some("vs-dark".to_string()),
        ..toggles(&[("prompt-editor.a", true)])
    });
    let before = harness.engine.get_count();

    let ids = harness.spawn_instances(1);
    let changes = harness.log.changes();
    let fields: Vec<SettingField> = changes.iter().map(|c| c.field()).collect();
    assert_eq!(fields, SettingField::ORDER.to_vec());
    assert!(changes.contains(&SettingChange::Theme("vs-dark".to_string())));
    // Values equal to the defaults are presented too
    assert!(changes.contains(&SettingChange::FontSize(14)));
    assert_eq!(harness.log.receivers(&SettingChange::Minimap(false)), vec![0]);
    assert_eq!(harness.engine.get_settings(ids[0]).unwrap().theme, "vs-dark");

    // Existing instances are not touched and tag data stays as it was
    harness.log.clear();
    harness.spawn_instances(1);
    assert_eq!(harness.log.receivers(&SettingChange::Minimap(false)), vec![1]);
    assert_eq!(harness.engine.get_count(), before);
    assert_eq!(harness.engine.instances().last_focused(), None);
}

#[test]
fn test_unknown_instance_is_ignored() {
    let mut harness = EngineTestHarness::new();
    let ids = harness.spawn_instances(1);
    harness.engine.dispose_instance(ids[0]);
    harness.log.clear();

    let report = harness.engine.set_settings(ids[0], &theme("vs-dark"), true);
    assert!(report.is_empty());
    assert_eq!(harness.log.apply_calls(), 0);
}
