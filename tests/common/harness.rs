// EngineTestHarness - an engine, an in-memory editor buffer and recording
// presenters for integration tests

#![allow(dead_code)]

use prompt_editor::config::EngineConfig;
use prompt_editor::host::{EditorHost, Position, PromptBuffer};
use prompt_editor::instances::{InstanceId, SettingsPresenter};
use prompt_editor::services::completion::{CompletionList, CompletionRequest};
use prompt_editor::settings_sync::SettingChange;
use prompt_editor::PromptEngine;
use std::sync::{Arc, Mutex};

/// Something a presenter was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Apply(usize, SettingChange),
    Focus(usize),
}

/// Shared log written by every recording presenter of a harness
#[derive(Debug, Clone, Default)]
pub struct PresenterLog {
    entries: Arc<Mutex<Vec<Recorded>>>,
}

impl PresenterLog {
    pub fn push(&self, entry: Recorded) {
        self.entries.lock().unwrap().push(entry);
    }

    pub fn entries(&self) -> Vec<Recorded> {
        self.entries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    /// Number of apply-primitive calls
    pub fn apply_calls(&self) -> usize {
        self.entries()
            .iter()
            .filter(|e| matches!(e, Recorded::Apply(..)))
            .count()
    }

    /// Changes applied, in call order
    pub fn changes(&self) -> Vec<SettingChange> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Apply(_, change) => Some(change),
                Recorded::Focus(_) => None,
            })
            .collect()
    }

    /// Presenters that received `change`, in call order
    pub fn receivers(&self, change: &SettingChange) -> Vec<usize> {
        self.entries()
            .into_iter()
            .filter_map(|e| match e {
                Recorded::Apply(index, c) if &c == change => Some(index),
                _ => None,
            })
            .collect()
    }
}

/// Presenter that records every call into a shared log
pub struct RecordingPresenter {
    index: usize,
    log: PresenterLog,
}

impl SettingsPresenter for RecordingPresenter {
    fn apply(&mut self, change: &SettingChange) {
        self.log.push(Recorded::Apply(self.index, change.clone()));
    }

    fn focus(&mut self) {
        self.log.push(Recorded::Focus(self.index));
    }
}

pub struct EngineTestHarness {
    pub engine: PromptEngine,
    pub buffer: PromptBuffer,
    pub log: PresenterLog,
    spawned: usize,
}

impl EngineTestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            engine: PromptEngine::new(config),
            buffer: PromptBuffer::new(""),
            log: PresenterLog::default(),
            spawned: 0,
        }
    }

    /// Harness with CSV sources added in order
    pub fn with_sources(sources: &[(&str, &str)]) -> Self {
        let mut harness = Self::new();
        for (name, csv) in sources {
            harness.engine.add_csv(name, csv).unwrap();
        }
        harness
    }

    /// Create `count` instances with recording presenters, numbered from the
    /// number of instances spawned so far.
    pub fn spawn_instances(&mut self, count: usize) -> Vec<InstanceId> {
        (0..count)
            .map(|_| {
                let presenter = RecordingPresenter {
                    index: self.spawned,
                    log: self.log.clone(),
                };
                self.spawned += 1;
                self.engine.create_instance(Box::new(presenter))
            })
            .collect()
    }

    /// Replace the buffer with `line` and put the cursor at `column`
    pub fn set_line(&mut self, line: &str, column: usize) {
        self.buffer = PromptBuffer::new(line);
        self.buffer.set_cursor(Position::new(0, column));
    }

    /// Complete at the cursor through the registered tag source
    pub fn complete(&mut self, trigger: Option<char>) -> CompletionList {
        self.engine.register_completion_sources(&mut self.buffer);
        let handle = self.buffer.registered_sources()[0].0;
        let request = CompletionRequest::from_host(&self.buffer, trigger);
        let list = self.engine.provide(handle, &request).unwrap();
        self.engine.dispose_completion_sources(&mut self.buffer);
        list
    }

    pub fn cursor_line(&self) -> String {
        self.buffer.cursor().line_text
    }
}
