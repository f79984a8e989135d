//! Capability interface to the embedded editor widget.
//!
//! The engine never talks to a concrete editor. Everything it needs goes
//! through [`EditorHost`]: the cursor and its line, word boundaries,
//! registration of completion sources, and opening the suggestion popup.
//!
//! [`PromptBuffer`] is a small in-memory implementation used by the
//! diagnostics binary and by tests.

use crate::primitives::word::{WordPattern, WordSpan};
use crate::services::completion::Suggestion;

/// Cursor position: 0-based line and 0-based character column
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Text of the cursor's line and the cursor position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorContext {
    pub line_text: String,
    pub position: Position,
}

/// Answer to a word-boundary query at a position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordQuery {
    /// Word touching the position, if any
    pub at: Option<WordSpan>,
    /// Part of that word before the position (0-width when there is none)
    pub until: WordSpan,
}

impl WordQuery {
    /// Query a line with the prompt word pattern.
    pub fn prompt(line: &str, column: usize) -> Self {
        let pattern = WordPattern::prompt();
        Self {
            at: pattern.word_at(line, column),
            until: pattern.word_until(line, column),
        }
    }
}

/// Handle of a completion source registered with the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceHandle(pub u64);

/// What the engine needs from an editor widget.
pub trait EditorHost {
    /// Current line text and cursor position.
    fn cursor(&self) -> CursorContext;

    /// Word boundaries at `position`.
    fn word_query(&self, position: Position) -> WordQuery;

    /// Register a completion source for a language id.
    ///
    /// The host routes completion requests for the returned handle back to
    /// `PromptEngine::provide`.
    fn register_completion_source(&mut self, language_id: &str) -> SourceHandle;

    /// Remove a previously registered completion source.
    fn dispose_completion_source(&mut self, handle: SourceHandle);

    /// Open the suggestion popup at the cursor.
    fn trigger_suggest(&mut self);
}

/// In-memory editor buffer implementing [`EditorHost`].
#[derive(Debug, Clone, Default)]
pub struct PromptBuffer {
    lines: Vec<String>,
    cursor: Position,
    sources: Vec<(SourceHandle, String)>,
    next_handle: u64,
    suggest_requests: usize,
}

impl PromptBuffer {
    /// Create a buffer with the cursor at the end of the text.
    pub fn new(text: &str) -> Self {
        let lines: Vec<String> = text.split('\n').map(str::to_string).collect();
        let line = lines.len() - 1;
        let column = lines[line].chars().count();
        Self {
            lines,
            cursor: Position::new(line, column),
            ..Self::default()
        }
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn line(&self, line: usize) -> Option<&str> {
        self.lines.get(line).map(String::as_str)
    }

    /// Move the cursor, clamped to the buffer.
    pub fn set_cursor(&mut self, position: Position) {
        let line = position.line.min(self.lines.len().saturating_sub(1));
        let len = self.lines.get(line).map_or(0, |l| l.chars().count());
        self.cursor = Position::new(line, position.column.min(len));
    }

    /// Insert text at the cursor (no newlines) and move past it.
    pub fn type_text(&mut self, text: &str) {
        let Position { line, column } = self.cursor;
        let start = self.byte_offset(line, column);
        if let Some(current) = self.lines.get_mut(line) {
            current.insert_str(start, text);
            self.cursor.column += text.chars().count();
        }
    }

    /// Accept a suggestion: replace its range with its insert text.
    pub fn accept(&mut self, suggestion: &Suggestion) {
        let range = suggestion.range;
        let start = self.byte_offset(range.line, range.start_column);
        let end = self.byte_offset(range.line, range.end_column);
        if let Some(current) = self.lines.get_mut(range.line) {
            current.replace_range(start..end, &suggestion.insert_text);
            self.cursor = Position::new(
                range.line,
                range.start_column + suggestion.insert_text.chars().count(),
            );
        }
    }

    /// Completion sources currently registered, with their language ids
    pub fn registered_sources(&self) -> &[(SourceHandle, String)] {
        &self.sources
    }

    /// Number of times the suggestion popup was requested
    pub fn suggest_requests(&self) -> usize {
        self.suggest_requests
    }

    fn byte_offset(&self, line: usize, column: usize) -> usize {
        self.lines.get(line).map_or(0, |text| {
            text.char_indices()
                .nth(column)
                .map_or(text.len(), |(offset, _)| offset)
        })
    }
}

impl EditorHost for PromptBuffer {
    fn cursor(&self) -> CursorContext {
        CursorContext {
            line_text: self.lines.get(self.cursor.line).cloned().unwrap_or_default(),
            position: self.cursor,
        }
    }

    fn word_query(&self, position: Position) -> WordQuery {
        let line = self.line(position.line).unwrap_or_default();
        WordQuery::prompt(line, position.column)
    }

    fn register_completion_source(&mut self, language_id: &str) -> SourceHandle {
        self.next_handle += 1;
        let handle = SourceHandle(self.next_handle);
        self.sources.push((handle, language_id.to_string()));
        handle
    }

    fn dispose_completion_source(&mut self, handle: SourceHandle) {
        self.sources.retain(|(h, _)| *h != handle);
    }

    fn trigger_suggest(&mut self) {
        self.suggest_requests += 1;
    }
}
