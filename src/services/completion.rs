//! Tag completion.
//!
//! Answers a completion request from the filtered tag snapshot and the
//! extra-network lists. Which candidates are offered depends on the
//! character that triggered the request:
//!
//! - `<` opens an extra-network block, so only non-embedding extra networks
//!   are offered, as `type:name:1.0` (the editor closes the `>` itself).
//! - anything else offers every filtered tag, then all extra networks:
//!   embeddings are inserted bare, the rest as `<type:name:1.0>`.

use crate::host::{EditorHost, Position, WordQuery};
use crate::model::tag::{escape, CompletionKind};
use crate::primitives::word::{resolve_word_span, WordSpan};
use crate::services::tags::{ExtraNetworks, TagStore};

/// Characters that open the suggestion list when typed
pub const TRIGGER_CHARACTERS: [char; 11] = ['<', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Trigger character that starts an extra-network block
pub const EXTRA_NETWORK_TRIGGER: char = '<';

/// Extra-network type inserted without the `<type:...>` wrapper
pub const EMBEDDING_KIND: &str = "embedding";

/// Range of a line replaced when a suggestion is accepted, in character columns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaceRange {
    pub line: usize,
    pub start_column: usize,
    pub end_column: usize,
}

impl ReplaceRange {
    pub fn from_span(line: usize, span: &WordSpan) -> Self {
        Self {
            line,
            start_column: span.start,
            end_column: span.end,
        }
    }

    /// Zero-width range at a position
    pub fn at(position: Position) -> Self {
        Self {
            line: position.line,
            start_column: position.column,
            end_column: position.column,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start_column == self.end_column
    }
}

/// Where a suggestion came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuggestionOrigin {
    Tag,
    ExtraNetwork,
    Dynamic,
}

/// A completion item handed to the editor
#[derive(Debug, Clone, PartialEq)]
pub struct Suggestion {
    pub label: String,
    pub detail: Option<String>,
    pub description: Option<String>,
    pub documentation: Option<String>,
    pub insert_text: String,
    pub kind: CompletionKind,
    pub range: ReplaceRange,
    pub origin: SuggestionOrigin,
}

/// Suggestions for one request, in display order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionList {
    pub suggestions: Vec<Suggestion>,
}

impl CompletionList {
    pub fn len(&self) -> usize {
        self.suggestions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.suggestions.is_empty()
    }

    pub fn labels(&self) -> Vec<&str> {
        self.suggestions.iter().map(|s| s.label.as_str()).collect()
    }
}

/// A completion request: the cursor line, the cursor, and the word there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRequest {
    pub line_text: String,
    pub position: Position,
    pub word: WordQuery,
    /// Character the editor reported as the trigger, if any
    pub trigger_character: Option<char>,
}

impl CompletionRequest {
    /// Build a request for a line using the prompt word pattern.
    pub fn from_line(line_text: &str, position: Position, trigger_character: Option<char>) -> Self {
        Self {
            line_text: line_text.to_string(),
            position,
            word: WordQuery::prompt(line_text, position.column),
            trigger_character,
        }
    }

    /// Build a request from the host's current cursor.
    pub fn from_host(host: &dyn EditorHost, trigger_character: Option<char>) -> Self {
        let cursor = host.cursor();
        let word = host.word_query(cursor.position);
        Self {
            line_text: cursor.line_text,
            position: cursor.position,
            word,
            trigger_character,
        }
    }

    /// Span replaced by the suggestions
    pub fn replace_span(&self) -> WordSpan {
        resolve_word_span(self.word.at.clone(), self.word.until.clone())
    }

    /// The explicit trigger, or the character just left of the word start.
    pub fn effective_trigger(&self) -> Option<char> {
        self.trigger_character.or_else(|| {
            let start = self.replace_span().start;
            start
                .checked_sub(1)
                .and_then(|column| self.line_text.chars().nth(column))
        })
    }
}

/// Compute the suggestions for a request.
pub fn provide(
    store: &TagStore,
    extra: &ExtraNetworks,
    request: &CompletionRequest,
) -> CompletionList {
    let span = request.replace_span();
    let range = ReplaceRange::from_span(request.position.line, &span);
    let trigger = request.effective_trigger();
    let opens_block = trigger == Some(EXTRA_NETWORK_TRIGGER);

    let mut suggestions = Vec::new();

    if !opens_block {
        let replace_underscore = store.replace_underscore();
        for entry in store.filtered().iter() {
            let insert_text = if replace_underscore {
                entry.insert_text.replace('_', " ")
            } else {
                entry.insert_text.clone()
            };
            suggestions.push(Suggestion {
                label: entry.label.clone(),
                detail: entry.detail.clone(),
                description: Some(entry.description.clone()),
                documentation: None,
                insert_text,
                kind: CompletionKind::Value,
                range,
                origin: SuggestionOrigin::Tag,
            });
        }
    }

    for (kind, names) in extra.iter() {
        let is_embedding = kind == EMBEDDING_KIND;
        if is_embedding && opens_block {
            continue;
        }
        for name in names {
            let escaped = escape(name);
            let insert_text = if is_embedding {
                escaped.clone()
            } else if opens_block {
                format!("{kind}:{escaped}:1.0")
            } else {
                format!("<{kind}:{escaped}:1.0>")
            };
            suggestions.push(Suggestion {
                label: escaped,
                detail: Some(kind.to_string()),
                description: Some(kind.to_string()),
                documentation: None,
                insert_text,
                kind: CompletionKind::Text,
                range,
                origin: SuggestionOrigin::ExtraNetwork,
            });
        }
    }

    tracing::debug!(
        "Completion at {}:{} (trigger {:?}): {} suggestions",
        request.position.line,
        request.position.column,
        trigger,
        suggestions.len()
    );

    CompletionList { suggestions }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TagStore {
        let mut store = TagStore::default();
        store
            .add_csv("tags", "blue_sky,0,5000,sky_blue\nhat_(object),0,300,\nrare,0,3,\n")
            .unwrap();
        store
    }

    fn extra() -> ExtraNetworks {
        let mut extra = ExtraNetworks::new();
        extra.add_data("lora", &["detail(v2)".to_string()], false);
        extra.add_data(EMBEDDING_KIND, &["easyneg".to_string()], false);
        extra
    }

    #[test]
    fn test_effective_trigger_falls_back_to_previous_char() {
        let request = CompletionRequest::from_line("foo, <lo", Position::new(0, 8), None);
        assert_eq!(request.effective_trigger(), Some('<'));

        let request = CompletionRequest::from_line("blue", Position::new(0, 4), None);
        assert_eq!(request.effective_trigger(), None);

        let request = CompletionRequest::from_line("<lo", Position::new(0, 3), Some('1'));
        assert_eq!(request.effective_trigger(), Some('1'));
    }

    #[test]
    fn test_plain_request_offers_tags_then_extra_networks() {
        let request = CompletionRequest::from_line("a, bl", Position::new(0, 5), None);
        let list = provide(&store(), &extra(), &request);
        assert_eq!(
            list.labels(),
            vec!["blue_sky", "sky_blue", "hat_(object)", "detail\\(v2\\)", "easyneg"]
        );

        let hat = &list.suggestions[2];
        assert_eq!(hat.insert_text, "hat_\\(object\\)");
        assert_eq!(hat.kind, CompletionKind::Value);
        assert_eq!(list.suggestions[3].insert_text, "<lora:detail\\(v2\\):1.0>");
        assert_eq!(list.suggestions[4].insert_text, "easyneg");
        assert!(list
            .suggestions
            .iter()
            .all(|s| s.range == ReplaceRange { line: 0, start_column: 3, end_column: 5 }));
    }

    #[test]
    fn test_angle_trigger_skips_tags_and_embeddings() {
        let request = CompletionRequest::from_line("a, <", Position::new(0, 4), Some('<'));
        let list = provide(&store(), &extra(), &request);
        assert_eq!(list.len(), 1);
        let lora = &list.suggestions[0];
        assert_eq!(lora.insert_text, "lora:detail\\(v2\\):1.0");
        assert_eq!(lora.kind, CompletionKind::Text);
        assert!(lora.range.is_empty());
    }

    #[test]
    fn test_replace_underscore_applies_to_tags_only() {
        let mut store = store();
        store.set_replace_underscore(true);
        let mut extra = ExtraNetworks::new();
        extra.add_data("lora", &["add_detail".to_string()], false);

        let request = CompletionRequest::from_line("", Position::new(0, 0), None);
        let list = provide(&store, &extra, &request);
        assert_eq!(list.suggestions[0].insert_text, "blue sky");
        assert_eq!(list.suggestions[1].insert_text, "blue sky");
        assert_eq!(list.suggestions[3].insert_text, "<lora:add_detail:1.0>");
    }

    #[test]
    fn test_range_covers_whole_word_under_cursor() {
        let request = CompletionRequest::from_line("blue_sky, x", Position::new(0, 2), None);
        let list = provide(&store(), &ExtraNetworks::new(), &request);
        assert_eq!(
            list.suggestions[0].range,
            ReplaceRange { line: 0, start_column: 0, end_column: 8 }
        );
    }
}
