//! Word boundaries in the prompt language.
//!
//! Columns are 0-based character offsets within a single line. A word is a
//! maximal run of characters outside whitespace, `,`, braces, brackets,
//! parentheses, angle brackets, `:` and `#`.

use regex::Regex;
use std::sync::OnceLock;

/// Word pattern of the prompt languages, as registered with the editor
pub const PROMPT_WORD_PATTERN: &str = r"[^\s,{}\[\]()<>:#]+";

/// A word and its column span `[start, end)` on the line
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordSpan {
    pub word: String,
    pub start: usize,
    pub end: usize,
}

impl WordSpan {
    /// Zero-width span at `column`
    pub fn empty_at(column: usize) -> Self {
        Self {
            word: String::new(),
            start: column,
            end: column,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Compiled word pattern.
#[derive(Debug, Clone)]
pub struct WordPattern {
    regex: Regex,
}

impl WordPattern {
    /// Compile a custom word pattern.
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    /// The shared prompt language pattern.
    pub fn prompt() -> &'static WordPattern {
        static PROMPT: OnceLock<WordPattern> = OnceLock::new();
        PROMPT.get_or_init(|| {
            WordPattern::new(PROMPT_WORD_PATTERN).expect("prompt word pattern compiles")
        })
    }

    /// All words on the line with their column spans, left to right.
    pub fn words(&self, line: &str) -> Vec<WordSpan> {
        let mut spans = Vec::new();
        let mut column = 0;
        let mut byte = 0;
        for m in self.regex.find_iter(line) {
            column += line[byte..m.start()].chars().count();
            let len = m.as_str().chars().count();
            spans.push(WordSpan {
                word: m.as_str().to_string(),
                start: column,
                end: column + len,
            });
            column += len;
            byte = m.end();
        }
        spans
    }

    /// Word whose span touches `column` (either inside it or right after it).
    pub fn word_at(&self, line: &str, column: usize) -> Option<WordSpan> {
        self.words(line)
            .into_iter()
            .find(|span| span.start <= column && column <= span.end)
    }

    /// Part of the word at `column` that lies before the cursor.
    ///
    /// Zero-width at `column` when there is no word there.
    pub fn word_until(&self, line: &str, column: usize) -> WordSpan {
        match self.word_at(line, column) {
            Some(span) => WordSpan {
                word: span.word.chars().take(column - span.start).collect(),
                start: span.start,
                end: column,
            },
            None => WordSpan::empty_at(column),
        }
    }
}

/// Span replaced by a completion: from the start of the word up to its end,
/// falling back to the (possibly empty) prefix before the cursor.
pub fn resolve_word_span(at: Option<WordSpan>, until: WordSpan) -> WordSpan {
    match at {
        Some(at) => WordSpan {
            word: at.word,
            start: until.start,
            end: at.end,
        },
        None => until,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_words_skip_delimiters() {
        let words = WordPattern::prompt().words("(masterpiece:1.2), <lora:abc:0.8>");
        let text: Vec<&str> = words.iter().map(|w| w.word.as_str()).collect();
        assert_eq!(text, vec!["masterpiece", "1.2", "lora", "abc", "0.8"]);
        assert_eq!(words[0].start, 1);
        assert_eq!(words[0].end, 12);
    }

    #[test]
    fn test_word_at_and_until() {
        let pattern = WordPattern::prompt();
        let line = "foo, blue_sky";
        let at = pattern.word_at(line, 8).unwrap();
        assert_eq!(at.word, "blue_sky");
        assert_eq!((at.start, at.end), (5, 13));

        let until = pattern.word_until(line, 8);
        assert_eq!(until.word, "blu");
        assert_eq!((until.start, until.end), (5, 8));

        let span = resolve_word_span(Some(at), until);
        assert_eq!((span.start, span.end), (5, 13));
    }

    #[test]
    fn test_no_word_falls_back_to_empty() {
        let pattern = WordPattern::prompt();
        let line = "foo, <";
        assert!(pattern.word_at(line, 6).is_none());
        let until = pattern.word_until(line, 6);
        assert!(until.is_empty());
        assert_eq!(resolve_word_span(None, until.clone()), until);
    }

    #[test]
    fn test_multibyte_columns() {
        let words = WordPattern::prompt().words("猫耳, 笑顔");
        assert_eq!((words[1].start, words[1].end), (4, 6));
    }
}
