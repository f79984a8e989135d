//! Line tokenizer for the prompt languages
//!
//! Two language ids are supported:
//! - `sd-prompt`: plain prompts (`[]`, `()`, `<>` blocks)
//! - `sd-dynamic-prompt`: adds `{}` wildcard blocks, `|` alternatives and
//!   `#` line comments
//!
//! Rules are tried in order at each position and the first match wins; any
//! character no rule matches becomes a one-character `Text` token.

use regex::Regex;
use std::ops::Range;
use std::sync::OnceLock;

use super::word::PROMPT_WORD_PATTERN;

/// Keywords highlighted in both languages
pub const KEYWORDS: [&str; 4] = ["lora", "hypernet", "AND", "BREAK"];

/// Prompt language variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptLanguage {
    Prompt,
    DynamicPrompt,
}

impl PromptLanguage {
    pub const ALL: [PromptLanguage; 2] = [Self::Prompt, Self::DynamicPrompt];

    /// Editor language id
    pub fn id(self) -> &'static str {
        match self {
            Self::Prompt => "sd-prompt",
            Self::DynamicPrompt => "sd-dynamic-prompt",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|lang| lang.id() == id)
    }

    /// Word pattern registered for completion word boundaries
    pub fn word_pattern(self) -> &'static str {
        PROMPT_WORD_PATTERN
    }

    /// Bracket pairs used for matching and surrounding
    pub fn brackets(self) -> &'static [(char, char)] {
        match self {
            Self::Prompt => &[('[', ']'), ('(', ')')],
            Self::DynamicPrompt => &[('[', ']'), ('(', ')'), ('{', '}')],
        }
    }

    /// Pairs closed automatically while typing
    pub fn auto_closing_pairs(self) -> &'static [(char, char)] {
        match self {
            Self::Prompt => &[('[', ']'), ('(', ')'), ('<', '>')],
            Self::DynamicPrompt => &[('[', ']'), ('(', ')'), ('<', '>'), ('{', '}')],
        }
    }

    pub fn line_comment(self) -> Option<&'static str> {
        match self {
            Self::Prompt => None,
            Self::DynamicPrompt => Some("#"),
        }
    }

    fn is_delimiter(self, c: char) -> bool {
        match self {
            Self::Prompt => matches!(c, ',' | ':'),
            Self::DynamicPrompt => matches!(c, ',' | ':' | '|'),
        }
    }

    fn is_bracket(self, c: char) -> bool {
        match self {
            Self::Prompt => matches!(c, '[' | ']' | '(' | ')' | '<' | '>'),
            Self::DynamicPrompt => {
                matches!(c, '[' | ']' | '(' | ')' | '<' | '>' | '{' | '}')
            }
        }
    }
}

/// Token categories produced by the tokenizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Keyword,
    Identifier,
    Number,
    Delimiter,
    Bracket,
    Whitespace,
    Comment,
    Text,
}

/// A token: byte range within the line plus its kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub range: Range<usize>,
    pub kind: TokenKind,
}

struct Rules {
    identifier: Regex,
    whitespace: Regex,
    number: Regex,
}

fn rules() -> &'static Rules {
    static RULES: OnceLock<Rules> = OnceLock::new();
    RULES.get_or_init(|| Rules {
        identifier: Regex::new(r"\A[a-zA-Z]\w*").expect("identifier rule compiles"),
        whitespace: Regex::new(r"\A\s+").expect("whitespace rule compiles"),
        number: Regex::new(r"\A-?(\d*\.)?\d+").expect("number rule compiles"),
    })
}

/// Tokenize a single line.
pub fn tokenize_line(language: PromptLanguage, line: &str) -> Vec<Token> {
    let rules = rules();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < line.len() {
        let rest = &line[pos..];

        let (len, kind) = if let Some(m) = rules.identifier.find(rest) {
            let kind = if KEYWORDS.contains(&m.as_str()) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            (m.end(), kind)
        } else if let Some(m) = rules.whitespace.find(rest) {
            (m.end(), TokenKind::Whitespace)
        } else if pos == 0 && language.line_comment().is_some_and(|c| rest.starts_with(c)) {
            (rest.len(), TokenKind::Comment)
        } else if let Some(m) = rules.number.find(rest) {
            (m.end(), TokenKind::Number)
        } else {
            // Non-empty `rest` always has a first char
            let c = rest.chars().next().unwrap_or_default();
            let kind = if language.is_delimiter(c) {
                TokenKind::Delimiter
            } else if language.is_bracket(c) {
                TokenKind::Bracket
            } else {
                TokenKind::Text
            };
            (c.len_utf8(), kind)
        };

        // Merge runs of plain text into a single token
        match tokens.last_mut() {
            Some(Token { range, kind: last }) if kind == TokenKind::Text && *last == kind => {
                range.end = pos + len;
            }
            _ => tokens.push(Token {
                range: pos..pos + len,
                kind,
            }),
        }
        pos += len;
    }

    tokens
}
