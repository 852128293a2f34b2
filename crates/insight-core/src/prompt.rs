//! Prompt templates and model-output cleanup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InsightError, Result};

/// The single substitution point of a [`PromptTemplate`].
pub const DATA_PLACEHOLDER: &str = "{data}";

/// Code fence delimiter.
const FENCE: &str = "```";

/// Longest first line still treated as a language tag.
const MAX_LANGUAGE_TAG_LEN: usize = 20;

/// A prompt with exactly one `{data}` placeholder.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// Creates a template.
    ///
    /// # Errors
    /// Returns [`InsightError::InvalidParameter`] unless the text contains
    /// exactly one `{data}` placeholder.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        match template.matches(DATA_PLACEHOLDER).count() {
            1 => Ok(Self { template }),
            n => Err(InsightError::InvalidParameter(format!(
                "prompt template must contain exactly one {DATA_PLACEHOLDER} placeholder, found {n}"
            ))),
        }
    }

    /// Substitutes `data` verbatim into the placeholder.
    #[must_use]
    pub fn render(&self, data: &str) -> String {
        self.template.replacen(DATA_PLACEHOLDER, data, 1)
    }

    /// Returns the raw template text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.template
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.template)
    }
}

/// Strips a fenced code block down to its contents.
///
/// Removes surrounding whitespace, the backtick fence markers and a language
/// tag on the opening fence line (e.g. `python`, `json`). Text without an
/// opening fence is only trimmed. The result is not validated in any way.
#[must_use]
pub fn clean_code_block(raw: &str) -> String {
    let mut current = raw.trim().to_string();
    loop {
        let next = strip_fence(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn strip_fence(text: &str) -> String {
    let text = text.trim();
    if !text.starts_with(FENCE) {
        return text.to_string();
    }

    let body = text.trim_start_matches('`').trim_end_matches('`');
    let body = match body.split_once('\n') {
        Some((first, rest)) if is_language_tag(first) => rest,
        _ => body,
    };
    body.trim().to_string()
}

fn is_language_tag(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty()
        && line.len() <= MAX_LANGUAGE_TAG_LEN
        && line
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '_' | '#' | '.'))
}
