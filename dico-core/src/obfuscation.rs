use regex::{NoExpand, RegexBuilder};
use tracing::warn;

/// Characters left visible in a masked word.
pub const SEPARATORS: [char; 3] = [' ', '-', '\''];

/// Token substituted for the answer inside its own definition.
pub const REDACTION_PLACEHOLDER: &str = "[X]";

pub struct WordObfuscator;

impl WordObfuscator {
    /// Mask every character except separators. The result has one slot per
    /// character of the word so clients can draw blanks with the right spacing.
    pub fn obfuscate(word: &str) -> Vec<Option<char>> {
        word.chars()
            .map(|ch| if SEPARATORS.contains(&ch) { Some(ch) } else { None })
            .collect()
    }

    /// Replace whole occurrences of `word` in `definition` with
    /// [`REDACTION_PLACEHOLDER`], ignoring case.
    ///
    /// A word boundary is required on each side of the match whose edge
    /// character is a word character, so "cat" is left alone inside
    /// "category" while "c++" still matches before a space.
    pub fn redact(definition: &str, word: &str) -> String {
        let word = word.trim();
        if word.is_empty() {
            return definition.to_string();
        }

        let mut pattern = String::with_capacity(word.len() + 8);
        if word.chars().next().is_some_and(is_word_char) {
            pattern.push_str(r"\b");
        }
        pattern.push_str(&regex::escape(word));
        if word.chars().last().is_some_and(is_word_char) {
            pattern.push_str(r"\b");
        }

        match RegexBuilder::new(&pattern).case_insensitive(true).build() {
            Ok(regex) => regex
                .replace_all(definition, NoExpand(REDACTION_PLACEHOLDER))
                .into_owned(),
            Err(e) => {
                warn!("Could not build redaction pattern for '{}': {}", word, e);
                definition.to_string()
            }
        }
    }
}

fn is_word_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}
