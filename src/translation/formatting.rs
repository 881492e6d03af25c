/*!
 * Clean-up of raw backend output.
 *
 * Chat models like to announce their answer ("Here's the English translation:")
 * or echo a role label. These prefixes are stripped before the output reaches the
 * quality gate, then whitespace is collapsed and sentence starts are capitalized.
 */

use regex::Regex;
use std::sync::LazyLock;

/// Preambles chat models put in front of a translation
static PREAMBLE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(?:assistant\s*:|here(?:'s| is) (?:the |an? )?(?:english )?translation\s*:?|english\s*:|translation\s*:)\s*")
        .expect("Invalid preamble regex")
});

/// Lowercase letter at the start of the text or after terminal punctuation
static SENTENCE_START_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[.!?…]\s+)(\p{Ll})").expect("Invalid sentence start regex"));

/// Output cleaner applied to every backend answer
pub struct OutputCleaner;

impl OutputCleaner {
    /// Strip preambles, collapse whitespace and capitalize sentences
    pub fn clean(raw: &str) -> String {
        let stripped = Self::strip_preambles(raw);
        let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        Self::capitalize_sentences(&collapsed)
    }

    /// Remove leading role labels and announcement phrases, repeatedly
    pub fn strip_preambles(text: &str) -> &str {
        let mut rest = text;
        while let Some(found) = PREAMBLE_REGEX.find(rest) {
            if found.end() == 0 {
                break;
            }
            rest = &rest[found.end()..];
        }
        rest.trim()
    }

    /// Uppercase the first letter of each sentence
    pub fn capitalize_sentences(text: &str) -> String {
        SENTENCE_START_REGEX
            .replace_all(text, |caps: &regex::Captures| format!("{}{}", &caps[1], caps[2].to_uppercase()))
            .into_owned()
    }
}
