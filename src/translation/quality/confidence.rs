/*!
 * Reference-free output checks.
 *
 * - Confidence: ratio of distinct words to words. Degenerate outputs that loop
 *   on the same words score low.
 * - Repetition: duplication ratio over the first decile of words, which catches
 *   outputs that start looping early.
 */

use std::collections::HashSet;

/// Minimum window the repetition check looks at
const MIN_REPETITION_WINDOW: usize = 10;

/// Windows shorter than this are never flagged
const MIN_FLAGGED_WINDOW: usize = 4;

/// Distinct words over words (whitespace-separated, case-sensitive); `0.0` when empty
pub fn confidence_score(text: &str) -> f32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let unique: HashSet<&str> = words.iter().copied().collect();
    unique.len() as f32 / words.len() as f32
}

/// Share of repeated words in the first decile of the output.
///
/// The window is `max(words / 10, 10)` words, capped at the word count. Words are
/// compared lowercased with surrounding punctuation removed. Returns `0.0` for
/// empty text.
pub fn repetition_ratio(text: &str) -> f32 {
    window_ratio(&normalized_words(text))
}

/// Whether the opening words repeat more than `threshold` allows
pub fn is_repetitive(text: &str, threshold: f32) -> bool {
    let words = normalized_words(text);
    if repetition_window(words.len()) < MIN_FLAGGED_WINDOW {
        return false;
    }
    window_ratio(&words) > threshold
}

fn normalized_words(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

fn window_ratio(words: &[String]) -> f32 {
    let window = repetition_window(words.len());
    if window == 0 {
        return 0.0;
    }
    let unique: HashSet<&String> = words[..window].iter().collect();
    1.0 - unique.len() as f32 / window as f32
}

fn repetition_window(word_count: usize) -> usize {
    (word_count / 10).max(MIN_REPETITION_WINDOW).min(word_count)
}
