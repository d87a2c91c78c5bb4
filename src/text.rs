//! Text normalization and keyword extraction.
//!
//! Both are pure functions; the engine memoizes them per input string.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{BTreeSet, HashSet};

lazy_static! {
    /// Anything that is not a letter, digit, whitespace or `.,!?-`
    static ref RE_DISALLOWED: Regex = Regex::new(r"[^\p{L}\p{N}\s.,!?-]+").unwrap();

    static ref STOP_WORDS: HashSet<&'static str> = [
        // pronouns
        "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
        "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers",
        "herself", "it", "its", "itself", "they", "them", "their", "theirs", "themselves",
        "what", "which", "who", "whom", "this", "that", "these", "those",
        // interrogatives
        "how", "why", "when", "where",
        // auxiliaries
        "am", "is", "are", "was", "were", "be", "been", "being", "have", "has", "had",
        "having", "do", "does", "did", "doing", "can", "could", "would", "should", "will",
        // articles, conjunctions
        "a", "an", "the", "and", "but", "if", "or", "because", "as", "until", "while",
        // prepositions
        "of", "at", "by", "for", "with", "about", "against", "between", "into", "through",
        "during", "before", "after", "above", "below", "to", "from", "up", "down", "in",
        "out", "on", "off", "over", "under", "again", "further", "then", "once",
        // greetings
        "hello", "hey", "hiya", "thanks", "please",
    ]
    .into_iter()
    .collect();
}

/// Lowercase, blank out disallowed characters, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned = RE_DISALLOWED.replace_all(&lowered, " ");
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Content words of normalized text: no stop-words, nothing of 2 chars or less.
///
/// Sentence punctuation kept by [`normalize`] is trimmed from token edges so
/// `"vocabulary."` and `"vocabulary"` are the same keyword.
pub fn extract_keywords(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| matches!(c, '.' | ',' | '!' | '?' | '-')))
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// Word count as seen by the gate's length heuristics.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}
