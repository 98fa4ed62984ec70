//! Small text utilities shared by the question policy, the anchor
//! validator and the synthesis passes.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref WORD_RE: Regex =
        Regex::new(r"[\p{L}\p{N}][\p{L}\p{N}'’\-]*").expect("valid word regex");
    static ref FIRST_PERSON_RE: Regex =
        Regex::new(r"(?i)\b(me|my|mine|myself|we|us|our|ours)\b|\bI\b").expect("valid regex");
    static ref SECOND_PERSON_RE: Regex =
        Regex::new(r"(?i)\b(you|your|yours|yourself)\b").expect("valid regex");
    static ref SENTENCE_RE: Regex =
        Regex::new(r#"[^.!?。！？]+(?:[.!?。！？]+["'”’)]*|$)"#).expect("valid sentence regex");
    static ref WHITESPACE_RE: Regex = Regex::new(r"\s+").expect("valid regex");

    /// Filler and function words that never make useful anchors or coverage tokens.
    pub static ref STOPWORDS: HashSet<&'static str> = [
        "a", "about", "after", "again", "all", "also", "am", "an", "and", "any", "are", "as",
        "at", "back", "be", "because", "been", "before", "being", "both", "but", "by", "can",
        "could", "did", "do", "does", "doing", "don't", "down", "during", "each", "even",
        "every", "few", "for", "from", "got", "had", "has", "have", "having", "he", "her",
        "here", "hers", "him", "his", "how", "i", "i'd", "i'm", "if", "in", "into", "is", "it",
        "it's", "its", "just", "kind", "know", "like", "lot", "many", "maybe", "me", "mean",
        "more", "most", "much", "my", "myself", "no", "not", "now", "of", "off", "oh", "ok",
        "okay", "on", "once", "one", "only", "or", "other", "our", "out", "over", "own",
        "pretty", "quite", "really", "remember", "same", "she", "so", "some", "something",
        "sort", "still", "such", "than", "that", "that's", "the", "their", "them", "then",
        "there", "these", "they", "thing", "things", "think", "this", "those", "though",
        "through", "time", "to", "too", "um", "uh", "under", "until", "up", "us", "very",
        "was", "we", "well", "were", "what", "when", "where", "which", "while", "who", "why",
        "will", "with", "would", "yeah", "yes", "you", "your", "guide", "writer",
    ]
    .into_iter()
    .collect();
}

/// Word-like spans in order of appearance.
pub fn words(text: &str) -> Vec<&str> {
    WORD_RE.find_iter(text).map(|m| m.as_str()).collect()
}

/// Check whether a word is filler.
pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word.to_lowercase().as_str())
}

/// Lowercased, stopword-free tokens of three or more characters, lightly stemmed.
pub fn content_tokens(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| w.chars().count() >= 3 || w.chars().all(|c| c.is_ascii_digit()))
        .filter(|w| !is_stopword(w))
        .map(|w| stem(&w.to_lowercase()))
        .collect()
}

/// Strip a few common English suffixes so "moved" and "moving" meet.
pub fn stem(word: &str) -> String {
    let word = word.trim_end_matches("'s").trim_end_matches("’s");
    for suffix in ["ing", "ed", "es", "s"] {
        if let Some(base) = word.strip_suffix(suffix) {
            if base.chars().count() >= 3 {
                return base.to_string();
            }
        }
    }
    word.to_string()
}

/// Split text into sentences, keeping terminal punctuation.
pub fn sentences(text: &str) -> Vec<&str> {
    SENTENCE_RE
        .find_iter(text)
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn has_question_mark(text: &str) -> bool {
    text.contains('?') || text.contains('？')
}

pub fn has_first_person(text: &str) -> bool {
    FIRST_PERSON_RE.is_match(text)
}

pub fn has_second_person(text: &str) -> bool {
    SECOND_PERSON_RE.is_match(text)
}

pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Case-insensitive substring check.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    !needle.is_empty() && haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Two questions read the same, ignoring surrounding space and ASCII case.
pub fn same_question(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

/// Longest prefix of at most `max` characters.
pub fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Longest prefix of at most `max` characters that ends on a word boundary.
pub fn truncate_words(text: &str, max: usize) -> &str {
    let cut = truncate_chars(text, max);
    if cut.len() == text.len() {
        return cut;
    }
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => cut[..idx].trim_end_matches([',', ';', ':', ' ']),
        _ => cut,
    }
}

pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Extract JSON from a response that might have markdown code blocks.
pub fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

/// The span from the first `{` to the last `}`, if both exist in order.
pub fn outermost_braces(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}
