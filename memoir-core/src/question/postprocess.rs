//! Cleanup applied to every model-produced question before it is shown.

use crate::author::AuthorContext;
use crate::text::{
    capitalize_first, collapse_whitespace, has_question_mark, sentences, truncate_words,
};
use lazy_static::lazy_static;
use regex::{Captures, Regex};

/// Shown once, alongside the first question of a stage.
pub const USAGE_TIP: &str = "Tip: be concrete. Say where it happened, who was there, what happened, and how you felt.";

/// Ornate words that make questions sound like greeting cards.
const BANNED_WORDS: &[&str] = &[
    "cherished",
    "treasured",
    "poignant",
    "profound",
    "profoundly",
    "vibrant",
    "intricate",
    "unforgettable",
    "precious",
    "heartwarming",
    "tapestry of",
    "beautifully",
    "truly",
    "deeply",
];

lazy_static! {
    static ref BANNED_RE: Regex = {
        let alternation = BANNED_WORDS.join("|");
        Regex::new(&format!(r"(?i)\b(?:{alternation})\b\s*")).expect("valid banned-word regex")
    };
    static ref LABEL_RE: Regex =
        Regex::new(r#"(?i)^\s*(?:question|guide|q)\s*[:：]\s*"#).expect("valid label regex");
    static ref SUBJECT_PRONOUN_RE: Regex =
        Regex::new(r"\b(?:[Hh]e|[Ss]he|[Hh]im)\b").expect("valid pronoun regex");
    static ref POSSESSIVE_PRONOUN_RE: Regex =
        Regex::new(r"\b(?:[Hh]is|[Hh]er)\b(\s+\w+)?").expect("valid pronoun regex");
}

/// Words after "her" that mark it as an object rather than a possessive.
const NOT_A_NOUN: &[&str] = &[
    "and", "or", "but", "to", "at", "in", "on", "with", "about", "for", "from", "when", "then",
    "again", "most", "best", "often", "feel", "back",
];

/// Replace third-person pronouns with "your <relation>".
pub fn rewrite_pronouns(text: &str, relation: &str) -> String {
    let subject = format!("your {relation}");
    let possessive = format!("your {relation}'s");

    let text = POSSESSIVE_PRONOUN_RE.replace_all(text, |caps: &Captures| {
        let pronoun = &caps[0][..3.min(caps[0].len())];
        let following = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let next_word = following.trim().to_lowercase();
        let is_object = pronoun.eq_ignore_ascii_case("her")
            && (next_word.is_empty() || NOT_A_NOUN.contains(&next_word.as_str()));
        let replacement = if is_object { &subject } else { &possessive };
        format!("{replacement}{following}")
    });
    SUBJECT_PRONOUN_RE
        .replace_all(&text, subject.as_str())
        .into_owned()
}

/// Normalize a raw model reply into a single shown question.
///
/// Returns `None` when nothing usable is left. The result always contains
/// a question mark and is at most `max_chars` characters.
pub fn finalize_question(raw: &str, author: &AuthorContext, max_chars: usize) -> Option<String> {
    let first_line = raw
        .lines()
        .map(str::trim)
        .find(|line| has_question_mark(line))
        .unwrap_or(raw);
    let text = collapse_whitespace(first_line);
    let text = LABEL_RE.replace(&text, "");
    let text = text.trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '*'));
    let text = collapse_whitespace(&BANNED_RE.replace_all(text, ""));

    let mut text = match author.relation_term() {
        Some(relation) => rewrite_pronouns(&text, relation),
        None => text,
    };

    // Drop chatter after the last question mark.
    if let Some(idx) = text.rfind(['?', '？']) {
        let end = idx + text[idx..].chars().next().map_or(1, char::len_utf8);
        text.truncate(end);
    }

    if text.chars().count() > max_chars {
        let question_sentence = sentences(&text)
            .into_iter()
            .rev()
            .find(|s| has_question_mark(s))
            .map(str::to_string);
        text = question_sentence.unwrap_or(text);
    }
    if text.chars().count() > max_chars {
        text = truncate_words(&text, max_chars.saturating_sub(1)).to_string();
    }

    let trimmed = text
        .trim()
        .trim_end_matches(['.', '!', ',', ';', ':', '…'])
        .trim_end();
    if trimmed.chars().filter(|c| c.is_alphanumeric()).count() < 3 {
        return None;
    }

    let mut question = capitalize_first(trimmed);
    if !question.ends_with('?') && !question.ends_with('？') {
        if question.chars().count() >= max_chars {
            question = truncate_words(&question, max_chars.saturating_sub(1)).to_string();
        }
        question.push('?');
    }
    Some(question)
}
