//! Stage 2: literary rewrite of a fact list, plus the deterministic post-pass.

use super::facts::FactList;
use crate::author::AuthorContext;
use crate::generation::ChatMessage;
use crate::stage::LifeStage;
use crate::style::StyleProfile;
use crate::text::{
    capitalize_first, collapse_whitespace, has_first_person, is_stopword, sentences,
    truncate_words, words,
};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::collections::BTreeSet;

lazy_static! {
    static ref MEMORY_RE: Regex =
        Regex::new(r"(?i)\bin (?:his|her|their) memory\b").expect("valid regex");
    static ref SUBJECT_RE: Regex = Regex::new(r"\b(?:[Hh]e|[Ss]he)\b").expect("valid regex");
    static ref OBJECT_RE: Regex = Regex::new(r"\b(?:him|Him)\b").expect("valid regex");
    static ref POSSESSIVE_RE: Regex = Regex::new(r"\b(?:[Hh]is|[Hh]er)\b(\s+\w+)?").expect("valid regex");
    static ref HEADING_RE: Regex = Regex::new(r"(?m)^\s*(?:#+\s.*|title:.*|\*\*[^*]+\*\*)\s*$").expect("valid regex");
}

/// Sentence markers that betray the interview or the assistant.
const ARTIFACTS: &[&str] = &[
    "guide:",
    "writer:",
    "interview",
    "the question",
    "as requested",
    "here is",
    "here's",
    "i hope this",
    "let me know",
];

const NOT_A_NOUN: &[&str] = &[
    "and", "or", "but", "to", "at", "in", "on", "with", "about", "for", "from", "when", "then",
    "again", "most", "best", "often", "back",
];

/// Request for stage-2 rewriting.
pub fn narrative_messages(
    stage: LifeStage,
    facts: &FactList,
    themes: &BTreeSet<String>,
    author: &AuthorContext,
    style: &StyleProfile,
) -> Vec<ChatMessage> {
    let voice = match author.relation_term() {
        Some(relation) => format!(
            "Write in the first person as the writer, remembering their {relation}: refer to them as \"my {relation}\", never as he or she."
        ),
        None => "Write in the first person as the writer (\"I\").".to_string(),
    };

    let mut system = format!(
        "You turn interview facts into a memoir passage about {}.\n\n\
         ## Rules\n\
         - {voice}\n\
         - One paragraph. Group facts by theme, not strictly by date.\n\
         - Use only the facts listed. Do not add people, places, dates, numbers or events.\n\
         - No mention of the interview, questions or answers. No title, no preamble.\n\
         {}",
        stage.label().to_lowercase(),
        style.rewrite_rules(),
    );
    if !themes.is_empty() {
        let themes: Vec<&str> = themes.iter().map(String::as_str).collect();
        system.push_str(&format!(
            "- Where the facts allow, let these themes shape the passage: {}\n",
            themes.join(", ")
        ));
    }

    let user = format!("## Facts\n{}\nWrite the paragraph.", facts.as_bullets());
    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

fn is_artifact(sentence: &str) -> bool {
    let lower = sentence.to_lowercase();
    ARTIFACTS.iter().any(|marker| lower.contains(marker))
        || lower.starts_with("sure")
        || lower.starts_with("certainly")
}

fn rewrite_other_mode(text: &str, relation: &str) -> String {
    let subject = format!("my {relation}");
    let possessive = format!("my {relation}'s");

    let text = MEMORY_RE.replace_all(text, "in my memory");
    let text = POSSESSIVE_RE.replace_all(&text, |caps: &Captures| {
        let pronoun = &caps[0][..3.min(caps[0].len())];
        let following = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let next_word = following.trim().to_lowercase();
        let is_object = pronoun.eq_ignore_ascii_case("her")
            && (next_word.is_empty() || NOT_A_NOUN.contains(&next_word.as_str()));
        let replacement = if is_object { &subject } else { &possessive };
        format!("{replacement}{following}")
    });
    let text = OBJECT_RE.replace_all(&text, subject.as_str());
    let text = SUBJECT_RE.replace_all(&text, subject.as_str());

    // Re-capitalize sentence openings that now start with "my".
    sentences(&text)
        .into_iter()
        .map(capitalize_first)
        .collect::<Vec<_>>()
        .join(" ")
}

fn soft_first_person_opening(text: &str) -> String {
    let first_word = words(text).first().copied().unwrap_or("");
    let body = if is_stopword(first_word) {
        let mut chars = text.chars();
        match chars.next() {
            Some(first) => first.to_lowercase().chain(chars).collect(),
            None => String::new(),
        }
    } else {
        text.to_string()
    };
    format!("As I remember it, {body}")
}

/// Cut at the last sentence boundary within `ceiling` characters.
pub fn fit_to_ceiling(text: &str, ceiling: usize) -> String {
    if text.chars().count() <= ceiling {
        return text.to_string();
    }
    let mut out = String::new();
    for sentence in sentences(text) {
        let extra = sentence.chars().count() + usize::from(!out.is_empty());
        if out.chars().count() + extra > ceiling {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(sentence);
    }
    if out.is_empty() {
        let mut cut = truncate_words(text, ceiling.saturating_sub(1)).to_string();
        cut.push('.');
        return cut;
    }
    out
}

/// Deterministic cleanup of a stage-2 reply.
pub fn finalize_narrative(raw: &str, author: &AuthorContext, style: &StyleProfile) -> String {
    let without_headings = HEADING_RE.replace_all(raw, "");
    let paragraph = collapse_whitespace(&without_headings);

    let kept: Vec<&str> = sentences(&paragraph)
        .into_iter()
        .filter(|sentence| !is_artifact(sentence))
        .collect();
    let mut text = kept.join(" ");

    if let Some(relation) = author.relation_term() {
        text = rewrite_other_mode(&text, relation);
        if !text.is_empty() && !has_first_person(&text) {
            text = soft_first_person_opening(&text);
        }
    }

    fit_to_ceiling(&text, style.length.char_ceiling())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::IdentityChoice;
    use crate::style::LengthPreference;

    fn mother() -> AuthorContext {
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::SomeoneElse);
        author.set_relation("mother");
        author
    }

    #[test]
    fn test_strips_artifacts_and_headings() {
        let raw = "# Childhood\n\nHere is the paragraph you asked for. I grew up in Lyon.\n\nMy father baked bread. I hope this helps!";
        let text = finalize_narrative(raw, &AuthorContext::default(), &StyleProfile::default());
        assert_eq!(text, "I grew up in Lyon. My father baked bread.");
    }

    #[test]
    fn test_other_mode_rewrites() {
        let raw = "She grew up in Lyon. In her memory the bakery was always warm. Her brother left in 1960.";
        let text = finalize_narrative(raw, &mother(), &StyleProfile::default());
        assert_eq!(
            text,
            "My mother grew up in Lyon. In my memory the bakery was always warm. My mother's brother left in 1960."
        );
    }

    #[test]
    fn test_soft_opening_when_no_first_person_remains() {
        let raw = "The bakery opened at dawn. Bread was sold until noon.";
        let text = finalize_narrative(raw, &mother(), &StyleProfile::default());
        assert!(text.starts_with("As I remember it, the bakery opened at dawn."));
    }

    #[test]
    fn test_short_ceiling_cuts_at_sentence_boundary() {
        let sentence = "I remember the long summers by the river with my cousins. ";
        let raw = sentence.repeat(20);
        let style = StyleProfile::default().with_length(LengthPreference::Short);
        let text = finalize_narrative(&raw, &AuthorContext::default(), &style);
        assert!(text.chars().count() <= 500);
        assert!(text.ends_with('.'));
        assert!(text.chars().count() > 400);
    }

    #[test]
    fn test_single_overlong_sentence_is_cut() {
        let raw = format!("I remember {}", "the river and ".repeat(100));
        let text = fit_to_ceiling(&raw, 120);
        assert!(text.chars().count() <= 120);
        assert!(text.ends_with('.'));
    }

    #[test]
    fn test_prompt_lists_facts_and_rules() {
        let facts = FactList::new(["Born in Lyon in 1948."]);
        let themes: BTreeSet<String> = ["family".to_string()].into_iter().collect();
        let style = StyleProfile::default().with_length(LengthPreference::Long);
        let messages = narrative_messages(LifeStage::Childhood, &facts, &themes, &mother(), &style);
        assert!(messages[0].content.contains("my mother"));
        assert!(messages[0].content.contains("1200 characters"));
        assert!(messages[0].content.contains("family"));
        assert!(messages[1].content.contains("- Born in Lyon in 1948."));
    }
}
