//! Register polish: spoken to written, nothing else.

use crate::author::AuthorContext;
use crate::generation::ChatMessage;
use crate::text::{has_first_person, sentences, words};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::BTreeSet;

lazy_static! {
    static ref NUMBER_RE: Regex = Regex::new(r"\d+(?:[.,]\d+)*").expect("valid number regex");
}

/// Result of a polish pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolishOutcome {
    pub text: String,
    /// False when the guard rejected the model output and the original was kept.
    pub applied: bool,
}

/// Why polished text was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolishRejection {
    Empty,
    DroppedNumber(String),
    AddedNumber(String),
    DroppedName(String),
    AddedName(String),
    LostFirstPerson,
    LengthChanged { before: usize, after: usize },
}

pub fn polish_messages(text: &str, author: &AuthorContext) -> Vec<ChatMessage> {
    let person = match author.relation_term() {
        Some(relation) => format!("Keep the first-person voice of the writer and keep calling the subject \"my {relation}\"."),
        None => "Keep the first-person voice.".to_string(),
    };
    let system = format!(
        "You lightly edit memoir text from spoken style into written style.\n\n\
         ## Rules\n\
         - Fix filler words, false starts and repetition.\n\
         - Do not change any name, place, date or number.\n\
         - {person}\n\
         - Do not add any information and do not remove any fact.\n\
         - Reply with the edited text only."
    );
    vec![ChatMessage::system(system), ChatMessage::user(text.trim().to_string())]
}

fn numbers(text: &str) -> BTreeSet<String> {
    NUMBER_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Capitalized words that do not open a sentence, excluding "I".
fn proper_names(text: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for sentence in sentences(text) {
        for word in words(sentence).into_iter().skip(1) {
            let starts_upper = word.chars().next().is_some_and(char::is_uppercase);
            if starts_upper && word != "I" && !word.starts_with("I'") && !word.starts_with("I’") {
                names.insert(word.trim_end_matches("'s").trim_end_matches("’s").to_string());
            }
        }
    }
    names
}

/// Check polished text against the original.
pub fn guard(original: &str, polished: &str) -> Result<(), PolishRejection> {
    let polished = polished.trim();
    if polished.is_empty() {
        return Err(PolishRejection::Empty);
    }

    let before = numbers(original);
    let after = numbers(polished);
    if let Some(missing) = before.difference(&after).next() {
        return Err(PolishRejection::DroppedNumber(missing.clone()));
    }
    if let Some(added) = after.difference(&before).next() {
        return Err(PolishRejection::AddedNumber(added.clone()));
    }

    let names_before = proper_names(original);
    let all_words_after: BTreeSet<&str> = words(polished).into_iter().collect();
    if let Some(missing) = names_before
        .iter()
        .find(|name| !all_words_after.iter().any(|w| w.starts_with(name.as_str())))
    {
        return Err(PolishRejection::DroppedName(missing.clone()));
    }
    let all_words_before: BTreeSet<&str> = words(original).into_iter().collect();
    if let Some(added) = proper_names(polished)
        .into_iter()
        .find(|name| !all_words_before.iter().any(|w| w.starts_with(name.as_str())))
    {
        return Err(PolishRejection::AddedName(added));
    }

    if has_first_person(original) && !has_first_person(polished) {
        return Err(PolishRejection::LostFirstPerson);
    }

    let before_len = original.trim().chars().count();
    let after_len = polished.chars().count();
    if after_len * 2 < before_len || after_len > before_len + before_len / 3 + 40 {
        return Err(PolishRejection::LengthChanged {
            before: before_len,
            after: after_len,
        });
    }
    Ok(())
}
