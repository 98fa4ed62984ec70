//! Stage 1: atomic fact extraction.

use crate::author::AuthorContext;
use crate::generation::ChatMessage;
use crate::style::Strictness;
use crate::text::{collapse_whitespace, content_tokens, extract_json, outermost_braces};
use memoir_macros::StructuredOutput;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

/// Atomic facts from one interview stage, in the order they were told.
#[derive(Debug, Clone, Default, Deserialize, StructuredOutput)]
#[output(name = "fact_sheet")]
pub struct FactSheet {
    /// One short third-person statement per entry; names, places, dates and numbers copied verbatim
    pub facts: Vec<String>,
}

/// Ordered, de-duplicated fact statements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactList {
    facts: Vec<String>,
}

impl FactList {
    /// Normalize raw statements: trim bullets, collapse whitespace, drop
    /// empties and case-insensitive duplicates.
    pub fn new<I, S>(raw: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let facts = raw
            .into_iter()
            .map(|fact| clean_fact(fact.as_ref()))
            .filter(|fact| !fact.is_empty())
            .filter(|fact| seen.insert(fact.to_lowercase()))
            .collect();
        Self { facts }
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.facts.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.facts
    }

    /// One "- fact" line per entry.
    pub fn as_bullets(&self) -> String {
        self.facts
            .iter()
            .map(|fact| format!("- {fact}\n"))
            .collect()
    }

    /// Stemmed content tokens across all facts.
    pub fn tokens(&self) -> BTreeSet<String> {
        self.facts
            .iter()
            .flat_map(|fact| content_tokens(fact))
            .collect()
    }
}

fn clean_fact(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches(['-', '*', '•', '·'])
        .trim_start();
    // Numbered list markers such as "3." or "12)".
    let digits = trimmed.chars().take_while(|c| c.is_ascii_digit()).count();
    let trimmed = if digits > 0 && is_list_marker(&trimmed[digits..]) {
        trimmed[digits + 1..].trim_start()
    } else {
        trimmed
    };
    collapse_whitespace(trimmed.trim_matches('"'))
}

fn is_bullet_line(line: &str) -> bool {
    let line = line.trim_start();
    if line.starts_with(['-', '*', '•', '·']) {
        return true;
    }
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    digits > 0 && is_list_marker(&line[digits..])
}

/// `rest` starts with ". " or ") ", as after "3" in "3. text".
fn is_list_marker(rest: &str) -> bool {
    let mut chars = rest.chars();
    matches!(chars.next(), Some('.') | Some(')'))
        && chars.next().map_or(true, char::is_whitespace)
}

/// Parse an extraction reply.
///
/// Tries, in order: JSON after stripping code fences, the outermost brace
/// pair, and one fact per bullet line. Prose without bullets yields nothing.
pub fn parse_fact_reply(raw: &str) -> FactList {
    if let Ok(sheet) = serde_json::from_str::<FactSheet>(extract_json(raw)) {
        return FactList::new(sheet.facts);
    }
    if let Some(braced) = outermost_braces(raw) {
        if let Ok(sheet) = serde_json::from_str::<FactSheet>(braced) {
            return FactList::new(sheet.facts);
        }
    }
    FactList::new(raw.lines().filter(|line| is_bullet_line(line)))
}

/// Request for stage-1 extraction.
pub fn extraction_messages(
    transcript: &str,
    notes: &[String],
    author: &AuthorContext,
    strictness: Strictness,
) -> Vec<ChatMessage> {
    let subject = match author.relation_term() {
        Some(relation) => format!("the writer's {relation}"),
        None => "the writer".to_string(),
    };

    let system = format!(
        "You extract facts from one stage of a life-story interview.\n\n\
         ## Rules\n\
         - {rule}\n\
         - Write each fact as one short, atomic, third-person statement about {subject}.\n\
         - Copy names, places, dates and numbers exactly as written.\n\
         - Use the guide's questions only to understand the answers; a question is never a fact.\n\
         - Notes are secondary context. Use them only where they agree with the transcript.\n\
         - If the transcript contains no facts, return an empty list.\n\n\
         {format}",
        rule = strictness.extraction_rule(),
        format = FactSheet::format_instructions(),
    );

    let mut user = format!("## Transcript\n{}\n", transcript.trim());
    if !notes.is_empty() {
        user.push_str("\n## Notes\n");
        for note in notes {
            user.push_str(&format!("- {}\n", note.trim()));
        }
    }

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::IdentityChoice;
    use crate::text::stem;

    #[test]
    fn test_parse_plain_json() {
        let facts = parse_fact_reply(r#"{"facts": ["Born in Lyon in 1948.", "Father was a baker."]}"#);
        assert_eq!(facts.as_slice(), &["Born in Lyon in 1948.", "Father was a baker."]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let facts = parse_fact_reply("```json\n{\"facts\": [\"Had two sisters.\"]}\n```");
        assert_eq!(facts.len(), 1);
    }

    #[test]
    fn test_parse_braces_inside_prose() {
        let facts = parse_fact_reply("Here you go: {\"facts\": [\"Lived on Rue Mercière.\"]} Done.");
        assert_eq!(facts.as_slice(), &["Lived on Rue Mercière."]);
    }

    #[test]
    fn test_parse_bullet_fallback() {
        let facts = parse_fact_reply("Facts:\n- Born in 1948\n2. Grew up in Lyon\n* Born in 1948\nThat is all.");
        assert_eq!(facts.as_slice(), &["Born in 1948", "Grew up in Lyon"]);
    }

    #[test]
    fn test_prose_without_bullets_is_empty() {
        assert!(parse_fact_reply("I could not find any facts in this transcript.").is_empty());
        assert!(parse_fact_reply(r#"{"facts": []}"#).is_empty());
    }

    #[test]
    fn test_extraction_prompt_uses_strict_rule_and_relation() {
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::SomeoneElse);
        author.set_relation("father");
        let messages = extraction_messages(
            "Guide: Where?\nWriter: Lyon.\n",
            &["Photo of the bakery".to_string()],
            &author,
            Strictness::Strict,
        );
        assert!(messages[0].content.contains(Strictness::Strict.extraction_rule()));
        assert!(messages[0].content.contains("the writer's father"));
        assert!(messages[0].content.contains("\"facts\""));
        assert!(messages[1].content.contains("- Photo of the bakery"));
    }

    #[test]
    fn test_tokens() {
        let facts = FactList::new(["Moved to Paris in 1970."]);
        let tokens = facts.tokens();
        assert!(tokens.contains(&stem("paris")));
        assert!(tokens.contains("1970"));
        assert!(tokens.contains(&stem("moved")));

        let decimal = FactList::new(["3.5 kilos of flour a day"]);
        assert_eq!(decimal.as_slice(), &["3.5 kilos of flour a day"]);
    }
}
