//! Who is writing, and about whom.
//!
//! The author context is settled by two bootstrap questions before any
//! stage content is asked: whose story this is, and (when it is someone
//! else's) how the writer is related to them. Every prompt and every
//! post-processing pass reads the mode from here.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Fixed bootstrap question asked before any stage content.
pub const IDENTITY_QUESTION: &str =
    "Before we begin: whose story are we writing together?";

/// Follow-up asked when the writer is recording someone else's life.
pub const RELATION_QUESTION: &str =
    "Who is this story about? Tell me how they are related to you (for example: mother, grandfather, aunt).";

/// Whether the writer records their own life or a relative's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorMode {
    #[serde(rename = "self")]
    SelfStory,
    Other,
}

/// The three answers to the identity question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityChoice {
    Myself,
    SomeoneElse,
    Undecided,
}

impl IdentityChoice {
    pub const ALL: [IdentityChoice; 3] = [
        IdentityChoice::Myself,
        IdentityChoice::SomeoneElse,
        IdentityChoice::Undecided,
    ];

    pub fn label(self) -> &'static str {
        match self {
            IdentityChoice::Myself => "My own life",
            IdentityChoice::SomeoneElse => "A family member or someone close to me",
            IdentityChoice::Undecided => "Not sure yet",
        }
    }

    /// Fallback classifier for free-text replies.
    ///
    /// Accepts the option number ("1", "2", "3") or a keyword. Returns `None`
    /// when nothing matches so the caller can ask again.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        let text = text.trim_matches(|c: char| !c.is_alphanumeric() && c != ' ');
        match text {
            "1" | "me" | "myself" | "self" | "mine" | "my own" | "my own life" | "my life" => {
                Some(IdentityChoice::Myself)
            }
            "2" | "other" | "someone else" | "someone" | "a relative" | "relative"
            | "family member" | "a family member" => Some(IdentityChoice::SomeoneElse),
            "3" | "undecided" | "not sure" | "not sure yet" | "don't know" | "unsure" => {
                Some(IdentityChoice::Undecided)
            }
            _ => None,
        }
    }
}

/// Where the bootstrap dialogue stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapState {
    AwaitingIdentity,
    AwaitingRelation,
    Ready,
}

/// What the writer has told us about the person whose life is recorded.
///
/// Every field is optional and never guessed; prompts render missing
/// fields as "unspecified".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectProfile {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub birth: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub residence: Option<String>,
    #[serde(default)]
    pub education: Option<String>,
    #[serde(default)]
    pub occupation: Option<String>,
    /// Any further labelled facts (e.g. "siblings").
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl SubjectProfile {
    /// Render as a labelled fact sheet.
    pub fn fact_sheet(&self) -> String {
        let field = |value: &Option<String>| {
            value
                .as_deref()
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or("unspecified")
                .to_string()
        };

        let mut sheet = String::new();
        sheet.push_str(&format!("- Name: {}\n", field(&self.name)));
        sheet.push_str(&format!("- Gender: {}\n", field(&self.gender)));
        sheet.push_str(&format!("- Born: {}\n", field(&self.birth)));
        sheet.push_str(&format!("- Origin: {}\n", field(&self.origin)));
        sheet.push_str(&format!("- Lives in: {}\n", field(&self.residence)));
        sheet.push_str(&format!("- Education: {}\n", field(&self.education)));
        sheet.push_str(&format!("- Occupation: {}\n", field(&self.occupation)));
        for (label, value) in &self.extra {
            let value = value.trim();
            if !value.is_empty() {
                sheet.push_str(&format!("- {label}: {value}\n"));
            }
        }
        sheet
    }
}

/// Author mode, relation, and subject profile for one writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorContext {
    /// Unset until the identity question is answered.
    #[serde(default)]
    pub mode: Option<AuthorMode>,
    /// Relation term such as "mother"; required when `mode` is `Other`.
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub subject: SubjectProfile,
}

impl AuthorContext {
    pub fn bootstrap_state(&self) -> BootstrapState {
        match (self.mode, self.relation_term()) {
            (None, _) => BootstrapState::AwaitingIdentity,
            (Some(AuthorMode::Other), None) => BootstrapState::AwaitingRelation,
            _ => BootstrapState::Ready,
        }
    }

    /// The mode prompts should follow; unset behaves as self.
    pub fn effective_mode(&self) -> AuthorMode {
        self.mode.unwrap_or(AuthorMode::SelfStory)
    }

    pub fn is_other(&self) -> bool {
        self.effective_mode() == AuthorMode::Other
    }

    /// Relation term, only when writing about someone else.
    pub fn relation_term(&self) -> Option<&str> {
        if self.mode != Some(AuthorMode::Other) {
            return None;
        }
        self.relation
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Apply the answer to the identity question.
    pub fn apply_identity(&mut self, choice: IdentityChoice) {
        self.mode = Some(match choice {
            IdentityChoice::SomeoneElse => AuthorMode::Other,
            // Undecided writers start on their own story; they can switch later.
            IdentityChoice::Myself | IdentityChoice::Undecided => AuthorMode::SelfStory,
        });
        if self.mode == Some(AuthorMode::SelfStory) {
            self.relation = None;
        }
    }

    /// Store the relation term, normalizing "my mother" to "mother".
    ///
    /// Returns `false` when the reply is empty.
    pub fn set_relation(&mut self, relation: &str) -> bool {
        let relation = relation
            .trim()
            .trim_end_matches(['.', '!', '?'])
            .trim();
        let lower = relation.to_lowercase();
        let relation = ["my ", "she is my ", "he is my ", "it's my ", "it is my "]
            .iter()
            .find_map(|prefix| lower.starts_with(prefix).then(|| &relation[prefix.len()..]))
            .unwrap_or(relation)
            .trim();
        if relation.is_empty() {
            return false;
        }
        self.relation = Some(relation.to_lowercase());
        true
    }

    /// "your" or "your mother's".
    pub fn possessive(&self) -> String {
        match self.relation_term() {
            Some(relation) => format!("your {relation}'s"),
            None => "your".to_string(),
        }
    }

    /// How the narrative refers to the subject: "I" or "my mother".
    pub fn narrative_subject(&self) -> String {
        match self.relation_term() {
            Some(relation) => format!("my {relation}"),
            None => "I".to_string(),
        }
    }

    /// Fill a `{whose}` template.
    pub fn render(&self, template: &str) -> String {
        template.replace("{whose}", &self.possessive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_flow() {
        let mut author = AuthorContext::default();
        assert_eq!(author.bootstrap_state(), BootstrapState::AwaitingIdentity);

        author.apply_identity(IdentityChoice::SomeoneElse);
        assert_eq!(author.bootstrap_state(), BootstrapState::AwaitingRelation);

        assert!(!author.set_relation("   "));
        assert_eq!(author.bootstrap_state(), BootstrapState::AwaitingRelation);

        assert!(author.set_relation("My Mother."));
        assert_eq!(author.relation.as_deref(), Some("mother"));
        assert_eq!(author.bootstrap_state(), BootstrapState::Ready);
        assert_eq!(author.possessive(), "your mother's");
        assert_eq!(author.narrative_subject(), "my mother");
    }

    #[test]
    fn test_undecided_proceeds_as_self() {
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::Undecided);
        assert_eq!(author.effective_mode(), AuthorMode::SelfStory);
        assert_eq!(author.bootstrap_state(), BootstrapState::Ready);
        assert_eq!(author.possessive(), "your");
    }

    #[test]
    fn test_identity_parse() {
        assert_eq!(IdentityChoice::parse(" 1 "), Some(IdentityChoice::Myself));
        assert_eq!(IdentityChoice::parse("Other"), Some(IdentityChoice::SomeoneElse));
        assert_eq!(IdentityChoice::parse("not sure!"), Some(IdentityChoice::Undecided));
        assert_eq!(IdentityChoice::parse("banana"), None);
    }

    #[test]
    fn test_fact_sheet_never_guesses() {
        let profile = SubjectProfile {
            name: Some("Ada".into()),
            occupation: Some("  ".into()),
            ..Default::default()
        };
        let sheet = profile.fact_sheet();
        assert!(sheet.contains("- Name: Ada"));
        assert!(sheet.contains("- Occupation: unspecified"));
        assert!(sheet.contains("- Born: unspecified"));
    }

    #[test]
    fn test_mode_serializes_as_self() {
        let json = serde_json::to_string(&AuthorMode::SelfStory).unwrap();
        assert_eq!(json, "\"self\"");
    }
}
