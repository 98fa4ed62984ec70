//! Anchors and closure-question validation.
//!
//! When a stage is being wrapped up, the last question must stay on ground
//! the writer already covered. Anchors are keywords lifted from the latest
//! answers; a closure question is only accepted when it names one of them
//! and does not invite new material. Anything else is replaced by a
//! template built around the first anchor.

use crate::author::AuthorContext;
use crate::stage::LifeStage;
use crate::text::{
    collapse_whitespace, contains_ci, has_question_mark, is_stopword, same_question, words,
};
use std::collections::HashSet;
use tracing::debug;

/// Phrases that solicit new information and are never allowed at closure.
pub const INDUCING_PHRASES: &[&str] = &[
    "anything else",
    "more details",
    "more detail",
    "something different",
    "something else",
    "tell me more",
    "what else",
    "any other",
    "another story",
    "something new",
    "elaborate",
    "expand on",
];

/// Keywords drawn from recent answers, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnchorSet {
    anchors: Vec<String>,
}

impl AnchorSet {
    /// Extract up to `max` anchors from answers given newest first.
    pub fn extract(answers: &[&str], max: usize) -> Self {
        let mut seen = HashSet::new();
        let mut anchors = Vec::new();

        'outer: for answer in answers {
            for word in words(answer) {
                if anchors.len() >= max {
                    break 'outer;
                }
                let word = word.trim_matches(|c: char| c == '\'' || c == '’' || c == '-');
                if word.chars().count() < 2 || is_stopword(word) {
                    continue;
                }
                if seen.insert(word.to_lowercase()) {
                    anchors.push(word.to_string());
                }
            }
        }

        Self { anchors }
    }

    pub fn first(&self) -> Option<&str> {
        self.anchors.first().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.anchors
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// The first anchor appearing in `text`, case-insensitively.
    pub fn matched_in(&self, text: &str) -> Option<&str> {
        self.anchors
            .iter()
            .find(|anchor| contains_ci(text, anchor))
            .map(String::as_str)
    }
}

/// Why a closure candidate was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    Empty,
    NotAQuestion,
    TooLong { chars: usize },
    NoAnchor,
    Inducing(&'static str),
    /// Same as the question shown just before.
    Repeat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureVerdict {
    Accepted,
    Rejected(RejectReason),
}

/// A closure question ready to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureQuestion {
    pub text: String,
    /// True when the candidate was refused and the template used instead.
    pub templated: bool,
}

/// Checks closure candidates against anchors and the inducing blocklist.
#[derive(Debug, Clone)]
pub struct ClosureValidator {
    max_chars: usize,
}

impl ClosureValidator {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn validate(&self, candidate: &str, anchors: &AnchorSet) -> ClosureVerdict {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            return ClosureVerdict::Rejected(RejectReason::Empty);
        }
        if !has_question_mark(candidate) {
            return ClosureVerdict::Rejected(RejectReason::NotAQuestion);
        }
        let chars = candidate.chars().count();
        if chars > self.max_chars {
            return ClosureVerdict::Rejected(RejectReason::TooLong { chars });
        }
        let lower = candidate.to_lowercase();
        if let Some(phrase) = INDUCING_PHRASES.iter().find(|p| lower.contains(*p)) {
            return ClosureVerdict::Rejected(RejectReason::Inducing(phrase));
        }
        if anchors.matched_in(candidate).is_none() {
            return ClosureVerdict::Rejected(RejectReason::NoAnchor);
        }
        ClosureVerdict::Accepted
    }

    /// Template question naming the first anchor, or the stage when there is none.
    pub fn template(&self, anchors: &AnchorSet, stage: LifeStage, author: &AuthorContext) -> String {
        match anchors.first() {
            Some(anchor) => format!("What does {anchor} mean to {} now?", audience(author)),
            None => self.stage_template(stage, author),
        }
    }

    fn stage_template(&self, stage: LifeStage, author: &AuthorContext) -> String {
        format!(
            "What mattered most to {} in \"{}\"?",
            audience(author),
            stage.label()
        )
    }

    /// Accept the candidate or fall back to the template.
    ///
    /// A candidate repeating `previous` is refused like any other; the
    /// template gives way to the stage-wide one if it would repeat too.
    pub fn resolve(
        &self,
        candidate: Option<&str>,
        previous: Option<&str>,
        anchors: &AnchorSet,
        stage: LifeStage,
        author: &AuthorContext,
    ) -> ClosureQuestion {
        let repeats = |text: &str| previous.is_some_and(|p| same_question(text, p));

        if let Some(candidate) = candidate {
            let candidate = collapse_whitespace(candidate);
            let verdict = if repeats(&candidate) {
                ClosureVerdict::Rejected(RejectReason::Repeat)
            } else {
                self.validate(&candidate, anchors)
            };
            match verdict {
                ClosureVerdict::Accepted => {
                    return ClosureQuestion {
                        text: candidate,
                        templated: false,
                    }
                }
                ClosureVerdict::Rejected(reason) => {
                    debug!(stage = %stage, ?reason, "closure candidate rejected");
                }
            }
        }

        let mut text = self.template(anchors, stage, author);
        if repeats(&text) {
            text = self.stage_template(stage, author);
        }
        ClosureQuestion {
            text,
            templated: true,
        }
    }
}

fn audience(author: &AuthorContext) -> String {
    match author.relation_term() {
        Some(relation) => format!("you and your {relation}"),
        None => "you".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::author::{AuthorMode, IdentityChoice};

    fn anchors() -> AnchorSet {
        AnchorSet::extract(
            &[
                "We kept bees behind the bakery in Lyon.",
                "My grandmother ran the bakery, I think it was 1962.",
            ],
            6,
        )
    }

    #[test]
    fn test_extract_most_recent_first_without_filler() {
        let set = anchors();
        assert_eq!(
            set.as_slice(),
            &["kept", "bees", "behind", "bakery", "Lyon", "grandmother"]
        );
    }

    #[test]
    fn test_extract_respects_max_and_dedupes() {
        let set = AnchorSet::extract(&["Lyon lyon LYON bakery"], 6);
        assert_eq!(set.as_slice(), &["Lyon", "bakery"]);
        let set = AnchorSet::extract(&["alpha beta gamma delta"], 2);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_accepts_anchored_question() {
        let validator = ClosureValidator::new(50);
        assert_eq!(
            validator.validate("What did the bakery in Lyon smell like?", &anchors()),
            ClosureVerdict::Accepted
        );
    }

    #[test]
    fn test_rejects_inducing_and_unanchored() {
        let validator = ClosureValidator::new(50);
        assert_eq!(
            validator.validate("Is there anything else about the bakery?", &anchors()),
            ClosureVerdict::Rejected(RejectReason::Inducing("anything else"))
        );
        assert_eq!(
            validator.validate("What was your first job?", &anchors()),
            ClosureVerdict::Rejected(RejectReason::NoAnchor)
        );
        assert_eq!(
            validator.validate("The bakery was important.", &anchors()),
            ClosureVerdict::Rejected(RejectReason::NotAQuestion)
        );
        let long = format!("What about the bakery {}?", "and so on ".repeat(20));
        assert!(matches!(
            validator.validate(&long, &anchors()),
            ClosureVerdict::Rejected(RejectReason::TooLong { .. })
        ));
    }

    #[test]
    fn test_template_names_first_anchor() {
        let validator = ClosureValidator::new(50);
        let author = AuthorContext::default();
        let question = validator.resolve(
            Some("Can you share more details about school?"),
            None,
            &anchors(),
            LifeStage::Childhood,
            &author,
        );
        assert!(question.templated);
        assert!(question.text.contains("kept"));
        assert_eq!(validator.validate(&question.text, &anchors()), ClosureVerdict::Accepted);
    }

    #[test]
    fn test_long_candidate_rejected_at_default_bound() {
        let validator = ClosureValidator::new(50);
        let candidate = "When you think back on the bakery on Rue Mercière today, what single smell comes first?";
        assert!(matches!(
            validator.validate(candidate, &anchors()),
            ClosureVerdict::Rejected(RejectReason::TooLong { .. })
        ));
    }

    #[test]
    fn test_repeated_candidate_uses_template() {
        let validator = ClosureValidator::new(50);
        let author = AuthorContext::default();
        let previous = "What did the bakery smell like?";
        let question = validator.resolve(
            Some("  what did the bakery smell like? "),
            Some(previous),
            &anchors(),
            LifeStage::Childhood,
            &author,
        );
        assert!(question.templated);
        assert_eq!(question.text, "What does kept mean to you now?");

        // The template itself must not repeat either.
        let again = validator.resolve(
            None,
            Some(&question.text),
            &anchors(),
            LifeStage::Childhood,
            &author,
        );
        assert!(again.templated);
        assert_eq!(again.text, "What mattered most to you in \"Childhood\"?");
    }

    #[test]
    fn test_template_without_anchors_uses_stage() {
        let validator = ClosureValidator::new(50);
        let mut author = AuthorContext::default();
        author.apply_identity(IdentityChoice::SomeoneElse);
        author.set_relation("father");
        assert_eq!(author.mode, Some(AuthorMode::Other));

        let question = validator.resolve(None, None, &AnchorSet::default(), LifeStage::MiddleAge, &author);
        assert!(question.templated);
        assert!(question.text.contains("you and your father"));
        assert!(question.text.contains("\"Middle age\""));
        assert!(question.text.ends_with('?'));
    }

    #[test]
    fn test_templates_never_induce() {
        let validator = ClosureValidator::new(50);
        let author = AuthorContext::default();
        for stage in LifeStage::ALL {
            let text = validator.template(&anchors(), stage, &author).to_lowercase();
            assert!(INDUCING_PHRASES.iter().all(|p| !text.contains(p)));
        }
    }
}
