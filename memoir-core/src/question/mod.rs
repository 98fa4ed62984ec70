//! Question generation policy.
//!
//! A [`QuestionSource`] turns a [`QuestionContext`] into exactly one
//! question. The engine picks the source from configuration: model-driven
//! ([`GeneratedQuestionSource`]) or the canned bank
//! ([`FixedPoolQuestionSource`]). Both share the same state machine.

pub mod bank;
pub mod postprocess;
pub mod prompt;
mod source;

pub use postprocess::USAGE_TIP;
pub use source::{FixedPoolQuestionSource, GeneratedQuestionSource, QuestionSource};

use crate::author::AuthorContext;
use crate::interview::Turn;
use crate::stage::LifeStage;
use crate::store::WriterId;
use crate::text::same_question;
use crate::style::StyleProfile;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Where a shown question came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    /// Fixed opening question for a stage.
    Kickoff,
    /// Produced by the model.
    Generated,
    /// Per-stage fallback after a generation failure.
    Fallback,
    /// From the canned bank.
    Canned,
    /// The single wrap-up question of a stage.
    Closure,
}

/// A resolved question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOutcome {
    pub text: String,
    pub kind: QuestionKind,
}

impl QuestionOutcome {
    pub fn new(text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn fallback(stage: LifeStage, author: &AuthorContext) -> Self {
        Self::new(stage.fallback_question(author), QuestionKind::Fallback)
    }
}

/// Everything a source may look at when choosing the next question.
#[derive(Debug, Clone)]
pub struct QuestionContext<'a> {
    pub writer: &'a WriterId,
    pub stage: LifeStage,
    pub author: &'a AuthorContext,
    pub style: &'a StyleProfile,
    pub themes: &'a BTreeSet<String>,
    /// Recent turns, oldest first.
    pub history: &'a [Turn],
    /// The question shown immediately before this one, if any.
    pub previous_question: Option<&'a str>,
    /// The last answer said "I don't remember".
    pub avoid_recalled_angle: bool,
    pub turn_count: usize,
    pub pool_cursor: usize,
    pub max_question_chars: usize,
}

/// Replace a question that repeats the previous one.
///
/// Tries the stage kickoff, then the fallback, then canned questions from
/// the bank starting at the pool cursor.
pub fn ensure_fresh(outcome: QuestionOutcome, ctx: &QuestionContext<'_>) -> QuestionOutcome {
    let Some(previous) = ctx.previous_question else {
        return outcome;
    };
    if !same_question(&outcome.text, previous) {
        return outcome;
    }
    debug!(stage = %ctx.stage, "replacing repeated question");

    let candidates = [
        QuestionOutcome::new(ctx.stage.kickoff_question(ctx.author), QuestionKind::Kickoff),
        QuestionOutcome::fallback(ctx.stage, ctx.author),
    ];
    if let Some(fresh) = candidates
        .into_iter()
        .find(|candidate| !same_question(&candidate.text, previous))
    {
        return fresh;
    }

    (0..bank::POOL_SIZE)
        .map(|offset| bank::question(ctx.stage, ctx.pool_cursor + offset, ctx.author))
        .find(|text| !same_question(text, previous))
        .map(|text| QuestionOutcome::new(text, QuestionKind::Canned))
        .unwrap_or(outcome)
}
