//! Per-stage interview state.
//!
//! One [`InterviewSession`] exists per writer and life stage. It holds the
//! recorded turns, the append-only transcript, and the flags that drive the
//! soft limit, hard limit and closure flow. The engine decides what happens
//! next by asking for the session's [`StagePhase`].

use crate::config::InterviewLimits;
use crate::question::QuestionKind;
use crate::stage::LifeStage;
use crate::synthesis::NarrativeDraft;
use crate::text::{collapse_whitespace, contains_ci};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One answered question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// The question currently awaiting an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingQuestion {
    pub text: String,
    pub kind: QuestionKind,
}

/// Where a stage stands relative to its limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagePhase {
    InProgress,
    /// Soft limit reached and the offer has not been shown yet.
    AtSoftLimit,
    AtHardLimit,
    ClosurePending,
    Done,
}

/// The writer's answer to the continue-or-summarize offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitChoice {
    Continue,
    Summarize,
}

impl LimitChoice {
    /// Classify a free-text reply to the offer.
    ///
    /// Rules, checked in order:
    /// 1. "1" or a reply starting with "continue", "keep", "more" or "go on" is `Continue`.
    /// 2. "2" or a reply starting with "summar", "wrap", "next", "move on", "finish" or
    ///    "done" is `Summarize`.
    /// 3. A reply mentioning both families, or neither, is ambiguous and yields `None`.
    pub fn classify(text: &str) -> Option<Self> {
        let text = text.trim().to_lowercase();
        let text = text.trim_matches(|c: char| !c.is_alphanumeric());
        match text {
            "1" => return Some(LimitChoice::Continue),
            "2" => return Some(LimitChoice::Summarize),
            _ => {}
        }

        const CONTINUE: &[&str] = &["continue", "keep", "more", "go on"];
        const SUMMARIZE: &[&str] = &["summar", "wrap", "next", "move on", "finish", "done"];

        let starts_continue = CONTINUE.iter().any(|p| text.starts_with(p));
        let starts_summarize = SUMMARIZE.iter().any(|p| text.starts_with(p));
        let mentions_continue = CONTINUE.iter().any(|p| text.contains(p));
        let mentions_summarize = SUMMARIZE.iter().any(|p| text.contains(p));

        match (starts_continue, starts_summarize) {
            (true, false) if !mentions_summarize => Some(LimitChoice::Continue),
            (false, true) if !mentions_continue => Some(LimitChoice::Summarize),
            _ => None,
        }
    }
}

/// Phrases that mean the writer does not remember.
const NO_RECALL: &[&str] = &[
    "don't remember",
    "do not remember",
    "don't recall",
    "do not recall",
    "can't remember",
    "cannot remember",
    "can't recall",
    "no memory of",
    "no idea",
    "not sure",
    "i forget",
    "i forgot",
];

/// Interview state for one writer and one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterviewSession {
    pub stage: LifeStage,
    turns: Vec<Turn>,
    section_text: String,
    #[serde(default)]
    pub themes: BTreeSet<String>,
    #[serde(default)]
    pub closure_pending: bool,
    #[serde(default)]
    pub soft_limit_shown: bool,
    /// The soft-limit offer is out and awaits a [`LimitChoice`].
    #[serde(default)]
    pub choice_pending: bool,
    #[serde(default)]
    pub beyond_limit_allowed: bool,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub pending_question: Option<PendingQuestion>,
    /// Text of the most recently shown question.
    #[serde(default)]
    pub last_asked: Option<String>,
    #[serde(default)]
    pub tip_shown: bool,
    #[serde(default)]
    pub pool_cursor: usize,
    /// Counts transcript and question-state changes.
    #[serde(default)]
    pub revision: u64,
    #[serde(default)]
    pub draft: Option<NarrativeDraft>,
}

impl InterviewSession {
    pub fn new(stage: LifeStage) -> Self {
        Self {
            stage,
            turns: Vec::new(),
            section_text: String::new(),
            themes: BTreeSet::new(),
            closure_pending: false,
            soft_limit_shown: false,
            choice_pending: false,
            beyond_limit_allowed: false,
            done: false,
            pending_question: None,
            last_asked: None,
            tip_shown: false,
            pool_cursor: 0,
            revision: 0,
            draft: None,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    /// The append-only transcript.
    pub fn section_text(&self) -> &str {
        &self.section_text
    }

    pub fn transcript_chars(&self) -> usize {
        self.section_text.chars().count()
    }

    /// The last `window` turns, oldest first.
    pub fn recent_turns(&self, window: usize) -> &[Turn] {
        let start = self.turns.len().saturating_sub(window);
        &self.turns[start..]
    }

    /// The last `n` answers, newest first.
    pub fn recent_answers(&self, n: usize) -> Vec<&str> {
        self.turns
            .iter()
            .rev()
            .take(n)
            .map(|turn| turn.answer.as_str())
            .collect()
    }

    /// Record a question and its answer.
    pub fn record_answer(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        let turn = Turn {
            question: collapse_whitespace(&question.into()),
            answer: answer.into().trim().to_string(),
        };
        self.section_text.push_str(&format!(
            "Guide: {}\nWriter: {}\n\n",
            turn.question, turn.answer
        ));
        self.turns.push(turn);
        self.touch();
    }

    /// Append material that did not come from a question, such as an imported note.
    pub fn append_external(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        self.section_text.push_str(text);
        self.section_text.push_str("\n\n");
        self.touch();
    }

    /// Mark a question as shown and awaiting an answer.
    pub fn set_pending(&mut self, text: impl Into<String>, kind: QuestionKind) {
        let text = text.into();
        self.last_asked = Some(text.clone());
        self.pending_question = Some(PendingQuestion { text, kind });
        if kind == QuestionKind::Canned {
            self.pool_cursor += 1;
        }
        self.touch();
    }

    /// Drop the pending question without recording a turn.
    pub fn discard_pending(&mut self) -> Option<PendingQuestion> {
        let pending = self.pending_question.take();
        if pending.is_some() {
            self.touch();
        }
        pending
    }

    pub fn phase(&self, limits: &InterviewLimits) -> StagePhase {
        if self.done {
            return StagePhase::Done;
        }
        if self.closure_pending {
            return StagePhase::ClosurePending;
        }
        let chars = self.transcript_chars();
        if chars >= limits.hard_chars {
            return StagePhase::AtHardLimit;
        }
        let soft_reached = self.turn_count() >= limits.soft_turns || chars >= limits.soft_chars;
        if soft_reached && !self.soft_limit_shown && !self.beyond_limit_allowed {
            return StagePhase::AtSoftLimit;
        }
        StagePhase::InProgress
    }

    /// Whether the latest answer says the writer does not remember.
    pub fn last_answer_expresses_no_recall(&self) -> bool {
        self.turns
            .last()
            .map(|turn| NO_RECALL.iter().any(|phrase| contains_ci(&turn.answer, phrase)))
            .unwrap_or(false)
    }

    /// The writer picked continue or summarize.
    pub fn apply_choice(&mut self, choice: LimitChoice) {
        self.choice_pending = false;
        self.soft_limit_shown = true;
        match choice {
            LimitChoice::Continue => self.beyond_limit_allowed = true,
            LimitChoice::Summarize => self.closure_pending = true,
        }
        self.touch();
    }

    pub fn mark_done(&mut self) {
        self.done = true;
        self.closure_pending = false;
        self.choice_pending = false;
        self.pending_question = None;
        self.touch();
    }

    /// Reopen a finished stage; recorded turns are kept.
    pub fn reopen(&mut self) {
        self.done = false;
        self.closure_pending = false;
        self.choice_pending = false;
        self.pending_question = None;
        self.beyond_limit_allowed = true;
        self.touch();
    }

    fn touch(&mut self) {
        self.revision += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> InterviewLimits {
        InterviewLimits::default()
    }

    #[test]
    fn test_turn_count_tracks_recorded_pairs() {
        let mut session = InterviewSession::new(LifeStage::Childhood);
        assert_eq!(session.turn_count(), 0);
        session.record_answer("Where did you grow up?", "In Lyon.");
        session.record_answer("Who lived with you?", "My grandmother.");
        assert_eq!(session.turn_count(), session.turns().len());
        assert_eq!(session.turn_count(), 2);
        assert!(session
            .section_text()
            .starts_with("Guide: Where did you grow up?\nWriter: In Lyon.\n\n"));
    }

    #[test]
    fn test_soft_limit_by_turns() {
        let mut session = InterviewSession::new(LifeStage::Youth);
        for i in 0..7 {
            session.record_answer(format!("Q{i}?"), "answer");
        }
        assert_eq!(session.phase(&limits()), StagePhase::InProgress);
        session.record_answer("Q7?", "answer");
        assert_eq!(session.phase(&limits()), StagePhase::AtSoftLimit);

        session.soft_limit_shown = true;
        assert_eq!(session.phase(&limits()), StagePhase::InProgress);
    }

    #[test]
    fn test_soft_and_hard_limit_by_chars() {
        let mut session = InterviewSession::new(LifeStage::Youth);
        session.record_answer("Where?", "x".repeat(8050));
        assert_eq!(session.phase(&limits()), StagePhase::AtSoftLimit);

        session.apply_choice(LimitChoice::Continue);
        assert_eq!(session.phase(&limits()), StagePhase::InProgress);

        session.record_answer("And then?", "y".repeat(1000));
        assert_eq!(session.phase(&limits()), StagePhase::AtHardLimit);
    }

    #[test]
    fn test_summarize_sets_closure() {
        let mut session = InterviewSession::new(LifeStage::Youth);
        session.apply_choice(LimitChoice::Summarize);
        assert_eq!(session.phase(&limits()), StagePhase::ClosurePending);
        session.mark_done();
        assert_eq!(session.phase(&limits()), StagePhase::Done);
    }

    #[test]
    fn test_reopen_keeps_turns() {
        let mut session = InterviewSession::new(LifeStage::Present);
        session.record_answer("What now?", "Gardening.");
        session.mark_done();
        session.reopen();
        assert!(!session.done);
        assert_eq!(session.turn_count(), 1);
        assert_eq!(session.phase(&limits()), StagePhase::InProgress);
    }

    #[test]
    fn test_recent_answers_newest_first() {
        let mut session = InterviewSession::new(LifeStage::Childhood);
        session.record_answer("a?", "first");
        session.record_answer("b?", "second");
        session.record_answer("c?", "third");
        assert_eq!(session.recent_answers(2), vec!["third", "second"]);
        assert_eq!(session.recent_turns(2)[0].answer, "second");
    }

    #[test]
    fn test_no_recall_detection() {
        let mut session = InterviewSession::new(LifeStage::Childhood);
        session.record_answer("What was the street called?", "Honestly I don't remember.");
        assert!(session.last_answer_expresses_no_recall());
        session.record_answer("Who lived next door?", "The Moreau family.");
        assert!(!session.last_answer_expresses_no_recall());
    }

    #[test]
    fn test_revision_increases_on_changes() {
        let mut session = InterviewSession::new(LifeStage::Childhood);
        let start = session.revision;
        session.set_pending("Where?", QuestionKind::Kickoff);
        session.record_answer("Where?", "Here.");
        assert!(session.revision >= start + 2);
    }

    #[test]
    fn test_limit_choice_classifier() {
        assert_eq!(LimitChoice::classify("1"), Some(LimitChoice::Continue));
        assert_eq!(LimitChoice::classify("Continue please"), Some(LimitChoice::Continue));
        assert_eq!(LimitChoice::classify("keep going"), Some(LimitChoice::Continue));
        assert_eq!(LimitChoice::classify(" 2 "), Some(LimitChoice::Summarize));
        assert_eq!(LimitChoice::classify("Summarize it"), Some(LimitChoice::Summarize));
        assert_eq!(LimitChoice::classify("wrap up"), Some(LimitChoice::Summarize));
        assert_eq!(LimitChoice::classify("continue or wrap up?"), None);
        assert_eq!(LimitChoice::classify("hmm"), None);
    }
}
