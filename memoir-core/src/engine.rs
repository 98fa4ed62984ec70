//! The interview engine.
//!
//! [`InterviewEngine`] ties the pieces together: it bootstraps the author
//! context, walks each life stage through its soft limit, hard limit and
//! closure, and runs narrative synthesis on demand.
//!
//! State changes for a writer happen under a per-writer lock that is never
//! held across a generation call. Generation works on a snapshot; when the
//! result comes back the engine re-reads the session and drops the result
//! if the writer switched stages or the session changed in the meantime.

use crate::anchor::{AnchorSet, ClosureValidator};
use crate::author::{
    AuthorContext, AuthorMode, BootstrapState, IdentityChoice, SubjectProfile, IDENTITY_QUESTION,
    RELATION_QUESTION,
};
use crate::config::{EngineConfig, QuestionMode};
use crate::generation::{GenerationError, TextGenerator};
use crate::interview::{InterviewSession, LimitChoice, StagePhase};
use crate::persist::WriterArchive;
use crate::question::{
    self, FixedPoolQuestionSource, GeneratedQuestionSource, QuestionContext, QuestionKind,
    QuestionOutcome, QuestionSource, USAGE_TIP,
};
use crate::stage::LifeStage;
use crate::store::{NotesLookup, ProfileStore, SessionStore, StoreError, WriterId, WriterProgress};
use crate::style::StyleProfile;
use crate::synthesis::{FactList, NarrativeDraft, PolishOutcome, SynthesisError, Synthesizer};
use crate::throttle::{Throttle, ThrottledGenerator};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info};

/// Errors surfaced to the caller of the engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Generation failed after retries: {0}")]
    GenerationTransient(GenerationError),

    #[error("Generation failed: {0}")]
    GenerationHard(GenerationError),

    #[error("Not enough material in {stage} to write a narrative")]
    ExtractionEmpty { stage: LifeStage },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("The identity question has not been answered")]
    BootstrapIncomplete,

    #[error("The relation must not be empty")]
    InvalidRelation,

    #[error("A relation is only needed when writing about someone else")]
    RelationNotExpected,

    #[error("No question is pending in {stage}")]
    NoPendingQuestion { stage: LifeStage },

    #[error("{stage} is done; reopen it to continue")]
    StageDone { stage: LifeStage },

    #[error("Answer is empty")]
    EmptyAnswer,

    #[error("Waiting for a continue-or-summarize choice in {stage}")]
    ChoicePending { stage: LifeStage },

    #[error("No continue-or-summarize choice is pending in {stage}")]
    NoLimitOffer { stage: LifeStage },

    #[error("Reply is neither continue nor summarize")]
    UnclearChoice,

    #[error("No narrative draft for {stage}")]
    NoDraft { stage: LifeStage },

    #[error("{stage} changed while the request was running")]
    Superseded { stage: LifeStage },

    #[error("No text generator configured")]
    Unavailable,
}

impl From<GenerationError> for EngineError {
    fn from(err: GenerationError) -> Self {
        match err {
            GenerationError::Unavailable => EngineError::Unavailable,
            err if err.is_transient() => EngineError::GenerationTransient(err),
            err => EngineError::GenerationHard(err),
        }
    }
}

impl From<SynthesisError> for EngineError {
    fn from(err: SynthesisError) -> Self {
        match err {
            SynthesisError::ExtractionEmpty { stage } => EngineError::ExtractionEmpty { stage },
            SynthesisError::Generation(err) => err.into(),
        }
    }
}

/// What the writer should see next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prompt {
    /// Whose story is this?
    Identity {
        text: String,
        options: Vec<IdentityChoice>,
    },
    /// How is the subject related to the writer?
    Relation { text: String },
    Question {
        stage: LifeStage,
        text: String,
        kind: QuestionKind,
        /// Shown once per stage, next to the first question.
        tip: Option<String>,
    },
    /// Continue probing, or summarize and move on.
    LimitOffer { stage: LifeStage, text: String },
    StageClosed {
        stage: LifeStage,
        notice: String,
        next_stage: LifeStage,
        /// Closed by the hard limit rather than by the writer.
        forced: bool,
    },
    /// A late result was dropped; ask again for the current stage.
    Superseded { stage: LifeStage },
}

impl Prompt {
    /// The main text to show, if any.
    pub fn text(&self) -> Option<&str> {
        match self {
            Prompt::Identity { text, .. }
            | Prompt::Relation { text }
            | Prompt::Question { text, .. }
            | Prompt::LimitOffer { text, .. } => Some(text),
            Prompt::StageClosed { notice, .. } => Some(notice),
            Prompt::Superseded { .. } => None,
        }
    }

    fn identity() -> Self {
        Prompt::Identity {
            text: IDENTITY_QUESTION.to_string(),
            options: IdentityChoice::ALL.to_vec(),
        }
    }

    fn relation() -> Self {
        Prompt::Relation {
            text: RELATION_QUESTION.to_string(),
        }
    }

    fn limit_offer(stage: LifeStage) -> Self {
        Prompt::LimitOffer {
            stage,
            text: format!(
                "We have gathered a lot for the chapter \"{}\". Would you like to (1) keep exploring it, or (2) summarize it and move on?",
                stage.label()
            ),
        }
    }

    fn stage_closed(stage: LifeStage, next_stage: LifeStage, forced: bool) -> Self {
        let notice = if forced {
            format!(
                "The chapter \"{}\" has reached its length limit, so we will close it here. Next up: \"{}\".",
                stage.label(),
                next_stage.label()
            )
        } else {
            format!(
                "Thank you. The chapter \"{}\" is complete. Next up: \"{}\".",
                stage.label(),
                next_stage.label()
            )
        };
        Prompt::StageClosed {
            stage,
            notice,
            next_stage,
            forced,
        }
    }
}

/// Per-stage status for progress displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOverview {
    pub stage: LifeStage,
    pub turns: usize,
    pub chars: usize,
    pub done: bool,
    pub has_draft: bool,
    pub active: bool,
}

/// Everything a question request reads, captured under the writer lock.
struct Snapshot {
    progress: WriterProgress,
    session: InterviewSession,
    author: AuthorContext,
    style: StyleProfile,
}

enum Step {
    Ready(Prompt),
    Closure,
    Generate(Snapshot),
}

/// The guided interview and synthesis engine.
pub struct InterviewEngine {
    config: EngineConfig,
    sessions: Arc<dyn SessionStore>,
    profiles: Arc<dyn ProfileStore>,
    notes: Arc<dyn NotesLookup>,
    questions: Arc<dyn QuestionSource>,
    synthesizer: Option<Synthesizer>,
    closure: ClosureValidator,
    locks: Mutex<HashMap<WriterId, Arc<tokio::sync::Mutex<()>>>>,
}

impl InterviewEngine {
    /// Create an engine that generates through `generator`.
    ///
    /// The question source follows `config.questions.mode`.
    pub fn new<S>(config: EngineConfig, generator: Arc<dyn TextGenerator>, store: Arc<S>) -> Self
    where
        S: SessionStore + ProfileStore + NotesLookup + 'static,
    {
        let throttle = Arc::new(Throttle::new(config.throttle.clone()));
        let throttled = ThrottledGenerator::new(generator, throttle);
        let questions: Arc<dyn QuestionSource> = match config.questions.mode {
            QuestionMode::Generated => Arc::new(GeneratedQuestionSource::new(
                throttled.clone(),
                config.generation.clone(),
            )),
            QuestionMode::FixedPool => Arc::new(FixedPoolQuestionSource::new()),
        };
        let synthesizer = Synthesizer::new(throttled, config.generation.clone());
        Self::assemble(config, store, questions, Some(synthesizer))
    }

    /// Create an engine with no generator: canned questions, no synthesis.
    pub fn offline<S>(config: EngineConfig, store: Arc<S>) -> Self
    where
        S: SessionStore + ProfileStore + NotesLookup + 'static,
    {
        let config = config.with_question_mode(QuestionMode::FixedPool);
        Self::assemble(config, store, Arc::new(FixedPoolQuestionSource::new()), None)
    }

    fn assemble<S>(
        config: EngineConfig,
        store: Arc<S>,
        questions: Arc<dyn QuestionSource>,
        synthesizer: Option<Synthesizer>,
    ) -> Self
    where
        S: SessionStore + ProfileStore + NotesLookup + 'static,
    {
        let closure = ClosureValidator::new(config.anchors.closure_max_chars);
        Self {
            config,
            sessions: store.clone(),
            profiles: store.clone(),
            notes: store,
            questions,
            synthesizer,
            closure,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Replace the question source.
    pub fn with_question_source(mut self, source: Arc<dyn QuestionSource>) -> Self {
        self.questions = source;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn question_source(&self) -> &'static str {
        self.questions.name()
    }

    // ========================================================================
    // Loading helpers
    // ========================================================================

    async fn lock(&self, writer: &WriterId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(writer.clone()).or_default().clone()
        };
        lock.lock_owned().await
    }

    pub async fn author(&self, writer: &WriterId) -> Result<AuthorContext, EngineError> {
        Ok(self.profiles.load_author(writer).await?.unwrap_or_default())
    }

    pub async fn style(&self, writer: &WriterId) -> Result<StyleProfile, EngineError> {
        Ok(self.profiles.load_style(writer).await?.unwrap_or_default())
    }

    pub async fn progress(&self, writer: &WriterId) -> Result<WriterProgress, EngineError> {
        Ok(self.sessions.load_progress(writer).await?.unwrap_or_default())
    }

    pub async fn session(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<InterviewSession, EngineError> {
        Ok(self
            .sessions
            .load_session(writer, stage)
            .await?
            .unwrap_or_else(|| InterviewSession::new(stage)))
    }

    async fn ready_author(&self, writer: &WriterId) -> Result<AuthorContext, EngineError> {
        let author = self.author(writer).await?;
        if author.bootstrap_state() != BootstrapState::Ready {
            return Err(EngineError::BootstrapIncomplete);
        }
        Ok(author)
    }

    /// Load the active stage for a question request. Fails on done stages.
    async fn snapshot(&self, writer: &WriterId) -> Result<Snapshot, EngineError> {
        let author = self.ready_author(writer).await?;
        let style = self.style(writer).await?;
        let progress = self.progress(writer).await?;
        let session = self.session(writer, progress.active_stage).await?;
        if session.done {
            return Err(EngineError::StageDone {
                stage: session.stage,
            });
        }
        Ok(Snapshot {
            progress,
            session,
            author,
            style,
        })
    }

    fn context<'a>(&self, writer: &'a WriterId, snapshot: &'a Snapshot) -> QuestionContext<'a> {
        let session = &snapshot.session;
        QuestionContext {
            writer,
            stage: session.stage,
            author: &snapshot.author,
            style: &snapshot.style,
            themes: &session.themes,
            history: session.recent_turns(self.config.questions.history_window),
            previous_question: session.last_asked.as_deref(),
            avoid_recalled_angle: session.last_answer_expresses_no_recall(),
            turn_count: session.turn_count(),
            pool_cursor: session.pool_cursor,
            max_question_chars: self.config.questions.max_question_chars,
        }
    }

    /// Store a generated question unless the snapshot went stale.
    async fn commit(
        &self,
        writer: &WriterId,
        snapshot: &Snapshot,
        outcome: QuestionOutcome,
    ) -> Result<Prompt, EngineError> {
        let _guard = self.lock(writer).await;
        let stage = snapshot.session.stage;
        let progress = self.progress(writer).await?;
        let mut session = self.session(writer, stage).await?;

        if progress.epoch != snapshot.progress.epoch
            || progress.active_stage != stage
            || session.revision != snapshot.session.revision
        {
            debug!(writer = %writer, stage = %stage, "discarding stale question");
            return Ok(Prompt::Superseded { stage });
        }

        session.set_pending(outcome.text.clone(), outcome.kind);
        self.sessions.save_session(writer, &session).await?;
        debug!(writer = %writer, stage = %stage, kind = ?outcome.kind, "question shown");
        Ok(Prompt::Question {
            stage,
            text: outcome.text,
            kind: outcome.kind,
            tip: None,
        })
    }

    /// Close the session's stage and advance the writer.
    async fn close_stage(
        &self,
        writer: &WriterId,
        session: &mut InterviewSession,
        progress: &mut WriterProgress,
        forced: bool,
    ) -> Result<Prompt, EngineError> {
        let stage = session.stage;
        session.mark_done();
        self.sessions.save_session(writer, session).await?;
        let next = progress.advance();
        self.sessions.save_progress(writer, progress).await?;
        info!(writer = %writer, stage = %stage, next = %next, forced, "stage closed");
        Ok(Prompt::stage_closed(stage, next, forced))
    }

    // ========================================================================
    // Bootstrap
    // ========================================================================

    /// First call for a writer: a bootstrap question or the next stage question.
    pub async fn start(&self, writer: &WriterId) -> Result<Prompt, EngineError> {
        let author = self.author(writer).await?;
        match author.bootstrap_state() {
            BootstrapState::AwaitingIdentity => Ok(Prompt::identity()),
            BootstrapState::AwaitingRelation => Ok(Prompt::relation()),
            BootstrapState::Ready => self.ask_next(writer).await,
        }
    }

    pub async fn answer_identity(
        &self,
        writer: &WriterId,
        choice: IdentityChoice,
    ) -> Result<Prompt, EngineError> {
        {
            let _guard = self.lock(writer).await;
            let mut author = self.author(writer).await?;
            author.apply_identity(choice);
            self.profiles.save_author(writer, &author).await?;
            info!(writer = %writer, ?choice, mode = ?author.mode, "identity answered");

            if author.bootstrap_state() == BootstrapState::AwaitingRelation {
                return Ok(Prompt::relation());
            }
        }
        self.ask_next(writer).await
    }

    /// Free-text identity answer; re-asks when it cannot be classified.
    pub async fn answer_identity_text(
        &self,
        writer: &WriterId,
        text: &str,
    ) -> Result<Prompt, EngineError> {
        match IdentityChoice::parse(text) {
            Some(choice) => self.answer_identity(writer, choice).await,
            None => Ok(Prompt::identity()),
        }
    }

    pub async fn answer_relation(
        &self,
        writer: &WriterId,
        relation: &str,
    ) -> Result<Prompt, EngineError> {
        {
            let _guard = self.lock(writer).await;
            let mut author = self.author(writer).await?;
            if author.mode != Some(AuthorMode::Other) {
                return Err(EngineError::RelationNotExpected);
            }
            if !author.set_relation(relation) {
                return Err(EngineError::InvalidRelation);
            }
            self.profiles.save_author(writer, &author).await?;
            info!(writer = %writer, relation = ?author.relation, "relation answered");
        }
        self.ask_next(writer).await
    }

    // ========================================================================
    // Interview flow
    // ========================================================================

    async fn prepare(&self, writer: &WriterId) -> Result<Step, EngineError> {
        let _guard = self.lock(writer).await;
        let mut snapshot = self.snapshot(writer).await?;
        let session = &mut snapshot.session;
        let stage = session.stage;

        if session.choice_pending {
            return Err(EngineError::ChoicePending { stage });
        }
        if let Some(pending) = &session.pending_question {
            return Ok(Step::Ready(Prompt::Question {
                stage,
                text: pending.text.clone(),
                kind: pending.kind,
                tip: None,
            }));
        }
        if session.closure_pending {
            return Ok(Step::Closure);
        }

        if session.turn_count() == 0 && session.last_asked.is_none() {
            let text = stage.kickoff_question(&snapshot.author);
            let tip = (!session.tip_shown).then(|| USAGE_TIP.to_string());
            session.tip_shown = true;
            session.set_pending(text.clone(), QuestionKind::Kickoff);
            self.sessions.save_session(writer, session).await?;
            info!(writer = %writer, stage = %stage, "stage started");
            return Ok(Step::Ready(Prompt::Question {
                stage,
                text,
                kind: QuestionKind::Kickoff,
                tip,
            }));
        }

        Ok(Step::Generate(snapshot))
    }

    /// The next question for the active stage.
    ///
    /// Re-shows a pending question instead of asking a new one.
    pub async fn ask_next(&self, writer: &WriterId) -> Result<Prompt, EngineError> {
        let snapshot = match self.prepare(writer).await? {
            Step::Ready(prompt) => return Ok(prompt),
            Step::Closure => return self.ask_closure(writer).await,
            Step::Generate(snapshot) => snapshot,
        };

        let ctx = self.context(writer, &snapshot);
        debug!(
            writer = %writer,
            stage = %ctx.stage,
            source = self.questions.name(),
            turns = ctx.turn_count,
            "requesting next question"
        );
        let outcome = self.questions.next_question(&ctx).await;
        let outcome = question::ensure_fresh(outcome, &ctx);
        self.commit(writer, &snapshot, outcome).await
    }

    /// Produce the single wrap-up question of the active stage.
    async fn ask_closure(&self, writer: &WriterId) -> Result<Prompt, EngineError> {
        let snapshot = {
            let _guard = self.lock(writer).await;
            let snapshot = self.snapshot(writer).await?;
            if let Some(pending) = &snapshot.session.pending_question {
                return Ok(Prompt::Question {
                    stage: snapshot.session.stage,
                    text: pending.text.clone(),
                    kind: pending.kind,
                    tip: None,
                });
            }
            snapshot
        };

        let anchor_config = &self.config.anchors;
        let answers = snapshot.session.recent_answers(anchor_config.recent_answers);
        let anchors = AnchorSet::extract(&answers, anchor_config.max_anchors);
        let ctx = self.context(writer, &snapshot);

        let candidate = self
            .questions
            .closure_candidate(&ctx, &anchors, anchor_config.closure_max_chars)
            .await;
        let closure = self.closure.resolve(
            candidate.as_deref(),
            snapshot.session.last_asked.as_deref(),
            &anchors,
            ctx.stage,
            &snapshot.author,
        );
        debug!(
            writer = %writer,
            stage = %ctx.stage,
            anchors = ?anchors.as_slice(),
            templated = closure.templated,
            "closure question ready"
        );
        self.commit(
            writer,
            &snapshot,
            QuestionOutcome::new(closure.text, QuestionKind::Closure),
        )
        .await
    }

    /// Record the writer's answer to the pending question and decide what follows.
    pub async fn answer(&self, writer: &WriterId, text: &str) -> Result<Prompt, EngineError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(EngineError::EmptyAnswer);
        }

        {
            let _guard = self.lock(writer).await;
            self.ready_author(writer).await?;
            let mut progress = self.progress(writer).await?;
            let mut session = self.session(writer, progress.active_stage).await?;
            let stage = session.stage;

            if session.done {
                return Err(EngineError::StageDone { stage });
            }
            if session.choice_pending {
                return Err(EngineError::ChoicePending { stage });
            }
            let Some(pending) = session.pending_question.take() else {
                return Err(EngineError::NoPendingQuestion { stage });
            };

            session.record_answer(pending.text, text);
            debug!(
                writer = %writer,
                stage = %stage,
                turns = session.turn_count(),
                chars = session.transcript_chars(),
                "answer recorded"
            );

            if pending.kind == QuestionKind::Closure {
                return self
                    .close_stage(writer, &mut session, &mut progress, false)
                    .await;
            }

            match session.phase(&self.config.limits) {
                StagePhase::AtHardLimit => {
                    return self
                        .close_stage(writer, &mut session, &mut progress, true)
                        .await;
                }
                StagePhase::AtSoftLimit => {
                    session.soft_limit_shown = true;
                    session.choice_pending = true;
                    self.sessions.save_session(writer, &session).await?;
                    info!(writer = %writer, stage = %stage, turns = session.turn_count(), "soft limit reached");
                    return Ok(Prompt::limit_offer(stage));
                }
                _ => self.sessions.save_session(writer, &session).await?,
            }
        }

        self.ask_next(writer).await
    }

    /// Apply the writer's continue-or-summarize choice.
    ///
    /// Summarize is also accepted before the soft limit, to wrap a stage up early.
    /// Continue is only valid while the offer is open.
    pub async fn choose(&self, writer: &WriterId, choice: LimitChoice) -> Result<Prompt, EngineError> {
        {
            let _guard = self.lock(writer).await;
            self.ready_author(writer).await?;
            let progress = self.progress(writer).await?;
            let mut session = self.session(writer, progress.active_stage).await?;
            if session.done {
                return Err(EngineError::StageDone {
                    stage: session.stage,
                });
            }
            if choice == LimitChoice::Continue && !session.choice_pending {
                return Err(EngineError::NoLimitOffer {
                    stage: session.stage,
                });
            }
            session.apply_choice(choice);
            if choice == LimitChoice::Summarize {
                session.discard_pending();
            }
            self.sessions.save_session(writer, &session).await?;
            info!(writer = %writer, stage = %session.stage, ?choice, "limit choice applied");
        }

        match choice {
            LimitChoice::Continue => self.ask_next(writer).await,
            LimitChoice::Summarize => self.ask_closure(writer).await,
        }
    }

    /// Free-text form of [`Self::choose`].
    pub async fn choose_text(&self, writer: &WriterId, text: &str) -> Result<Prompt, EngineError> {
        match LimitChoice::classify(text) {
            Some(choice) => self.choose(writer, choice).await,
            None => Err(EngineError::UnclearChoice),
        }
    }

    /// Discard the pending question without recording a turn.
    ///
    /// Skipping the wrap-up question closes the stage.
    pub async fn skip(&self, writer: &WriterId) -> Result<Prompt, EngineError> {
        {
            let _guard = self.lock(writer).await;
            self.ready_author(writer).await?;
            let mut progress = self.progress(writer).await?;
            let mut session = self.session(writer, progress.active_stage).await?;
            let stage = session.stage;
            if session.done {
                return Err(EngineError::StageDone { stage });
            }
            if session.choice_pending {
                return Err(EngineError::ChoicePending { stage });
            }
            let Some(pending) = session.discard_pending() else {
                return Err(EngineError::NoPendingQuestion { stage });
            };
            if pending.kind == QuestionKind::Closure {
                return self
                    .close_stage(writer, &mut session, &mut progress, false)
                    .await;
            }
            self.sessions.save_session(writer, &session).await?;
            debug!(writer = %writer, stage = %stage, "question skipped");
        }
        self.ask_next(writer).await
    }

    /// Make `stage` the active stage. In-flight results for the old stage are dropped.
    pub async fn switch_stage(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<WriterProgress, EngineError> {
        let _guard = self.lock(writer).await;
        let mut progress = self.progress(writer).await?;
        progress.move_to(stage);
        self.sessions.save_progress(writer, &progress).await?;
        info!(writer = %writer, stage = %stage, epoch = progress.epoch, "switched stage");
        Ok(progress)
    }

    /// Reopen a finished stage and make it active. Recorded turns are kept.
    pub async fn reopen_stage(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<WriterProgress, EngineError> {
        let _guard = self.lock(writer).await;
        let mut session = self.session(writer, stage).await?;
        session.reopen();
        self.sessions.save_session(writer, &session).await?;
        let mut progress = self.progress(writer).await?;
        progress.move_to(stage);
        self.sessions.save_progress(writer, &progress).await?;
        info!(writer = %writer, stage = %stage, turns = session.turn_count(), "stage reopened");
        Ok(progress)
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Replace the themes for a stage.
    pub async fn set_themes<I, S>(
        &self,
        writer: &WriterId,
        stage: LifeStage,
        themes: I,
    ) -> Result<(), EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let _guard = self.lock(writer).await;
        let mut session = self.session(writer, stage).await?;
        session.themes = themes
            .into_iter()
            .map(|theme| theme.as_ref().trim().to_string())
            .filter(|theme| !theme.is_empty())
            .collect();
        self.sessions.save_session(writer, &session).await?;
        Ok(())
    }

    pub async fn update_subject(
        &self,
        writer: &WriterId,
        subject: SubjectProfile,
    ) -> Result<(), EngineError> {
        let _guard = self.lock(writer).await;
        let mut author = self.author(writer).await?;
        author.subject = subject;
        self.profiles.save_author(writer, &author).await?;
        Ok(())
    }

    pub async fn set_style(&self, writer: &WriterId, style: StyleProfile) -> Result<(), EngineError> {
        self.profiles.save_style(writer, &style).await?;
        Ok(())
    }

    // ========================================================================
    // Drafts
    // ========================================================================

    fn synthesizer(&self) -> Result<&Synthesizer, EngineError> {
        self.synthesizer.as_ref().ok_or(EngineError::Unavailable)
    }

    /// Run both synthesis stages and store the draft.
    ///
    /// On any failure nothing is overwritten.
    pub async fn synthesize(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<NarrativeDraft, EngineError> {
        let synthesizer = self.synthesizer()?;
        let (session, author, style) = {
            let _guard = self.lock(writer).await;
            (
                self.session(writer, stage).await?,
                self.author(writer).await?,
                self.style(writer).await?,
            )
        };
        let notes = self.notes.notes_for_stage(writer, stage).await?;

        let draft = synthesizer
            .synthesize(writer, &session, &notes, &author, &style)
            .await?;

        let _guard = self.lock(writer).await;
        let mut current = self.session(writer, stage).await?;
        if current.revision != session.revision {
            debug!(writer = %writer, stage = %stage, "discarding stale draft");
            return Err(EngineError::Superseded { stage });
        }
        current.draft = Some(draft.clone());
        self.sessions.save_session(writer, &current).await?;
        Ok(draft)
    }

    /// Polish the stage draft in place. The guard may keep the original.
    pub async fn polish(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<PolishOutcome, EngineError> {
        let synthesizer = self.synthesizer()?;
        let (original, author) = {
            let _guard = self.lock(writer).await;
            let session = self.session(writer, stage).await?;
            let draft = session.draft.ok_or(EngineError::NoDraft { stage })?;
            (draft.text, self.author(writer).await?)
        };

        let outcome = synthesizer.polish(writer, &original, &author).await?;
        if !outcome.applied {
            return Ok(outcome);
        }

        let _guard = self.lock(writer).await;
        let mut session = self.session(writer, stage).await?;
        match session.draft.as_mut() {
            Some(draft) if draft.text == original => {
                draft.text = outcome.text.clone();
                self.sessions.save_session(writer, &session).await?;
                Ok(outcome)
            }
            _ => Err(EngineError::Superseded { stage }),
        }
    }

    /// Replace the editable text of a stage by hand.
    pub async fn edit_draft(
        &self,
        writer: &WriterId,
        stage: LifeStage,
        text: &str,
    ) -> Result<NarrativeDraft, EngineError> {
        let _guard = self.lock(writer).await;
        let mut session = self.session(writer, stage).await?;
        let draft = session.draft.get_or_insert_with(|| NarrativeDraft {
            stage,
            text: String::new(),
            facts: FactList::default(),
            edited: false,
        });
        draft.text = text.trim().to_string();
        draft.edited = true;
        let draft = draft.clone();
        self.sessions.save_session(writer, &session).await?;
        Ok(draft)
    }

    pub async fn overview(&self, writer: &WriterId) -> Result<Vec<StageOverview>, EngineError> {
        let progress = self.progress(writer).await?;
        let sessions = self.sessions.list_sessions(writer).await?;
        Ok(LifeStage::ALL
            .into_iter()
            .map(|stage| {
                let session = sessions.iter().find(|s| s.stage == stage);
                StageOverview {
                    stage,
                    turns: session.map_or(0, InterviewSession::turn_count),
                    chars: session.map_or(0, InterviewSession::transcript_chars),
                    done: session.is_some_and(|s| s.done),
                    has_draft: session.is_some_and(|s| s.draft.is_some()),
                    active: stage == progress.active_stage,
                }
            })
            .collect())
    }

    /// All stage drafts in stage order, under stage headings.
    pub async fn compile_memoir(&self, writer: &WriterId) -> Result<String, EngineError> {
        let author = self.author(writer).await?;
        let mut sessions = self.sessions.list_sessions(writer).await?;
        sessions.sort_by_key(|s| s.stage);

        let mut memoir = String::new();
        if let Some(name) = author.subject.name.as_deref().filter(|n| !n.trim().is_empty()) {
            memoir.push_str(&format!("# {}\n\n", name.trim()));
        }
        for session in &sessions {
            let Some(draft) = &session.draft else {
                continue;
            };
            if draft.text.trim().is_empty() {
                continue;
            }
            memoir.push_str(&format!("## {}\n\n{}\n\n", session.stage.label(), draft.text.trim()));
        }
        Ok(memoir.trim_end().to_string())
    }

    // ========================================================================
    // Archives
    // ========================================================================

    /// Snapshot everything stored for a writer.
    pub async fn archive(&self, writer: &WriterId) -> Result<WriterArchive, EngineError> {
        let _guard = self.lock(writer).await;
        Ok(WriterArchive::new(
            writer.clone(),
            self.progress(writer).await?,
            self.author(writer).await?,
            self.style(writer).await?,
            self.sessions.list_sessions(writer).await?,
        ))
    }

    /// Write an archive back into the stores.
    pub async fn restore(&self, archive: &WriterArchive) -> Result<(), EngineError> {
        let writer = &archive.writer;
        let _guard = self.lock(writer).await;
        self.profiles.save_author(writer, &archive.author).await?;
        self.profiles.save_style(writer, &archive.style).await?;
        for session in &archive.sessions {
            self.sessions.save_session(writer, session).await?;
        }
        let mut progress = archive.progress.clone();
        // Anything in flight from before the restore is stale.
        progress.epoch += 1;
        self.sessions.save_progress(writer, &progress).await?;
        info!(writer = %writer, sessions = archive.sessions.len(), "archive restored");
        Ok(())
    }
}
