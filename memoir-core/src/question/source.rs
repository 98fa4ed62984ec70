use super::{bank, postprocess, prompt, QuestionContext, QuestionKind, QuestionOutcome};
use crate::anchor::AnchorSet;
use crate::config::GenerationConfig;
use crate::generation::{ChatMessage, GenerationRequest};
use crate::text::has_question_mark;
use crate::throttle::ThrottledGenerator;
use async_trait::async_trait;
use tracing::{debug, warn};

/// Produces the next question for a stage.
///
/// `next_question` never fails: every error path resolves to a local
/// fallback question.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    fn name(&self) -> &'static str;

    async fn next_question(&self, ctx: &QuestionContext<'_>) -> QuestionOutcome;

    /// A candidate wrap-up question; `None` means use the template.
    async fn closure_candidate(
        &self,
        ctx: &QuestionContext<'_>,
        anchors: &AnchorSet,
        max_chars: usize,
    ) -> Option<String>;
}

/// Questions written by the model.
pub struct GeneratedQuestionSource {
    generator: ThrottledGenerator,
    config: GenerationConfig,
}

impl GeneratedQuestionSource {
    pub fn new(generator: ThrottledGenerator, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    fn request(&self, messages: Vec<ChatMessage>) -> GenerationRequest {
        GenerationRequest::new(messages)
            .with_max_tokens(self.config.question_max_tokens)
            .with_temperature(self.config.question_temperature)
    }
}

#[async_trait]
impl QuestionSource for GeneratedQuestionSource {
    fn name(&self) -> &'static str {
        "generated"
    }

    async fn next_question(&self, ctx: &QuestionContext<'_>) -> QuestionOutcome {
        let request = self.request(prompt::question_messages(ctx));
        let mut raw = match self.generator.generate(ctx.writer, request).await {
            Ok(raw) => raw,
            Err(err) => {
                warn!(writer = %ctx.writer, stage = %ctx.stage, error = %err, "question generation failed, using fallback");
                return QuestionOutcome::fallback(ctx.stage, ctx.author);
            }
        };

        if !has_question_mark(&raw) {
            debug!(stage = %ctx.stage, "reply had no question mark, asking again");
            let request = self.request(prompt::follow_up_messages(ctx, &raw));
            match self.generator.generate(ctx.writer, request).await {
                Ok(follow_up) => {
                    raw.push(' ');
                    raw.push_str(&follow_up);
                }
                Err(err) => {
                    warn!(writer = %ctx.writer, stage = %ctx.stage, error = %err, "follow-up request failed, using fallback");
                    return QuestionOutcome::fallback(ctx.stage, ctx.author);
                }
            }
        }

        match postprocess::finalize_question(&raw, ctx.author, ctx.max_question_chars) {
            Some(text) => QuestionOutcome::new(text, QuestionKind::Generated),
            None => {
                warn!(stage = %ctx.stage, "generated question was unusable, using fallback");
                QuestionOutcome::fallback(ctx.stage, ctx.author)
            }
        }
    }

    async fn closure_candidate(
        &self,
        ctx: &QuestionContext<'_>,
        anchors: &AnchorSet,
        max_chars: usize,
    ) -> Option<String> {
        let request = self.request(prompt::closure_messages(ctx, anchors, max_chars));
        match self.generator.generate(ctx.writer, request).await {
            Ok(raw) => postprocess::finalize_question(&raw, ctx.author, ctx.max_question_chars),
            Err(err) => {
                warn!(writer = %ctx.writer, stage = %ctx.stage, error = %err, "closure generation failed, using template");
                None
            }
        }
    }
}

/// The canned bank, rotated by the session's pool cursor. Makes no model calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPoolQuestionSource;

impl FixedPoolQuestionSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl QuestionSource for FixedPoolQuestionSource {
    fn name(&self) -> &'static str {
        "fixed_pool"
    }

    async fn next_question(&self, ctx: &QuestionContext<'_>) -> QuestionOutcome {
        QuestionOutcome::new(
            bank::question(ctx.stage, ctx.pool_cursor, ctx.author),
            QuestionKind::Canned,
        )
    }

    async fn closure_candidate(
        &self,
        _ctx: &QuestionContext<'_>,
        _anchors: &AnchorSet,
        _max_chars: usize,
    ) -> Option<String> {
        None
    }
}
