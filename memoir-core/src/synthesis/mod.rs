//! Two-stage narrative synthesis.
//!
//! Stage 1 extracts an atomic [`FactList`] from a stage transcript. Stage 2
//! rewrites those facts as one first-person paragraph under the writer's
//! [`StyleProfile`]. Splitting the passes keeps the rewrite from inventing
//! material: it only ever sees the fact list.

pub mod coverage;
pub mod facts;
pub mod narrative;
pub mod polish;

pub use coverage::CoverageReport;
pub use facts::{FactList, FactSheet};
pub use polish::{PolishOutcome, PolishRejection};

use crate::author::AuthorContext;
use crate::config::GenerationConfig;
use crate::generation::{GenerationError, GenerationRequest};
use crate::interview::InterviewSession;
use crate::stage::LifeStage;
use crate::store::WriterId;
use crate::style::StyleProfile;
use crate::throttle::ThrottledGenerator;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// The editable narrative for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeDraft {
    pub stage: LifeStage,
    pub text: String,
    /// The facts the text was written from.
    pub facts: FactList,
    /// The writer changed the text by hand.
    #[serde(default)]
    pub edited: bool,
}

#[derive(Debug, Error)]
pub enum SynthesisError {
    #[error("no facts could be extracted for {stage}")]
    ExtractionEmpty { stage: LifeStage },

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),
}

/// Runs extraction, rewrite and polish through the throttled generator.
#[derive(Clone)]
pub struct Synthesizer {
    generator: ThrottledGenerator,
    config: GenerationConfig,
}

impl Synthesizer {
    pub fn new(generator: ThrottledGenerator, config: GenerationConfig) -> Self {
        Self { generator, config }
    }

    /// Stage 1. An empty transcript fails without calling the model.
    pub async fn extract_facts(
        &self,
        writer: &WriterId,
        session: &InterviewSession,
        notes: &[String],
        author: &AuthorContext,
        style: &StyleProfile,
    ) -> Result<FactList, SynthesisError> {
        let stage = session.stage;
        if session.section_text().trim().is_empty() {
            return Err(SynthesisError::ExtractionEmpty { stage });
        }

        let request = GenerationRequest::new(facts::extraction_messages(
            session.section_text(),
            notes,
            author,
            style.strictness,
        ))
        .with_max_tokens(self.config.extraction_max_tokens)
        .with_temperature(self.config.extraction_temperature);

        let raw = self.generator.generate(writer, request).await?;
        let facts = facts::parse_fact_reply(&raw);
        if facts.is_empty() {
            warn!(writer = %writer, stage = %stage, "extraction returned no facts");
            return Err(SynthesisError::ExtractionEmpty { stage });
        }
        debug!(writer = %writer, stage = %stage, facts = facts.len(), "facts extracted");
        Ok(facts)
    }

    /// Stage 2.
    pub async fn write_narrative(
        &self,
        writer: &WriterId,
        stage: LifeStage,
        facts: &FactList,
        themes: &BTreeSet<String>,
        author: &AuthorContext,
        style: &StyleProfile,
    ) -> Result<String, SynthesisError> {
        let request = GenerationRequest::new(narrative::narrative_messages(
            stage, facts, themes, author, style,
        ))
        .with_max_tokens(style.length.max_tokens())
        .with_temperature(self.config.narrative_temperature);

        let raw = self.generator.generate(writer, request).await?;
        Ok(narrative::finalize_narrative(&raw, author, style))
    }

    /// Both stages, with the coverage check logged.
    pub async fn synthesize(
        &self,
        writer: &WriterId,
        session: &InterviewSession,
        notes: &[String],
        author: &AuthorContext,
        style: &StyleProfile,
    ) -> Result<NarrativeDraft, SynthesisError> {
        let facts = self
            .extract_facts(writer, session, notes, author, style)
            .await?;
        let text = self
            .write_narrative(writer, session.stage, &facts, &session.themes, author, style)
            .await?;

        let report = CoverageReport::measure(&text, &facts);
        if report.within_tolerance() {
            info!(
                writer = %writer,
                stage = %session.stage,
                chars = text.chars().count(),
                coverage = report.ratio(),
                "narrative drafted"
            );
        } else {
            warn!(
                writer = %writer,
                stage = %session.stage,
                coverage = report.ratio(),
                ungrounded = ?report.ungrounded,
                "narrative drifts from the extracted facts"
            );
        }

        Ok(NarrativeDraft {
            stage: session.stage,
            text,
            facts,
            edited: false,
        })
    }

    /// Polish `text`, keeping the original when the guard objects.
    pub async fn polish(
        &self,
        writer: &WriterId,
        text: &str,
        author: &AuthorContext,
    ) -> Result<PolishOutcome, SynthesisError> {
        let request = GenerationRequest::new(polish::polish_messages(text, author))
            .with_max_tokens(self.config.extraction_max_tokens)
            .with_temperature(self.config.polish_temperature);

        let polished = self.generator.generate(writer, request).await?;
        let polished = polished.trim();
        match polish::guard(text, polished) {
            Ok(()) => Ok(PolishOutcome {
                text: polished.to_string(),
                applied: true,
            }),
            Err(reason) => {
                warn!(writer = %writer, ?reason, "polish rejected, keeping original");
                Ok(PolishOutcome {
                    text: text.to_string(),
                    applied: false,
                })
            }
        }
    }
}
