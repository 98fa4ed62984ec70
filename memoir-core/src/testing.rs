//! Testing utilities for the interview engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedGenerator` for deterministic generation without API calls
//! - `InterviewHarness` for scripted interview scenarios

use crate::author::{AuthorContext, IdentityChoice};
use crate::config::{EngineConfig, ThrottleConfig};
use crate::engine::{EngineError, InterviewEngine, Prompt};
use crate::generation::{GenerationError, GenerationRequest, TextGenerator};
use crate::interview::InterviewSession;
use crate::store::{MemoryStore, WriterId};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// A generator that returns scripted replies in order.
///
/// Every request is recorded. When the script runs out the generator
/// returns the default reply if one is set, and a malformed-response error
/// otherwise.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<String, GenerationError>>>,
    default_reply: Mutex<Option<String>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let generator = Self::new();
        for reply in replies {
            generator.push_reply(reply);
        }
        generator
    }

    /// Reply used once the script is exhausted.
    pub fn with_default_reply(self, reply: impl Into<String>) -> Self {
        *self.default_reply.lock().unwrap_or_else(|e| e.into_inner()) = Some(reply.into());
        self
    }

    pub fn push_reply(&self, reply: impl Into<String>) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Ok(reply.into()));
    }

    pub fn push_error(&self, error: GenerationError) {
        self.replies
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(Err(error));
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self.replies.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(reply) => reply,
            None => self
                .default_reply
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .clone()
                .ok_or_else(|| GenerationError::Malformed("no scripted reply".into())),
        }
    }
}

/// Drives one writer through an engine backed by a [`MemoryStore`] and a
/// [`ScriptedGenerator`], with throttling disabled.
pub struct InterviewHarness {
    pub engine: InterviewEngine,
    pub generator: Arc<ScriptedGenerator>,
    pub store: Arc<MemoryStore>,
    pub writer: WriterId,
}

impl InterviewHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Use `config`, with the throttle replaced by an immediate one.
    pub fn with_config(config: EngineConfig) -> Self {
        let config = config.with_throttle(ThrottleConfig::immediate());
        let generator = Arc::new(ScriptedGenerator::new());
        let store = Arc::new(MemoryStore::new());
        let engine = InterviewEngine::new(config, generator.clone(), store.clone());
        Self {
            engine,
            generator,
            store,
            writer: WriterId::new("test-writer"),
        }
    }

    /// Answer the identity question with "myself".
    pub async fn bootstrap_self(&self) -> Result<Prompt, EngineError> {
        self.engine.start(&self.writer).await?;
        self.engine
            .answer_identity(&self.writer, IdentityChoice::Myself)
            .await
    }

    /// Answer the identity question with "someone else" and give the relation.
    pub async fn bootstrap_other(&self, relation: &str) -> Result<Prompt, EngineError> {
        self.engine.start(&self.writer).await?;
        self.engine
            .answer_identity(&self.writer, IdentityChoice::SomeoneElse)
            .await?;
        self.engine.answer_relation(&self.writer, relation).await
    }

    pub async fn answer(&self, text: &str) -> Result<Prompt, EngineError> {
        self.engine.answer(&self.writer, text).await
    }

    pub async fn session(&self) -> Result<InterviewSession, EngineError> {
        let progress = self.engine.progress(&self.writer).await?;
        self.engine.session(&self.writer, progress.active_stage).await
    }

    pub async fn author(&self) -> Result<AuthorContext, EngineError> {
        self.engine.author(&self.writer).await
    }
}

impl Default for InterviewHarness {
    fn default() -> Self {
        Self::new()
    }
}
