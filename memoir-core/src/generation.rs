//! The text-generation seam.
//!
//! Everything in the engine that talks to a model goes through
//! [`TextGenerator`]. The production implementation wraps the Claude
//! client; tests use [`crate::testing::ScriptedGenerator`].

use async_trait::async_trait;
use claude::{Claude, Message, Request};
use std::time::Duration;
use thiserror::Error;

/// Failures from a generation call.
///
/// Rate-limited and forbidden replies are transient and retried by the
/// throttle; everything else is hard and goes straight to fallback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("generation timed out")]
    Timeout,

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("service error (status {status}): {message}")]
    Service { status: u16, message: String },

    #[error("no generator configured")]
    Unavailable,
}

impl GenerationError {
    /// Whether the throttle should retry this failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited(_) | GenerationError::Forbidden(_)
        )
    }
}

impl From<claude::Error> for GenerationError {
    fn from(err: claude::Error) -> Self {
        match err {
            claude::Error::RateLimited(body) => GenerationError::RateLimited(body),
            claude::Error::Forbidden(body) => GenerationError::Forbidden(body),
            claude::Error::Unauthorized(body) => GenerationError::Unauthorized(body),
            claude::Error::NoApiKey => GenerationError::Unauthorized("API key not configured".into()),
            claude::Error::Config(msg) => GenerationError::Unauthorized(msg),
            claude::Error::Timeout => GenerationError::Timeout,
            claude::Error::Network(msg) => GenerationError::Network(msg),
            claude::Error::Api { status, message } => GenerationError::Service { status, message },
            claude::Error::Parse(msg) => GenerationError::Malformed(msg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

/// One call to the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl GenerationRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            max_tokens: 512,
            temperature: 0.7,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Concatenated system instructions.
    pub fn system_prompt(&self) -> Option<String> {
        let parts: Vec<&str> = self
            .messages
            .iter()
            .filter(|m| m.role == ChatRole::System)
            .map(|m| m.content.as_str())
            .collect();
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    /// The last user message, if any.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == ChatRole::User)
            .map(|m| m.content.as_str())
    }
}

/// A source of model text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError>;
}

/// [`TextGenerator`] backed by the Claude Messages API.
#[derive(Clone)]
pub struct ClaudeGenerator {
    client: Claude,
    model: Option<String>,
    timeout: Duration,
}

impl ClaudeGenerator {
    pub fn new(client: Claude) -> Self {
        Self {
            client,
            model: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Create from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, GenerationError> {
        Ok(Self::new(Claude::from_env()?))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_request(&self, request: &GenerationRequest) -> Request {
        let mut messages: Vec<Message> = Vec::new();
        for message in &request.messages {
            let next = match message.role {
                ChatRole::System => continue,
                ChatRole::User => Message::user(&message.content),
                ChatRole::Assistant => Message::assistant(&message.content),
            };
            // The API wants alternating roles starting with the user.
            match messages.last_mut() {
                Some(last) if last.role == next.role => {
                    last.content.push_str("\n\n");
                    last.content.push_str(&next.content);
                }
                None if next.role == claude::Role::Assistant => {
                    messages.push(Message::user("(The interview begins.)"));
                    messages.push(next);
                }
                _ => messages.push(next),
            }
        }

        let mut api_request = Request::new(messages)
            .with_max_tokens(request.max_tokens)
            .with_temperature(request.temperature);
        if let Some(system) = request.system_prompt() {
            api_request = api_request.with_system(system);
        }
        if let Some(ref model) = self.model {
            api_request = api_request.with_model(model);
        }
        api_request
    }
}

#[async_trait]
impl TextGenerator for ClaudeGenerator {
    async fn generate(&self, request: GenerationRequest) -> Result<String, GenerationError> {
        let api_request = self.build_request(&request);
        let response = tokio::time::timeout(self.timeout, self.client.complete(api_request))
            .await
            .map_err(|_| GenerationError::Timeout)??;

        let text = response.text.trim();
        if text.is_empty() {
            return Err(GenerationError::Malformed("empty reply".into()));
        }
        Ok(text.to_string())
    }
}
