//! Minimal Anthropic Claude API client.
//!
//! One call, [`Claude::complete`]: send a system prompt plus an alternating
//! user/assistant conversation, get the reply text back. Errors carry the
//! HTTP status class so callers can retry rate limits and fail fast on the
//! rest.

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when using the Claude client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Classify a non-success HTTP reply.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Error::Unauthorized(body),
            403 => Error::Forbidden(body),
            429 => Error::RateLimited(body),
            _ => Error::Api {
                status,
                message: body,
            },
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// Claude API client. Cheap to clone.
#[derive(Clone)]
pub struct Claude {
    http: reqwest::Client,
    headers: HeaderMap,
    model: String,
}

impl Claude {
    /// Create a client for `api_key`. Fails if the key is not a valid header value.
    pub fn new(api_key: impl AsRef<str>) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let mut key = HeaderValue::from_str(api_key.as_ref().trim())
            .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?;
        key.set_sensitive(true);
        headers.insert("x-api-key", key);

        Ok(Self {
            http: http_client(&headers, DEFAULT_TIMEOUT)?,
            headers,
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Create a client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Self::new(key),
            _ => Err(Error::NoApiKey),
        }
    }

    /// Model used when a request does not name one.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Total time allowed for one request.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, Error> {
        self.http = http_client(&self.headers, timeout)?;
        Ok(self)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one completion request.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        let body = WireRequest {
            model: request.model.as_deref().unwrap_or(&self.model),
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
            temperature: request.temperature,
        };

        let reply = self.http.post(MESSAGES_URL).json(&body).send().await?;
        let status = reply.status();
        let text = reply.text().await?;
        if !status.is_success() {
            return Err(Error::from_status(status.as_u16(), text));
        }

        let wire: WireResponse =
            serde_json::from_str(&text).map_err(|e| Error::Parse(e.to_string()))?;
        Ok(wire.into())
    }
}

fn http_client(headers: &HeaderMap, timeout: Duration) -> Result<reqwest::Client, Error> {
    reqwest::Client::builder()
        .default_headers(headers.clone())
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| Error::Config(format!("HTTP client: {e}")))
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
}

impl Request {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 1024,
            system: None,
            messages,
            temperature: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Clamped to the API's 0.0..=1.0 range.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }
}

/// One conversation message. Serializes in the wire format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// The reply to a completion request.
#[derive(Debug, Clone)]
pub struct Response {
    pub id: String,
    pub model: String,
    /// All text blocks, concatenated.
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    #[default]
    EndTurn,
    MaxTokens,
    StopSequence,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Deserialize)]
struct WireResponse {
    id: String,
    model: String,
    content: Vec<WireBlock>,
    #[serde(default)]
    stop_reason: Option<StopReason>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        let text = wire
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireBlock::Text { text } => Some(text),
                WireBlock::Other => None,
            })
            .collect();

        Response {
            id: wire.id,
            model: wire.model,
            text,
            stop_reason: wire.stop_reason.unwrap_or_default(),
            usage: wire.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_model() {
        let client = Claude::new("test-key").unwrap();
        assert_eq!(client.model(), DEFAULT_MODEL);
        let client = client.with_model("claude-3-5-haiku-20241022");
        assert_eq!(client.model(), "claude-3-5-haiku-20241022");
    }

    #[test]
    fn test_invalid_key_is_config_error() {
        assert!(matches!(Claude::new("bad\nkey"), Err(Error::Config(_))));
    }

    #[test]
    fn test_request_builder() {
        let request = Request::new(vec![Message::user("Hello")])
            .with_system("You are a patient interviewer")
            .with_max_tokens(300)
            .with_temperature(1.7);

        assert_eq!(request.max_tokens, 300);
        assert!(request.system.is_some());
        assert_eq!(request.temperature, Some(1.0));
    }

    #[test]
    fn test_wire_request_shape() {
        let messages = vec![Message::user("Hi"), Message::assistant("Where were you born?")];
        let wire = WireRequest {
            model: "m",
            max_tokens: 10,
            system: None,
            messages: &messages,
            temperature: Some(0.5),
        };
        let json = serde_json::to_value(&wire).unwrap();
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert!(json.get("system").is_none());
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            Error::from_status(429, "slow down".into()),
            Error::RateLimited(_)
        ));
        assert!(matches!(
            Error::from_status(403, "nope".into()),
            Error::Forbidden(_)
        ));
        assert!(matches!(
            Error::from_status(401, "bad key".into()),
            Error::Unauthorized(_)
        ));
        assert!(matches!(
            Error::from_status(529, "overloaded".into()),
            Error::Api { status: 529, .. }
        ));
    }

    #[test]
    fn test_response_joins_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "model": "claude-sonnet-4-20250514",
            "content": [
                {"type": "text", "text": "Where did you "},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "grow up?"}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }"#;
        let wire: WireResponse = serde_json::from_str(raw).unwrap();
        let response = Response::from(wire);
        assert_eq!(response.text, "Where did you grow up?");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.output_tokens, 5);
    }
}
