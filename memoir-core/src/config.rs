//! Engine configuration.
//!
//! Every threshold the interview relies on lives here rather than in the
//! state machine, so deployments can tune them without code changes.
//! Configs deserialize from partial JSON; missing fields take defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Soft and hard content limits for one stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewLimits {
    /// Answered questions before the continue-or-summarize offer.
    pub soft_turns: usize,
    /// Transcript characters before the continue-or-summarize offer.
    pub soft_chars: usize,
    /// Transcript characters at which the stage is closed regardless.
    pub hard_chars: usize,
}

impl Default for InterviewLimits {
    fn default() -> Self {
        Self {
            soft_turns: 8,
            soft_chars: 8000,
            hard_chars: 9000,
        }
    }
}

/// Pacing and retry policy for generation calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Minimum spacing between calls for one writer.
    pub min_spacing_ms: u64,
    /// Total attempts for transient failures, first call included.
    pub max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_spacing_ms: 3200,
            max_attempts: 5,
            base_backoff_ms: 1000,
            max_backoff_ms: 30_000,
        }
    }
}

impl ThrottleConfig {
    pub fn min_spacing(&self) -> Duration {
        Duration::from_millis(self.min_spacing_ms)
    }

    /// No spacing and no backoff; for tests and offline tools.
    pub fn immediate() -> Self {
        Self {
            min_spacing_ms: 0,
            max_attempts: 5,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

/// Model selection and sampling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Model override; the client default is used when unset.
    pub model: Option<String>,
    pub question_max_tokens: usize,
    pub question_temperature: f32,
    pub extraction_max_tokens: usize,
    pub extraction_temperature: f32,
    pub narrative_temperature: f32,
    pub polish_temperature: f32,
    /// Upper bound for a single generation call.
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            question_max_tokens: 300,
            question_temperature: 0.7,
            extraction_max_tokens: 1500,
            extraction_temperature: 0.0,
            narrative_temperature: 0.6,
            polish_temperature: 0.2,
            timeout_secs: 60,
        }
    }
}

impl GenerationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Where questions come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionMode {
    /// Model-generated follow-up questions.
    #[default]
    Generated,
    /// The canned bank of ten prompts per stage, no model calls.
    FixedPool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionConfig {
    pub mode: QuestionMode,
    /// Number of recent turns shown to the model.
    pub history_window: usize,
    /// Longest question shown to the writer.
    pub max_question_chars: usize,
}

impl Default for QuestionConfig {
    fn default() -> Self {
        Self {
            mode: QuestionMode::Generated,
            history_window: 5,
            max_question_chars: 160,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnchorConfig {
    pub max_anchors: usize,
    /// How many of the latest answers anchors are drawn from.
    pub recent_answers: usize,
    /// Longest closure question accepted from the model.
    pub closure_max_chars: usize,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            max_anchors: 6,
            recent_answers: 3,
            closure_max_chars: 50,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub limits: InterviewLimits,
    pub throttle: ThrottleConfig,
    pub generation: GenerationConfig,
    pub questions: QuestionConfig,
    pub anchors: AnchorConfig,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from JSON and validate.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a JSON file and validate.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.soft_turns == 0 {
            return Err(ConfigError::Invalid("limits.soft_turns must be at least 1".into()));
        }
        if self.limits.hard_chars <= self.limits.soft_chars {
            return Err(ConfigError::Invalid(format!(
                "limits.hard_chars ({}) must exceed limits.soft_chars ({})",
                self.limits.hard_chars, self.limits.soft_chars
            )));
        }
        if self.throttle.max_attempts == 0 {
            return Err(ConfigError::Invalid("throttle.max_attempts must be at least 1".into()));
        }
        if self.questions.max_question_chars < 20 {
            return Err(ConfigError::Invalid(
                "questions.max_question_chars must be at least 20".into(),
            ));
        }
        if self.anchors.max_anchors == 0 || self.anchors.recent_answers == 0 {
            return Err(ConfigError::Invalid(
                "anchors.max_anchors and anchors.recent_answers must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_limits(mut self, limits: InterviewLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_throttle(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.generation.model = Some(model.into());
        self
    }

    pub fn with_question_mode(mut self, mode: QuestionMode) -> Self {
        self.questions.mode = mode;
        self
    }

    pub fn with_history_window(mut self, turns: usize) -> Self {
        self.questions.history_window = turns;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.generation.timeout_secs = timeout.as_secs().max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.limits.soft_turns, 8);
        assert_eq!(config.limits.soft_chars, 8000);
        assert_eq!(config.limits.hard_chars, 9000);
        assert_eq!(config.throttle.min_spacing(), Duration::from_millis(3200));
        assert_eq!(config.throttle.max_attempts, 5);
        assert_eq!(config.questions.history_window, 5);
        assert_eq!(config.anchors.max_anchors, 6);
        assert_eq!(config.anchors.closure_max_chars, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = EngineConfig::from_json(
            r#"{"limits": {"soft_turns": 4}, "questions": {"mode": "fixed_pool"}}"#,
        )
        .unwrap();
        assert_eq!(config.limits.soft_turns, 4);
        assert_eq!(config.limits.hard_chars, 9000);
        assert_eq!(config.questions.mode, QuestionMode::FixedPool);
    }

    #[test]
    fn test_rejects_inverted_limits() {
        let err = EngineConfig::from_json(r#"{"limits": {"soft_chars": 9500}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        tokio::fs::write(&path, r#"{"throttle": {"min_spacing_ms": 500}}"#)
            .await
            .unwrap();
        let config = EngineConfig::load(&path).await.unwrap();
        assert_eq!(config.throttle.min_spacing_ms, 500);
    }
}
