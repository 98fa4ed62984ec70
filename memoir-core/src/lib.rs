//! Guided life-story interviews with two-stage narrative synthesis.
//!
//! This crate provides:
//! - A stage-by-stage interview state machine with soft and hard limits
//! - Question generation, either model-driven or from a canned bank
//! - Anchor-grounded closure questions
//! - Fact extraction followed by a first-person narrative rewrite
//! - Writer archives for save and restore
//!
//! # Quick Start
//!
//! ```ignore
//! use memoir_core::{ClaudeGenerator, EngineConfig, InterviewEngine, MemoryStore, WriterId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = Arc::new(ClaudeGenerator::from_env()?);
//!     let engine = InterviewEngine::new(EngineConfig::default(), generator, Arc::new(MemoryStore::new()));
//!
//!     let writer = WriterId::generate();
//!     let prompt = engine.start(&writer).await?;
//!     println!("{}", prompt.text().unwrap_or_default());
//!     Ok(())
//! }
//! ```

pub mod anchor;
pub mod author;
pub mod config;
pub mod engine;
pub mod generation;
pub mod interview;
pub mod persist;
pub mod question;
pub mod stage;
pub mod store;
pub mod style;
pub mod synthesis;
pub mod testing;
pub mod text;
pub mod throttle;

// Re-export for convenience
pub use memoir_macros::StructuredOutput;

// Primary public API
pub use author::{AuthorContext, AuthorMode, IdentityChoice, SubjectProfile};
pub use config::{ConfigError, EngineConfig, QuestionMode};
pub use engine::{EngineError, InterviewEngine, Prompt, StageOverview};
pub use generation::{ClaudeGenerator, GenerationError, TextGenerator};
pub use interview::{InterviewSession, LimitChoice};
pub use persist::{archive_path, PersistError, WriterArchive};
pub use question::QuestionKind;
pub use stage::LifeStage;
pub use store::{MemoryStore, WriterId, WriterProgress};
pub use style::{Concreteness, LengthPreference, Strictness, StyleProfile, Tone};
pub use synthesis::{FactList, NarrativeDraft, PolishOutcome};
pub use testing::{InterviewHarness, ScriptedGenerator};

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    /// Places and people named in one answer
    #[derive(Debug, Default, Deserialize, StructuredOutput)]
    #[output(name = "mentions")]
    struct Mentions {
        /// Proper names of people
        people: Vec<String>,
        /// Optional home town
        town: Option<String>,
    }

    #[test]
    fn test_structured_output_derive() {
        assert_eq!(Mentions::schema_name(), "mentions");
        assert_eq!(
            Mentions::schema_description(),
            "Places and people named in one answer"
        );
    }

    #[test]
    fn test_structured_output_schema() {
        let schema = Mentions::json_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["people"]["type"], "array");

        let required = schema["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "people"));
        assert!(!required.iter().any(|v| v == "town"));
        assert!(Mentions::format_instructions().contains("people"));
    }
}
