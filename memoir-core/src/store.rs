//! Storage seams for sessions, profiles and notes.
//!
//! The engine never owns persistence; it reads and writes through the
//! traits here. [`MemoryStore`] implements all of them in memory and is
//! what the CLI and the tests use.

use crate::author::AuthorContext;
use crate::interview::InterviewSession;
use crate::stage::LifeStage;
use crate::style::StyleProfile;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use thiserror::Error;
use tokio::sync::RwLock;

/// Opaque identifier for one writer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WriterId(String);

impl WriterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// A fresh random id.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WriterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WriterId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for WriterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Which stage the writer is on, plus a navigation counter.
///
/// `epoch` increases on every stage change; generation results started
/// under an older epoch are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriterProgress {
    pub active_stage: LifeStage,
    pub epoch: u64,
}

impl WriterProgress {
    /// Move to `stage` and invalidate in-flight work.
    pub fn move_to(&mut self, stage: LifeStage) {
        self.active_stage = stage;
        self.epoch += 1;
    }

    /// Move to the following stage, wrapping after the last.
    pub fn advance(&mut self) -> LifeStage {
        let next = self.active_stage.next();
        self.move_to(next);
        next
    }
}

/// A short note the writer tagged with a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageNote {
    pub stage: LifeStage,
    pub text: String,
}

/// Errors from a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Interview sessions and progress, keyed by writer.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<Option<InterviewSession>, StoreError>;

    /// Replace the stored session for `(writer, session.stage)` in one step.
    async fn save_session(&self, writer: &WriterId, session: &InterviewSession) -> Result<(), StoreError>;

    /// All stored sessions for a writer, in stage order.
    async fn list_sessions(&self, writer: &WriterId) -> Result<Vec<InterviewSession>, StoreError>;

    async fn load_progress(&self, writer: &WriterId) -> Result<Option<WriterProgress>, StoreError>;

    async fn save_progress(&self, writer: &WriterId, progress: &WriterProgress) -> Result<(), StoreError>;
}

/// Author context and style settings, keyed by writer.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn load_author(&self, writer: &WriterId) -> Result<Option<AuthorContext>, StoreError>;

    async fn save_author(&self, writer: &WriterId, author: &AuthorContext) -> Result<(), StoreError>;

    async fn load_style(&self, writer: &WriterId) -> Result<Option<StyleProfile>, StoreError>;

    async fn save_style(&self, writer: &WriterId, style: &StyleProfile) -> Result<(), StoreError>;
}

/// Read-only access to stage-tagged notes.
#[async_trait]
pub trait NotesLookup: Send + Sync {
    async fn notes_for_stage(&self, writer: &WriterId, stage: LifeStage) -> Result<Vec<String>, StoreError>;
}

#[derive(Debug, Default)]
struct WriterRecord {
    sessions: BTreeMap<LifeStage, InterviewSession>,
    progress: Option<WriterProgress>,
    author: Option<AuthorContext>,
    style: Option<StyleProfile>,
    notes: Vec<StageNote>,
}

/// In-memory implementation of every store trait.
#[derive(Debug, Default)]
pub struct MemoryStore {
    writers: RwLock<HashMap<WriterId, WriterRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tag a note with a stage.
    pub async fn add_note(&self, writer: &WriterId, stage: LifeStage, text: impl Into<String>) {
        let mut writers = self.writers.write().await;
        writers
            .entry(writer.clone())
            .or_default()
            .notes
            .push(StageNote {
                stage,
                text: text.into(),
            });
    }

    /// All notes for a writer.
    pub async fn notes(&self, writer: &WriterId) -> Vec<StageNote> {
        let writers = self.writers.read().await;
        writers
            .get(writer)
            .map(|record| record.notes.clone())
            .unwrap_or_default()
    }

    pub async fn writer_count(&self) -> usize {
        self.writers.read().await.len()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn load_session(
        &self,
        writer: &WriterId,
        stage: LifeStage,
    ) -> Result<Option<InterviewSession>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers
            .get(writer)
            .and_then(|record| record.sessions.get(&stage))
            .cloned())
    }

    async fn save_session(&self, writer: &WriterId, session: &InterviewSession) -> Result<(), StoreError> {
        let mut writers = self.writers.write().await;
        writers
            .entry(writer.clone())
            .or_default()
            .sessions
            .insert(session.stage, session.clone());
        Ok(())
    }

    async fn list_sessions(&self, writer: &WriterId) -> Result<Vec<InterviewSession>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers
            .get(writer)
            .map(|record| record.sessions.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn load_progress(&self, writer: &WriterId) -> Result<Option<WriterProgress>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers.get(writer).and_then(|record| record.progress.clone()))
    }

    async fn save_progress(&self, writer: &WriterId, progress: &WriterProgress) -> Result<(), StoreError> {
        let mut writers = self.writers.write().await;
        writers.entry(writer.clone()).or_default().progress = Some(progress.clone());
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for MemoryStore {
    async fn load_author(&self, writer: &WriterId) -> Result<Option<AuthorContext>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers.get(writer).and_then(|record| record.author.clone()))
    }

    async fn save_author(&self, writer: &WriterId, author: &AuthorContext) -> Result<(), StoreError> {
        let mut writers = self.writers.write().await;
        writers.entry(writer.clone()).or_default().author = Some(author.clone());
        Ok(())
    }

    async fn load_style(&self, writer: &WriterId) -> Result<Option<StyleProfile>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers.get(writer).and_then(|record| record.style.clone()))
    }

    async fn save_style(&self, writer: &WriterId, style: &StyleProfile) -> Result<(), StoreError> {
        let mut writers = self.writers.write().await;
        writers.entry(writer.clone()).or_default().style = Some(style.clone());
        Ok(())
    }
}

#[async_trait]
impl NotesLookup for MemoryStore {
    async fn notes_for_stage(&self, writer: &WriterId, stage: LifeStage) -> Result<Vec<String>, StoreError> {
        let writers = self.writers.read().await;
        Ok(writers
            .get(writer)
            .map(|record| {
                record
                    .notes
                    .iter()
                    .filter(|note| note.stage == stage)
                    .map(|note| note.text.clone())
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_advance_wraps_and_bumps_epoch() {
        let mut progress = WriterProgress {
            active_stage: LifeStage::FutureWishes,
            epoch: 3,
        };
        assert_eq!(progress.advance(), LifeStage::Childhood);
        assert_eq!(progress.epoch, 4);
    }

    #[test]
    fn test_writer_id_generate_is_unique() {
        assert_ne!(WriterId::generate(), WriterId::generate());
        assert_eq!(WriterId::from("ada").as_str(), "ada");
    }

    #[tokio::test]
    async fn test_memory_store_sessions() {
        let store = MemoryStore::new();
        let writer = WriterId::new("w1");
        assert!(store.load_session(&writer, LifeStage::Youth).await.unwrap().is_none());

        let mut session = InterviewSession::new(LifeStage::Youth);
        session.themes.insert("music".into());
        store.save_session(&writer, &session).await.unwrap();
        store
            .save_session(&writer, &InterviewSession::new(LifeStage::Childhood))
            .await
            .unwrap();

        let loaded = store.load_session(&writer, LifeStage::Youth).await.unwrap().unwrap();
        assert!(loaded.themes.contains("music"));

        let stages: Vec<_> = store
            .list_sessions(&writer)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.stage)
            .collect();
        assert_eq!(stages, vec![LifeStage::Childhood, LifeStage::Youth]);
    }

    #[tokio::test]
    async fn test_notes_are_filtered_by_stage() {
        let store = MemoryStore::new();
        let writer = WriterId::new("w1");
        store.add_note(&writer, LifeStage::Childhood, "Grandfather's bakery on Rue Mercière").await;
        store.add_note(&writer, LifeStage::Youth, "Moved to Paris").await;

        let notes = store.notes_for_stage(&writer, LifeStage::Childhood).await.unwrap();
        assert_eq!(notes, vec!["Grandfather's bakery on Rue Mercière"]);
        assert!(store
            .notes_for_stage(&WriterId::new("other"), LifeStage::Childhood)
            .await
            .unwrap()
            .is_empty());
    }
}
