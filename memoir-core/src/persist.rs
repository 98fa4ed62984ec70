//! Writer archives for save/load.
//!
//! A [`WriterArchive`] is a versioned JSON snapshot of everything the engine
//! keeps for one writer: sessions, progress, author context and style.

use crate::author::{AuthorContext, AuthorMode};
use crate::interview::InterviewSession;
use crate::stage::LifeStage;
use crate::store::{WriterId, WriterProgress};
use crate::style::StyleProfile;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current archive format version.
const ARCHIVE_VERSION: u32 = 1;

/// Everything needed to resume a writer's interview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriterArchive {
    /// Format version for compatibility checking.
    pub version: u32,

    /// Seconds since the Unix epoch.
    pub saved_at: String,

    pub writer: WriterId,

    pub progress: WriterProgress,

    pub author: AuthorContext,

    pub style: StyleProfile,

    /// Sessions in stage order.
    pub sessions: Vec<InterviewSession>,

    pub metadata: ArchiveMetadata,
}

/// Summary readable without loading the sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchiveMetadata {
    pub writer: WriterId,
    pub mode: Option<AuthorMode>,
    pub relation: Option<String>,
    pub active_stage: LifeStage,
    pub total_turns: usize,
    pub stages_done: usize,
    pub drafts: usize,
    #[serde(default)]
    pub saved_at: String,
}

impl WriterArchive {
    pub fn new(
        writer: WriterId,
        progress: WriterProgress,
        author: AuthorContext,
        style: StyleProfile,
        mut sessions: Vec<InterviewSession>,
    ) -> Self {
        sessions.sort_by_key(|session| session.stage);
        let saved_at = timestamp();
        let metadata = ArchiveMetadata {
            writer: writer.clone(),
            mode: author.mode,
            relation: author.relation_term().map(str::to_string),
            active_stage: progress.active_stage,
            total_turns: sessions.iter().map(InterviewSession::turn_count).sum(),
            stages_done: sessions.iter().filter(|s| s.done).count(),
            drafts: sessions.iter().filter(|s| s.draft.is_some()).count(),
            saved_at: saved_at.clone(),
        };

        Self {
            version: ARCHIVE_VERSION,
            saved_at,
            writer,
            progress,
            author,
            style,
            sessions,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).await?;
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path).await?;
        let archive: Self = serde_json::from_str(&content)?;
        check_version(archive.version)?;
        Ok(archive)
    }

    /// Read only the metadata block.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<ArchiveMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: ArchiveMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;
        check_version(partial.version)?;
        Ok(partial.metadata)
    }
}

fn check_version(found: u32) -> Result<(), PersistError> {
    if found != ARCHIVE_VERSION {
        return Err(PersistError::VersionMismatch {
            expected: ARCHIVE_VERSION,
            found,
        });
    }
    Ok(())
}

/// Default archive file for a writer inside `base_dir`.
pub fn archive_path(base_dir: impl AsRef<Path>, writer: &WriterId) -> PathBuf {
    let sanitized: String = writer
        .as_str()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    base_dir.as_ref().join(format!("{sanitized}.memoir.json"))
}

fn timestamp() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    now.as_secs().to_string()
}
