use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use worksheet_core::model::{ProblemId, WorksheetRef};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Cached working answers of an unfinished attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerDraft {
    pub worksheet: WorksheetRef,
    pub entries: Vec<(ProblemId, String)>,
    pub saved_at: DateTime<Utc>,
}

impl AnswerDraft {
    #[must_use]
    pub fn new<'a>(
        worksheet: WorksheetRef,
        entries: impl IntoIterator<Item = (ProblemId, &'a str)>,
        saved_at: DateTime<Utc>,
    ) -> Self {
        Self {
            worksheet,
            entries: entries
                .into_iter()
                .map(|(id, value)| (id, value.to_owned()))
                .collect(),
            saved_at,
        }
    }
}

/// Draft cache keyed by worksheet. Best effort: callers treat failures as
/// non-fatal.
#[async_trait]
pub trait AnswerDraftRepository: Send + Sync {
    /// Replace the stored draft for `draft.worksheet`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the draft cannot be stored.
    async fn save_draft(&self, draft: &AnswerDraft) -> Result<(), StorageError>;

    /// Fetch the draft for a worksheet, if one was saved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn load_draft(&self, worksheet: WorksheetRef)
    -> Result<Option<AnswerDraft>, StorageError>;

    /// Drop the draft for a worksheet. Missing drafts are not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn clear_draft(&self, worksheet: WorksheetRef) -> Result<(), StorageError>;
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    drafts: Arc<Mutex<HashMap<WorksheetRef, AnswerDraft>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AnswerDraftRepository for InMemoryRepository {
    async fn save_draft(&self, draft: &AnswerDraft) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.insert(draft.worksheet, draft.clone());
        Ok(())
    }

    async fn load_draft(
        &self,
        worksheet: WorksheetRef,
    ) -> Result<Option<AnswerDraft>, StorageError> {
        let guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(guard.get(&worksheet).cloned())
    }

    async fn clear_draft(&self, worksheet: WorksheetRef) -> Result<(), StorageError> {
        let mut guard = self
            .drafts
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        guard.remove(&worksheet);
        Ok(())
    }
}

/// Repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub drafts: Arc<dyn AnswerDraftRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            drafts: Arc::new(InMemoryRepository::new()),
        }
    }
}
