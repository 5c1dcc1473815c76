//! Collaborator contracts for the remote content and grading services.

mod http;
mod wire;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use worksheet_core::model::{GradingResult, Problem, ProblemId, SessionId, Subject, WorksheetRef};

use crate::error::{ContentError, GradingError};
use crate::sessions::SubmissionPayload;

pub use http::HttpBackend;

/// Opaque handle for an asynchronous grading job.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TaskId(String);

impl TaskId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({})", self.0)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a grading service reports for a finished submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingReport {
    pub session_id: SessionId,
    /// Per-problem verdicts, when the service sends them.
    pub verdicts: BTreeMap<ProblemId, bool>,
}

impl GradingReport {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            verdicts: BTreeMap::new(),
        }
    }
}

/// Immediate answer to a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionReceipt {
    Graded(GradingReport),
    Queued(TaskId),
}

/// One status check of a queued grading job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Success(GradingReport),
    Failure { message: Option<String> },
}

/// Source of a worksheet's problems.
#[async_trait]
pub trait WorksheetSource: Send + Sync {
    /// Fetch the problem set of a worksheet.
    ///
    /// # Errors
    ///
    /// Returns `ContentError` on transport failures or invalid problems.
    async fn fetch_problems(&self, worksheet: WorksheetRef) -> Result<Vec<Problem>, ContentError>;
}

/// The grading service of a subject.
#[async_trait]
pub trait GradingClient: Send + Sync {
    /// Send an attempt's answers for grading.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` on transport failures or unreadable responses.
    async fn submit(
        &self,
        worksheet: WorksheetRef,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, GradingError>;

    /// Check on a queued grading job.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` on transport failures or unreadable responses.
    async fn poll_task(&self, subject: Subject, task: &TaskId) -> Result<TaskStatus, GradingError>;

    /// Fetch the stored result of an already graded session.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` on transport failures or inconsistent results.
    async fn fetch_result(
        &self,
        subject: Subject,
        session_id: SessionId,
    ) -> Result<GradingResult, GradingError>;
}
