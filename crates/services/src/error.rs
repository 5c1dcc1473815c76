//! Shared error types for the services crate.

use thiserror::Error;
use url::Url;

use worksheet_core::model::{AnswerError, GradingResultError, ProblemError, SessionPhase};

/// Errors emitted while loading a worksheet's problems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ContentError {
    #[error("content request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Endpoint(#[from] InvalidEndpoint),
    #[error("content request was cancelled")]
    Cancelled,
}

/// A configured base URL that cannot carry a request path.
#[derive(Debug, Error)]
#[error("base URL {0} cannot take a request path")]
pub struct InvalidEndpoint(pub Url);

/// Errors emitted while submitting answers or fetching grading results.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GradingError {
    #[error("grading request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed grading payload: {0}")]
    MalformedPayload(String),
    #[error("grading failed: {message}")]
    TaskFailed { message: String },
    #[error("grading timed out after {attempts} status checks")]
    TimedOut { attempts: u32 },
    #[error("grading request was cancelled")]
    Cancelled,
    #[error(transparent)]
    InvalidResult(#[from] GradingResultError),
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Endpoint(#[from] InvalidEndpoint),
}

impl GradingError {
    #[must_use]
    pub fn kind(&self) -> SubmissionFailureKind {
        match self {
            GradingError::HttpStatus(_) | GradingError::Http(_) => SubmissionFailureKind::Network,
            GradingError::TimedOut { .. } => SubmissionFailureKind::TimedOut,
            GradingError::Cancelled => SubmissionFailureKind::Cancelled,
            GradingError::MalformedPayload(_)
            | GradingError::TaskFailed { .. }
            | GradingError::InvalidResult(_)
            | GradingError::Problem(_)
            | GradingError::Endpoint(_) => SubmissionFailureKind::Rejected,
        }
    }
}

/// Coarse failure class handed to presentation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionFailureKind {
    /// Transport problem; retrying later may help.
    Network,
    /// The grading service refused or garbled the submission.
    Rejected,
    /// Grading did not finish within the polling budget; check back later.
    TimedOut,
    Cancelled,
}

/// Plain failure value for presentation: no transport types attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    pub kind: SubmissionFailureKind,
    pub message: String,
}

impl From<&GradingError> for SubmissionFailure {
    fn from(error: &GradingError) -> Self {
        Self {
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Errors emitted by assignment sessions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("failed to load worksheet: {0}")]
    Load(#[from] ContentError),
    #[error("worksheet has no problems")]
    Empty,
    #[error("session has not finished loading")]
    NotStarted,
    #[error("session is {0}, not in progress")]
    NotInProgress(SessionPhase),
    #[error("a submission is already in flight")]
    AlreadySubmitting,
    #[error("session already completed")]
    Completed,
    #[error("time is up; answers can no longer change")]
    TimeExpired,
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error("submission failed: {0}")]
    Submission(#[from] GradingError),
}

/// Errors emitted while reading configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("{var} must be a number, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
    #[error("{var} is not a valid URL: {source}")]
    InvalidUrl {
        var: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} is out of range: {value}")]
    OutOfRange { var: &'static str, value: u64 },
}
