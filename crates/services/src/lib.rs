#![forbid(unsafe_code)]

pub mod backend;
pub mod config;
pub mod error;
pub mod sessions;

pub use sessions as session;
pub use tokio_util::sync::CancellationToken;
pub use worksheet_core::Clock;

pub use backend::{GradingClient, HttpBackend, WorksheetSource};
pub use config::{AssignmentSettings, BackendConfig};
pub use error::{
    ConfigError, ContentError, GradingError, InvalidEndpoint, SessionError, SubmissionFailure,
    SubmissionFailureKind,
};

pub use sessions::{
    AssignmentLoopService, AssignmentSession, GradingReconciler, PollPolicy, SessionCommand,
    SessionEvent, SessionHandle, SessionProgress, SubmissionPayload,
};
