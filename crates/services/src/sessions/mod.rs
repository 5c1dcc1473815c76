mod driver;
mod payload;
mod progress;
mod reconcile;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use driver::{SessionCommand, SessionEvent, SessionHandle};
pub use payload::SubmissionPayload;
pub use progress::SessionProgress;
pub use reconcile::{GradingReconciler, PollPolicy};
pub use service::AssignmentSession;
pub use workflow::AssignmentLoopService;
