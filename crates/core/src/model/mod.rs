mod answer;
mod grading;
mod ids;
mod problem;
mod session;
mod subject;

pub use answer::{AnswerError, AnswerSheet, is_answered, is_canvas_capture};
pub use grading::{GradingResult, GradingResultError, ProblemResult, score_percent};
pub use ids::{AttemptId, ParseIdError, ProblemId, SessionId, WorksheetId};
pub use problem::{
    AnswerSection, Problem, ProblemDraft, ProblemError, ProblemKind, choice_letter,
    sort_for_display,
};
pub use session::{Countdown, CountdownTick, SessionPhase};
pub use subject::{Subject, UnknownSubject, WorksheetRef};
