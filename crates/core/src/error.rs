use thiserror::Error;

use crate::model::{AnswerError, GradingResultError, ParseIdError, ProblemError, UnknownSubject};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Problem(#[from] ProblemError),
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    GradingResult(#[from] GradingResultError),
    #[error(transparent)]
    ParseId(#[from] ParseIdError),
    #[error(transparent)]
    Subject(#[from] UnknownSubject),
}
