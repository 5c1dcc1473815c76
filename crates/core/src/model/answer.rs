use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;

use crate::model::ids::ProblemId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AnswerError {
    #[error("problem {0} is not part of this worksheet")]
    UnknownProblem(ProblemId),
}

/// Returns true if the value counts as an answer (non-blank after trimming).
#[must_use]
pub fn is_answered(value: &str) -> bool {
    !value.trim().is_empty()
}

/// Returns true if the value is an inline handwriting capture.
#[must_use]
pub fn is_canvas_capture(value: &str) -> bool {
    value.starts_with("data:image/")
}

/// Working answers for one attempt, keyed by problem.
///
/// Only ids of the worksheet's problems may be written. The raw value is kept
/// as typed, including empty strings, so an answer can be cleared; blank
/// values count as unanswered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerSheet {
    problems: BTreeSet<ProblemId>,
    entries: BTreeMap<ProblemId, String>,
}

impl AnswerSheet {
    #[must_use]
    pub fn new(problems: impl IntoIterator<Item = ProblemId>) -> Self {
        Self {
            problems: problems.into_iter().collect(),
            entries: BTreeMap::new(),
        }
    }

    /// Store the learner's answer, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `AnswerError::UnknownProblem` if the id is not on the worksheet.
    pub fn set_answer(
        &mut self,
        problem_id: ProblemId,
        value: impl Into<String>,
    ) -> Result<(), AnswerError> {
        if !self.problems.contains(&problem_id) {
            return Err(AnswerError::UnknownProblem(problem_id));
        }
        self.entries.insert(problem_id, value.into());
        Ok(())
    }

    #[must_use]
    pub fn answer(&self, problem_id: ProblemId) -> Option<&str> {
        self.entries.get(&problem_id).map(String::as_str)
    }

    #[must_use]
    pub fn is_answered(&self, problem_id: ProblemId) -> bool {
        self.answer(problem_id).is_some_and(is_answered)
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.problems.len()
    }

    #[must_use]
    pub fn completion_count(&self) -> usize {
        self.entries.values().filter(|v| is_answered(v)).count()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.completion_count() == self.total()
    }

    /// Stored entries in problem id order, blank ones included.
    pub fn entries(&self) -> impl Iterator<Item = (ProblemId, &str)> {
        self.entries.iter().map(|(id, v)| (*id, v.as_str()))
    }

    /// Bulk-load previously cached answers, skipping ids this sheet does not know.
    ///
    /// Returns how many entries were applied.
    pub fn restore<I, S>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (ProblemId, S)>,
        S: Into<String>,
    {
        let mut restored = 0;
        for (id, value) in entries {
            if self.set_answer(id, value).is_ok() {
                restored += 1;
            }
        }
        restored
    }

    /// Forget every answer; the problem set stays.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
