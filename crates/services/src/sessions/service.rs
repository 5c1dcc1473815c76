use chrono::{DateTime, Utc};
use std::fmt;
use worksheet_core::model::{
    AnswerSheet, AttemptId, Countdown, CountdownTick, GradingResult, Problem, ProblemId,
    SessionPhase, WorksheetRef, sort_for_display,
};

use super::payload::SubmissionPayload;
use super::progress::SessionProgress;
use crate::error::SessionError;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// One learner attempt at a worksheet.
///
/// Owns the problems, the answer sheet, the countdown and the lifecycle
/// phase. Pure state: network and storage live in `AssignmentLoopService`.
pub struct AssignmentSession {
    worksheet: WorksheetRef,
    attempt_id: AttemptId,
    phase: SessionPhase,
    problems: Vec<Problem>,
    answers: AnswerSheet,
    current: usize,
    countdown: Countdown,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    result: Option<GradingResult>,
}

impl AssignmentSession {
    /// Create a session waiting for its problems.
    #[must_use]
    pub fn loading(worksheet: WorksheetRef, time_limit_secs: u32) -> Self {
        Self {
            worksheet,
            attempt_id: AttemptId::generate(),
            phase: SessionPhase::Loading,
            problems: Vec::new(),
            answers: AnswerSheet::default(),
            current: 0,
            countdown: Countdown::new(time_limit_secs),
            started_at: None,
            completed_at: None,
            result: None,
        }
    }

    /// Install the fetched problems and start the attempt.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Empty` for an empty problem set, and
    /// `SessionError::NotInProgress` if the session already left `Loading`.
    pub fn finish_loading(
        &mut self,
        mut problems: Vec<Problem>,
        started_at: DateTime<Utc>,
    ) -> Result<(), SessionError> {
        if self.phase != SessionPhase::Loading {
            return Err(SessionError::NotInProgress(self.phase));
        }
        if problems.is_empty() {
            return Err(SessionError::Empty);
        }
        sort_for_display(&mut problems);

        self.answers = AnswerSheet::new(problems.iter().map(Problem::id));
        self.problems = problems;
        self.current = 0;
        self.started_at = Some(started_at);
        self.phase = SessionPhase::InProgress;
        Ok(())
    }

    /// Bring back cached answers. Ids that are not on the worksheet are skipped.
    pub fn restore_answers<I, S>(&mut self, entries: I) -> usize
    where
        I: IntoIterator<Item = (ProblemId, S)>,
        S: Into<String>,
    {
        if self.phase != SessionPhase::InProgress {
            return 0;
        }
        self.answers.restore(entries)
    }

    #[must_use]
    pub fn worksheet(&self) -> WorksheetRef {
        self.worksheet
    }

    #[must_use]
    pub fn attempt_id(&self) -> AttemptId {
        self.attempt_id
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerSheet {
        &self.answers
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    #[must_use]
    pub fn current_problem(&self) -> Option<&Problem> {
        self.problems.get(self.current)
    }

    #[must_use]
    pub fn remaining_secs(&self) -> u32 {
        self.countdown.remaining()
    }

    #[must_use]
    pub fn time_expired(&self) -> bool {
        self.countdown.is_expired()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn result(&self) -> Option<&GradingResult> {
        self.result.as_ref()
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SessionPhase::Completed
    }

    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        SessionProgress {
            total: self.problems.len(),
            answered: self.answers.completion_count(),
            current: self.current,
            remaining_secs: self.remaining_secs(),
            is_complete: self.is_complete(),
        }
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// Move to the next problem. Returns whether the index changed.
    pub fn go_to_next(&mut self) -> bool {
        self.go_to(self.current.saturating_add(1))
    }

    /// Move to the previous problem. Returns whether the index changed.
    pub fn go_to_previous(&mut self) -> bool {
        match self.current.checked_sub(1) {
            Some(index) => self.go_to(index),
            None => false,
        }
    }

    /// Jump to a zero-based index. Out-of-range targets leave the index alone.
    pub fn go_to(&mut self, index: usize) -> bool {
        if self.phase != SessionPhase::InProgress || index >= self.problems.len() {
            return false;
        }
        let moved = index != self.current;
        self.current = index;
        moved
    }

    //
    // ─── ANSWERS & TIMER ───────────────────────────────────────────────────────
    //

    /// Record the learner's answer for a problem.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::TimeExpired` once time is up, a phase error
    /// outside `InProgress`, and `SessionError::Answer` for unknown problems.
    pub fn set_answer(
        &mut self,
        problem_id: ProblemId,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::InProgress if self.countdown.is_expired() => {
                Err(SessionError::TimeExpired)
            }
            SessionPhase::InProgress => Ok(self.answers.set_answer(problem_id, value)?),
            SessionPhase::Expired => Err(SessionError::TimeExpired),
            SessionPhase::Loading => Err(SessionError::NotStarted),
            SessionPhase::Completed => Err(SessionError::Completed),
            SessionPhase::Submitting => Err(SessionError::NotInProgress(self.phase)),
        }
    }

    /// Advance the countdown by one second.
    ///
    /// Only runs while `InProgress`; `CountdownTick::Expired` is returned
    /// exactly once and the caller is expected to submit.
    pub fn tick(&mut self) -> CountdownTick {
        if self.phase != SessionPhase::InProgress {
            return CountdownTick::Idle;
        }
        self.countdown.tick()
    }

    //
    // ─── SUBMISSION ────────────────────────────────────────────────────────────
    //

    /// Enter `Submitting` and build the payload to send.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitting` while a submission is in
    /// flight, and a phase error when there is nothing to submit.
    pub fn begin_submission(&mut self) -> Result<SubmissionPayload, SessionError> {
        match self.phase {
            SessionPhase::InProgress | SessionPhase::Expired => {
                self.phase = SessionPhase::Submitting;
                Ok(SubmissionPayload::partition(
                    self.attempt_id,
                    &self.problems,
                    &self.answers,
                ))
            }
            SessionPhase::Submitting => Err(SessionError::AlreadySubmitting),
            SessionPhase::Completed => Err(SessionError::Completed),
            SessionPhase::Loading => Err(SessionError::NotStarted),
        }
    }

    /// Leave `Submitting` after a failed submission.
    ///
    /// Returns to `InProgress`, or to `Expired` when time already ran out.
    pub fn submission_failed(&mut self) {
        if self.phase != SessionPhase::Submitting {
            return;
        }
        self.phase = if self.countdown.is_expired() {
            SessionPhase::Expired
        } else {
            SessionPhase::InProgress
        };
    }

    /// Finish the attempt with its reconciled result.
    ///
    /// # Errors
    ///
    /// Returns a phase error unless a submission is in flight.
    pub fn complete(
        &mut self,
        result: GradingResult,
        completed_at: DateTime<Utc>,
    ) -> Result<&GradingResult, SessionError> {
        match self.phase {
            SessionPhase::Submitting => {}
            SessionPhase::Completed => return Err(SessionError::Completed),
            other => return Err(SessionError::NotInProgress(other)),
        }
        self.phase = SessionPhase::Completed;
        self.completed_at = Some(completed_at);
        Ok(self.result.insert(result))
    }
}

impl fmt::Debug for AssignmentSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssignmentSession")
            .field("worksheet", &self.worksheet)
            .field("attempt_id", &self.attempt_id)
            .field("phase", &self.phase)
            .field("problems_len", &self.problems.len())
            .field("answered", &self.answers.completion_count())
            .field("current", &self.current)
            .field("remaining_secs", &self.countdown.remaining())
            .field("started_at", &self.started_at)
            .field("completed_at", &self.completed_at)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
