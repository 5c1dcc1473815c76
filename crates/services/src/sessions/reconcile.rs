use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use worksheet_core::model::{AnswerSheet, GradingResult, Problem, Subject, WorksheetRef};

use super::payload::SubmissionPayload;
use crate::backend::{GradingClient, GradingReport, SubmissionReceipt, TaskId, TaskStatus};
use crate::error::GradingError;

/// How long to wait on a queued grading job.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: 30,
        }
    }
}

/// Submits payloads, waits for grading, and builds the per-problem result.
#[derive(Clone)]
pub struct GradingReconciler {
    grading: Arc<dyn GradingClient>,
    poll: PollPolicy,
}

impl GradingReconciler {
    #[must_use]
    pub fn new(grading: Arc<dyn GradingClient>, poll: PollPolicy) -> Self {
        Self { grading, poll }
    }

    #[must_use]
    pub fn client(&self) -> &Arc<dyn GradingClient> {
        &self.grading
    }

    /// Submit one attempt and reconcile it against the local answer rules.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` for transport failures, failed or timed-out
    /// grading jobs, and cancellation.
    #[instrument(skip_all, fields(%worksheet, attempt_id = %payload.attempt_id))]
    pub async fn grade(
        &self,
        worksheet: WorksheetRef,
        problems: &[Problem],
        answers: &AnswerSheet,
        payload: &SubmissionPayload,
        cancel: &CancellationToken,
    ) -> Result<GradingResult, GradingError> {
        let receipt = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(GradingError::Cancelled),
            receipt = self.grading.submit(worksheet, payload) => receipt?,
        };

        let report = match receipt {
            SubmissionReceipt::Graded(report) => report,
            SubmissionReceipt::Queued(task) => {
                self.await_task(worksheet.subject, &task, cancel).await?
            }
        };

        let result = GradingResult::reconcile(report.session_id, problems, answers)?;
        log_disagreements(&result, &report);
        info!(
            session_id = %result.session_id(),
            correct = result.correct(),
            total = result.total(),
            score = result.score(),
            "attempt graded"
        );
        Ok(result)
    }

    /// Poll a queued job until it settles or the attempt budget runs out.
    ///
    /// Each attempt waits one interval before checking.
    ///
    /// # Errors
    ///
    /// Returns `GradingError::TaskFailed` for a failed job,
    /// `GradingError::TimedOut` when every attempt came back pending, and
    /// `GradingError::Cancelled` if `cancel` fires first.
    #[instrument(skip_all, fields(%subject, task_id = %task))]
    pub async fn await_task(
        &self,
        subject: Subject,
        task: &TaskId,
        cancel: &CancellationToken,
    ) -> Result<GradingReport, GradingError> {
        for attempt in 1..=self.poll.max_attempts {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GradingError::Cancelled),
                () = tokio::time::sleep(self.poll.interval) => {}
            }

            let status = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GradingError::Cancelled),
                status = self.grading.poll_task(subject, task) => status?,
            };

            match status {
                TaskStatus::Pending => debug!(attempt, "grading still pending"),
                TaskStatus::Success(report) => return Ok(report),
                TaskStatus::Failure { message } => {
                    return Err(GradingError::TaskFailed {
                        message: message.unwrap_or_else(|| "grading task failed".to_string()),
                    });
                }
            }
        }
        warn!(attempts = self.poll.max_attempts, "gave up waiting for grading");
        Err(GradingError::TimedOut {
            attempts: self.poll.max_attempts,
        })
    }
}

fn log_disagreements(result: &GradingResult, report: &GradingReport) {
    for (problem_id, remote) in &report.verdicts {
        match result.result_for(*problem_id) {
            Some(local) if local.is_correct() != *remote => warn!(
                %problem_id,
                local = local.is_correct(),
                remote = *remote,
                "grading service disagrees with local verdict"
            ),
            Some(_) => {}
            None => warn!(%problem_id, "grading service reported an unknown problem"),
        }
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
