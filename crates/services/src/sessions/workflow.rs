use std::sync::Arc;

use storage::repository::{AnswerDraft, AnswerDraftRepository};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use worksheet_core::model::{GradingResult, ProblemId, SessionId, Subject, WorksheetRef};

use super::reconcile::GradingReconciler;
use super::service::AssignmentSession;
use crate::Clock;
use crate::backend::{GradingClient, WorksheetSource};
use crate::config::AssignmentSettings;
use crate::error::{ContentError, GradingError, SessionError};

/// Orchestrates loading, draft caching and submission around an
/// `AssignmentSession`.
#[derive(Clone)]
pub struct AssignmentLoopService {
    clock: Clock,
    content: Arc<dyn WorksheetSource>,
    reconciler: GradingReconciler,
    drafts: Arc<dyn AnswerDraftRepository>,
    settings: AssignmentSettings,
}

impl AssignmentLoopService {
    #[must_use]
    pub fn new(
        clock: Clock,
        content: Arc<dyn WorksheetSource>,
        grading: Arc<dyn GradingClient>,
        drafts: Arc<dyn AnswerDraftRepository>,
        settings: AssignmentSettings,
    ) -> Self {
        Self {
            clock,
            content,
            reconciler: GradingReconciler::new(grading, settings.poll),
            drafts,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> AssignmentSettings {
        self.settings
    }

    /// Create a session for `worksheet` in the `Loading` phase.
    #[must_use]
    pub fn open(&self, worksheet: WorksheetRef) -> AssignmentSession {
        AssignmentSession::loading(worksheet, self.settings.time_limit_secs)
    }

    /// Fetch the problems and restore any cached draft.
    ///
    /// On failure the session stays `Loading` so the caller can retry.
    /// Returns how many cached answers were restored.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Load` when the fetch fails or `cancel` fires,
    /// and `SessionError::Empty` for a worksheet without problems.
    #[instrument(skip_all, fields(worksheet = %session.worksheet()))]
    pub async fn load(
        &self,
        session: &mut AssignmentSession,
        cancel: &CancellationToken,
    ) -> Result<usize, SessionError> {
        let worksheet = session.worksheet();
        let problems = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(ContentError::Cancelled.into()),
            problems = self.content.fetch_problems(worksheet) => problems?,
        };
        session.finish_loading(problems, self.clock.now())?;

        let restored = match self.drafts.load_draft(worksheet).await {
            Ok(Some(draft)) => session.restore_answers(draft.entries),
            Ok(None) => 0,
            Err(err) => {
                warn!(error = %err, "failed to read answer draft");
                0
            }
        };
        info!(
            problems = session.problems().len(),
            restored,
            attempt_id = %session.attempt_id(),
            "session started"
        );
        Ok(restored)
    }

    /// Open and load in one step.
    ///
    /// # Errors
    ///
    /// Same as `load`.
    pub async fn start(
        &self,
        worksheet: WorksheetRef,
        cancel: &CancellationToken,
    ) -> Result<AssignmentSession, SessionError> {
        let mut session = self.open(worksheet);
        self.load(&mut session, cancel).await?;
        Ok(session)
    }

    /// Record an answer and write the whole sheet through to the draft cache.
    ///
    /// # Errors
    ///
    /// Returns the `SessionError` from `AssignmentSession::set_answer`. Draft
    /// write failures are only logged.
    pub async fn save_answer(
        &self,
        session: &mut AssignmentSession,
        problem_id: ProblemId,
        value: impl Into<String>,
    ) -> Result<(), SessionError> {
        session.set_answer(problem_id, value)?;

        let draft = AnswerDraft::new(
            session.worksheet(),
            session.answers().entries(),
            self.clock.now(),
        );
        if let Err(err) = self.drafts.save_draft(&draft).await {
            warn!(worksheet = %session.worksheet(), error = %err, "failed to cache answer draft");
        }
        Ok(())
    }

    /// Submit the attempt and complete the session with its result.
    ///
    /// A failed submission returns the session to `InProgress`, or `Expired`
    /// when time already ran out.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadySubmitting` for a second submission in
    /// flight and `SessionError::Submission` when grading fails.
    #[instrument(skip_all, fields(worksheet = %session.worksheet(), attempt_id = %session.attempt_id()))]
    pub async fn submit(
        &self,
        session: &mut AssignmentSession,
        cancel: &CancellationToken,
    ) -> Result<GradingResult, SessionError> {
        let payload = session.begin_submission()?;
        let graded = self
            .reconciler
            .grade(
                session.worksheet(),
                session.problems(),
                session.answers(),
                &payload,
                cancel,
            )
            .await;

        let result = match graded {
            Ok(result) => result,
            Err(err) => {
                session.submission_failed();
                warn!(error = %err, phase = %session.phase(), "submission failed");
                return Err(err.into());
            }
        };

        let completed = session.complete(result, self.clock.now())?.clone();
        if let Err(err) = self.drafts.clear_draft(session.worksheet()).await {
            warn!(error = %err, "failed to clear answer draft");
        }
        Ok(completed)
    }

    /// Load the stored result of an earlier graded session.
    ///
    /// # Errors
    ///
    /// Returns `GradingError` on transport failures or inconsistent results.
    pub async fn fetch_result(
        &self,
        subject: Subject,
        session_id: SessionId,
    ) -> Result<GradingResult, GradingError> {
        self.reconciler.client().fetch_result(subject, session_id).await
    }
}
