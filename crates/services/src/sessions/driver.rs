use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info};
use worksheet_core::model::{CountdownTick, GradingResult, ProblemId, SessionPhase};

use super::service::AssignmentSession;
use super::workflow::AssignmentLoopService;
use crate::error::{SessionError, SubmissionFailure};

const COMMAND_BUFFER: usize = 16;
const TICK: Duration = Duration::from_secs(1);

/// Learner input accepted by a running session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Next,
    Previous,
    GoTo(usize),
    Answer { problem_id: ProblemId, value: String },
    Submit,
    Exit,
}

/// What a running session reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Navigated { index: usize, problem_id: ProblemId },
    AnswerSaved { problem_id: ProblemId, answered: usize, total: usize },
    Ticked { remaining_secs: u32 },
    TimeExpired,
    SubmissionStarted,
    Graded(GradingResult),
    SubmissionFailed(SubmissionFailure),
    /// A command that the current phase does not allow.
    Rejected(String),
}

/// Handle to a session running on its own task.
///
/// Commands, timer ticks and cancellation are handled one at a time by the
/// task; dropping or cancelling the handle stops the timer and aborts any
/// request in flight.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
    cancel: CancellationToken,
    cancel_on_drop: DropGuard,
    join: JoinHandle<AssignmentSession>,
}

impl SessionHandle {
    /// Queue a command. Returns `false` once the session task has stopped.
    ///
    /// While a submission is in flight, `Submit` is rejected and `Exit`
    /// aborts the submission; other commands run after it settles.
    pub async fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).await.is_ok()
    }

    /// Next event, or `None` after the session task has stopped and every
    /// event was read.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the session task and take the session back.
    ///
    /// # Errors
    ///
    /// Returns `JoinError` if the task panicked.
    pub async fn finish(self) -> Result<AssignmentSession, JoinError> {
        let Self {
            commands,
            cancel_on_drop,
            join,
            ..
        } = self;
        let _ = cancel_on_drop.disarm();
        drop(commands);
        join.await
    }
}

impl AssignmentLoopService {
    /// Run a loaded session on a background task.
    #[must_use]
    pub fn drive(&self, session: AssignmentSession) -> SessionHandle {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let driver = SessionDriver {
            service: self.clone(),
            session,
            commands: command_rx,
            listening: true,
            deferred: VecDeque::new(),
            events: event_tx,
            cancel: cancel.clone(),
        };
        let join = tokio::spawn(driver.run());

        SessionHandle {
            commands: command_tx,
            events: event_rx,
            cancel_on_drop: cancel.clone().drop_guard(),
            cancel,
            join,
        }
    }
}

struct SessionDriver {
    service: AssignmentLoopService,
    session: AssignmentSession,
    commands: mpsc::Receiver<SessionCommand>,
    /// False once the command channel has closed.
    listening: bool,
    /// Commands that arrived during a submission, replayed in order.
    deferred: VecDeque<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
    cancel: CancellationToken,
}

impl SessionDriver {
    async fn run(mut self) -> AssignmentSession {
        let mut ticker = time::interval_at(Instant::now() + TICK, TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if let Some(command) = self.deferred.pop_front() {
                self.handle(command).await;
            } else {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {}
                    command = self.commands.recv(), if self.listening => match command {
                        None | Some(SessionCommand::Exit) => break,
                        Some(command) => self.handle(command).await,
                    },
                    _ = ticker.tick() => self.on_tick().await,
                }
            }

            if self.cancel.is_cancelled() {
                debug!("session cancelled");
                break;
            }
            if self.session.is_complete() || (!self.listening && self.deferred.is_empty()) {
                break;
            }
        }

        info!(
            phase = %self.session.phase(),
            attempt_id = %self.session.attempt_id(),
            "session loop stopped"
        );
        self.session
    }

    fn emit(&self, event: SessionEvent) {
        // The receiver may already be gone; the session still runs to its end.
        let _ = self.events.send(event);
    }

    async fn handle(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::Next => {
                let moved = self.session.go_to_next();
                self.navigated(moved);
            }
            SessionCommand::Previous => {
                let moved = self.session.go_to_previous();
                self.navigated(moved);
            }
            SessionCommand::GoTo(index) => {
                let moved = self.session.go_to(index);
                self.navigated(moved);
            }
            SessionCommand::Answer { problem_id, value } => {
                match self
                    .service
                    .save_answer(&mut self.session, problem_id, value)
                    .await
                {
                    Ok(()) => self.emit(SessionEvent::AnswerSaved {
                        problem_id,
                        answered: self.session.answers().completion_count(),
                        total: self.session.problems().len(),
                    }),
                    Err(err) => self.emit(SessionEvent::Rejected(err.to_string())),
                }
            }
            SessionCommand::Submit => self.submit().await,
            SessionCommand::Exit => {}
        }
    }

    fn navigated(&self, moved: bool) {
        if !moved {
            return;
        }
        if let Some(problem) = self.session.current_problem() {
            self.emit(SessionEvent::Navigated {
                index: self.session.current_index(),
                problem_id: problem.id(),
            });
        }
    }

    async fn on_tick(&mut self) {
        match self.session.tick() {
            CountdownTick::Running(remaining_secs) => {
                self.emit(SessionEvent::Ticked { remaining_secs });
            }
            CountdownTick::Expired => {
                info!(attempt_id = %self.session.attempt_id(), "time is up, submitting");
                self.emit(SessionEvent::TimeExpired);
                self.submit().await;
            }
            CountdownTick::Idle => {}
        }
    }

    async fn submit(&mut self) {
        if matches!(
            self.session.phase(),
            SessionPhase::InProgress | SessionPhase::Expired
        ) {
            self.emit(SessionEvent::SubmissionStarted);
        }
        let outcome = {
            let submission = self.service.submit(&mut self.session, &self.cancel);
            tokio::pin!(submission);
            loop {
                tokio::select! {
                    outcome = &mut submission => break outcome,
                    command = self.commands.recv(), if self.listening => match command {
                        Some(command) => {
                            hold(command, &self.events, &self.cancel, &mut self.deferred);
                        }
                        None => self.listening = false,
                    },
                }
            }
        };

        // Commands queued while the result came back are still part of the
        // same submission.
        while self.listening {
            match self.commands.try_recv() {
                Ok(command) => hold(command, &self.events, &self.cancel, &mut self.deferred),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => self.listening = false,
            }
        }

        match outcome {
            Ok(result) => self.emit(SessionEvent::Graded(result)),
            Err(SessionError::Submission(err)) => {
                self.emit(SessionEvent::SubmissionFailed(SubmissionFailure::from(&err)));
            }
            Err(err) => self.emit(SessionEvent::Rejected(err.to_string())),
        }
    }
}

/// Screen a command that arrives while a submission is in flight.
fn hold(
    command: SessionCommand,
    events: &mpsc::UnboundedSender<SessionEvent>,
    cancel: &CancellationToken,
    deferred: &mut VecDeque<SessionCommand>,
) {
    match command {
        SessionCommand::Submit => {
            let _ = events.send(SessionEvent::Rejected(
                SessionError::AlreadySubmitting.to_string(),
            ));
        }
        SessionCommand::Exit => {
            debug!("exit during submission");
            cancel.cancel();
        }
        command => deferred.push_back(command),
    }
}
