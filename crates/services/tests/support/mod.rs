#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use services::backend::{GradingReport, SubmissionReceipt, TaskId, TaskStatus};
use services::{
    AssignmentLoopService, AssignmentSession, AssignmentSettings, CancellationToken, Clock,
    ContentError, GradingClient, GradingError, SubmissionPayload, WorksheetSource,
};
use storage::repository::InMemoryRepository;
use worksheet_core::model::{
    GradingResult, Problem, ProblemDraft, ProblemId, ProblemKind, SessionId, Subject,
    WorksheetId, WorksheetRef,
};
use worksheet_core::time::fixed_now;

pub fn worksheet() -> WorksheetRef {
    WorksheetRef::new(Subject::Math, WorksheetId::new(12))
}

/// Two multiple-choice problems (answer "B") and one short answer ("10").
pub fn problems() -> Vec<Problem> {
    let choice = |id: u64, order: u32| ProblemDraft {
        id: ProblemId::new(id),
        order,
        kind: ProblemKind::MultipleChoice,
        difficulty: "easy".into(),
        prompt: format!("Q{id}"),
        choices: vec!["1".into(), "2".into(), "3".into()],
        correct_answer: "B".into(),
        explanation: None,
    };
    vec![
        choice(1, 1).validate().unwrap(),
        choice(2, 2).validate().unwrap(),
        ProblemDraft {
            id: ProblemId::new(3),
            order: 3,
            kind: ProblemKind::ShortAnswer,
            difficulty: "medium".into(),
            prompt: "5 + 5".into(),
            choices: Vec::new(),
            correct_answer: "10".into(),
            explanation: Some("count on".into()),
        }
        .validate()
        .unwrap(),
    ]
}

#[derive(Default)]
pub struct FakeContent {
    pub unavailable: AtomicBool,
    pub fetches: AtomicU32,
}

#[async_trait]
impl WorksheetSource for FakeContent {
    async fn fetch_problems(&self, _worksheet: WorksheetRef) -> Result<Vec<Problem>, ContentError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(ContentError::HttpStatus(StatusCode::SERVICE_UNAVAILABLE));
        }
        Ok(problems())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradingMode {
    Graded,
    Failing,
    NeverFinishes,
}

pub struct FakeGrading {
    pub mode: GradingMode,
    pub submits: AtomicU32,
    pub last_payload: std::sync::Mutex<Option<SubmissionPayload>>,
}

impl FakeGrading {
    pub fn new(mode: GradingMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            submits: AtomicU32::new(0),
            last_payload: std::sync::Mutex::new(None),
        })
    }

    pub fn submit_count(&self) -> u32 {
        self.submits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GradingClient for FakeGrading {
    async fn submit(
        &self,
        _worksheet: WorksheetRef,
        payload: &SubmissionPayload,
    ) -> Result<SubmissionReceipt, GradingError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_payload.lock().unwrap() = Some(payload.clone());
        match self.mode {
            GradingMode::Graded => Ok(SubmissionReceipt::Graded(GradingReport::new(
                SessionId::new(41),
            ))),
            GradingMode::Failing => Err(GradingError::HttpStatus(StatusCode::BAD_GATEWAY)),
            GradingMode::NeverFinishes => Ok(SubmissionReceipt::Queued(TaskId::new("slow"))),
        }
    }

    async fn poll_task(&self, _subject: Subject, _task: &TaskId) -> Result<TaskStatus, GradingError> {
        Ok(TaskStatus::Pending)
    }

    async fn fetch_result(
        &self,
        _subject: Subject,
        session_id: SessionId,
    ) -> Result<GradingResult, GradingError> {
        Ok(GradingResult::from_results(session_id, Vec::new())?)
    }
}

pub struct Harness {
    pub content: Arc<FakeContent>,
    pub grading: Arc<FakeGrading>,
    pub drafts: InMemoryRepository,
    pub service: AssignmentLoopService,
}

impl Harness {
    /// Open and load the fixture worksheet.
    pub async fn start(&self) -> AssignmentSession {
        self.service
            .start(worksheet(), &CancellationToken::new())
            .await
            .unwrap()
    }
}

pub fn harness(mode: GradingMode, time_limit_secs: u32) -> Harness {
    harness_with_drafts(mode, time_limit_secs, InMemoryRepository::new())
}

pub fn harness_with_drafts(
    mode: GradingMode,
    time_limit_secs: u32,
    drafts: InMemoryRepository,
) -> Harness {
    let content = Arc::new(FakeContent::default());
    let grading = FakeGrading::new(mode);
    let settings = AssignmentSettings {
        time_limit_secs,
        ..AssignmentSettings::default()
    };
    let service = AssignmentLoopService::new(
        Clock::fixed(fixed_now()),
        content.clone(),
        grading.clone(),
        Arc::new(drafts.clone()),
        settings,
    );
    Harness {
        content,
        grading,
        drafts,
        service,
    }
}
