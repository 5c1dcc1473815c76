//! JSON shapes exchanged with the subject services.

use serde::Deserialize;
use serde_json::{Map, Value};
use worksheet_core::model::{
    GradingResult, Problem, ProblemDraft, ProblemError, ProblemId, ProblemKind, ProblemResult,
    SessionId, Subject,
};

use super::{GradingReport, SubmissionReceipt, TaskId, TaskStatus};
use crate::error::GradingError;
use crate::sessions::SubmissionPayload;

#[derive(Debug, Deserialize)]
pub(super) struct ProblemSetDto {
    pub problems: Vec<ProblemDto>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProblemDto {
    pub id: u64,
    #[serde(alias = "sequence")]
    pub order: u32,
    #[serde(rename = "type")]
    pub kind: ProblemKind,
    #[serde(default)]
    pub difficulty: String,
    #[serde(alias = "content")]
    pub prompt: String,
    #[serde(default)]
    pub choices: Vec<String>,
    #[serde(alias = "answer")]
    pub correct_answer: String,
    #[serde(default)]
    pub explanation: Option<String>,
}

impl ProblemDto {
    pub fn into_problem(self) -> Result<Problem, ProblemError> {
        ProblemDraft {
            id: ProblemId::new(self.id),
            order: self.order,
            kind: self.kind,
            difficulty: self.difficulty,
            prompt: self.prompt,
            choices: self.choices,
            correct_answer: self.correct_answer,
            explanation: self.explanation,
        }
        .validate()
    }
}

#[derive(Debug, Deserialize)]
struct VerdictDto {
    problem_id: u64,
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
struct GradingReportDto {
    session_id: u64,
    #[serde(default)]
    results: Vec<VerdictDto>,
}

impl From<GradingReportDto> for GradingReport {
    fn from(dto: GradingReportDto) -> Self {
        Self {
            session_id: SessionId::new(dto.session_id),
            verdicts: dto
                .results
                .into_iter()
                .map(|v| (ProblemId::new(v.problem_id), v.is_correct))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TaskStatusDto {
    status: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProblemResultDto {
    problem: ProblemDto,
    #[serde(default)]
    submitted_answer: String,
    is_correct: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct GradingResultDto {
    session_id: u64,
    total: u32,
    correct: u32,
    score: u8,
    results: Vec<ProblemResultDto>,
}

impl GradingResultDto {
    pub fn into_result(self) -> Result<GradingResult, GradingError> {
        let results = self
            .results
            .into_iter()
            .map(|entry| {
                let problem = entry.problem.into_problem()?;
                Ok(ProblemResult::from_persisted(
                    problem,
                    entry.submitted_answer,
                    entry.is_correct,
                ))
            })
            .collect::<Result<Vec<_>, ProblemError>>()?;
        Ok(GradingResult::from_persisted(
            SessionId::new(self.session_id),
            self.total,
            self.correct,
            self.score,
            results,
        )?)
    }
}

fn malformed<E: std::fmt::Display>(e: E) -> GradingError {
    GradingError::MalformedPayload(e.to_string())
}

fn answer_map<'a>(answers: impl Iterator<Item = (&'a ProblemId, &'a String)>) -> Value {
    Value::Object(
        answers
            .map(|(id, value)| (id.to_string(), Value::String(value.clone())))
            .collect::<Map<String, Value>>(),
    )
}

/// Request body for a submission; the free section name depends on the subject.
pub(super) fn submission_body(subject: Subject, payload: &SubmissionPayload) -> Value {
    let mut body = Map::new();
    body.insert(
        "attempt_id".into(),
        Value::String(payload.attempt_id.to_string()),
    );
    body.insert(
        "multiple_choice_answers".into(),
        answer_map(payload.multiple_choice.iter()),
    );
    body.insert(
        subject.free_answer_section().into(),
        answer_map(payload.free.iter()),
    );
    Value::Object(body)
}

/// A submission response is either a task handle or a final report.
pub(super) fn parse_receipt(body: Value) -> Result<SubmissionReceipt, GradingError> {
    if let Some(task_id) = body.get("task_id") {
        let task_id = task_id
            .as_str()
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| malformed("task_id must be a non-empty string"))?;
        return Ok(SubmissionReceipt::Queued(TaskId::new(task_id)));
    }
    let report: GradingReportDto = serde_json::from_value(body).map_err(malformed)?;
    Ok(SubmissionReceipt::Graded(report.into()))
}

pub(super) fn parse_task_status(body: Value) -> Result<TaskStatus, GradingError> {
    let dto: TaskStatusDto = serde_json::from_value(body).map_err(malformed)?;
    match dto.status.to_ascii_uppercase().as_str() {
        "PENDING" => Ok(TaskStatus::Pending),
        "SUCCESS" => {
            let result = dto
                .result
                .ok_or_else(|| malformed("SUCCESS status without a result"))?;
            let report: GradingReportDto = serde_json::from_value(result).map_err(malformed)?;
            Ok(TaskStatus::Success(report.into()))
        }
        "FAILURE" => Ok(TaskStatus::Failure {
            message: dto.message,
        }),
        other => Err(malformed(format!("unknown task status {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use worksheet_core::model::AttemptId;

    #[test]
    fn problem_set_accepts_source_field_names() {
        let body = json!({
            "problems": [
                {
                    "id": 11,
                    "sequence": 1,
                    "type": "multiple_choice",
                    "difficulty": "hard",
                    "content": "Pick the prime",
                    "choices": ["4", "6", "7"],
                    "answer": "C"
                },
                {
                    "id": 12,
                    "order": 2,
                    "type": "essay",
                    "prompt": "Explain why",
                    "correct_answer": "because",
                    "explanation": "see unit 3"
                }
            ]
        });
        let set: ProblemSetDto = serde_json::from_value(body).unwrap();
        let problems: Vec<_> = set
            .problems
            .into_iter()
            .map(|p| p.into_problem().unwrap())
            .collect();
        assert_eq!(problems[0].kind(), ProblemKind::MultipleChoice);
        assert_eq!(problems[0].choice_for_letter("C"), Some("7"));
        assert_eq!(problems[1].explanation(), Some("see unit 3"));
        assert_eq!(problems[1].difficulty(), "");
    }

    #[test]
    fn submission_body_splits_sections_per_subject() {
        let mut multiple_choice = BTreeMap::new();
        multiple_choice.insert(ProblemId::new(1), "A".to_string());
        let mut free = BTreeMap::new();
        free.insert(ProblemId::new(2), "x = 4".to_string());
        let payload = SubmissionPayload {
            attempt_id: AttemptId::generate(),
            multiple_choice,
            free,
        };

        let math = submission_body(Subject::Math, &payload);
        assert_eq!(math["multiple_choice_answers"], json!({"1": "A"}));
        assert_eq!(math["canvas_answers"], json!({"2": "x = 4"}));
        assert!(math.get("free_answers").is_none());

        let english = submission_body(Subject::English, &payload);
        assert_eq!(english["free_answers"], json!({"2": "x = 4"}));
    }

    #[test]
    fn receipt_detects_task_handles() {
        let receipt = parse_receipt(json!({"task_id": "job-7"})).unwrap();
        assert_eq!(receipt, SubmissionReceipt::Queued(TaskId::new("job-7")));

        let err = parse_receipt(json!({"task_id": ""})).unwrap_err();
        assert!(matches!(err, GradingError::MalformedPayload(_)));
    }

    #[test]
    fn receipt_reads_synchronous_report() {
        let receipt = parse_receipt(json!({
            "session_id": 90,
            "results": [{"problem_id": 1, "is_correct": true}]
        }))
        .unwrap();
        let SubmissionReceipt::Graded(report) = receipt else {
            panic!("expected a graded receipt");
        };
        assert_eq!(report.session_id, SessionId::new(90));
        assert_eq!(report.verdicts.get(&ProblemId::new(1)), Some(&true));
    }

    #[test]
    fn task_status_variants() {
        assert_eq!(
            parse_task_status(json!({"status": "PENDING"})).unwrap(),
            TaskStatus::Pending
        );
        assert_eq!(
            parse_task_status(json!({"status": "FAILURE", "message": "bad input"})).unwrap(),
            TaskStatus::Failure {
                message: Some("bad input".into())
            }
        );
        let success =
            parse_task_status(json!({"status": "SUCCESS", "result": {"session_id": 3}})).unwrap();
        assert_eq!(success, TaskStatus::Success(GradingReport::new(SessionId::new(3))));
    }

    #[test]
    fn task_status_rejects_success_without_result_and_unknown_status() {
        assert!(matches!(
            parse_task_status(json!({"status": "SUCCESS"})),
            Err(GradingError::MalformedPayload(_))
        ));
        assert!(matches!(
            parse_task_status(json!({"status": "RETRY"})),
            Err(GradingError::MalformedPayload(_))
        ));
    }

    #[test]
    fn grading_result_record_is_validated() {
        let body = json!({
            "session_id": 4,
            "total": 1,
            "correct": 1,
            "score": 100,
            "results": [{
                "problem": {
                    "id": 1, "order": 1, "type": "short_answer",
                    "prompt": "Capital of Korea?", "correct_answer": "Seoul"
                },
                "submitted_answer": "seoul",
                "is_correct": true
            }]
        });
        let dto: GradingResultDto = serde_json::from_value(body).unwrap();
        let result = dto.into_result().unwrap();
        assert_eq!(result.score(), 100);
        assert_eq!(result.results()[0].correct_answer(), "Seoul");

        let inconsistent = json!({
            "session_id": 4, "total": 2, "correct": 0, "score": 0, "results": []
        });
        let dto: GradingResultDto = serde_json::from_value(inconsistent).unwrap();
        assert!(matches!(dto.into_result(), Err(GradingError::InvalidResult(_))));
    }
}
