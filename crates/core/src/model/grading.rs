use thiserror::Error;

use crate::model::answer::AnswerSheet;
use crate::model::ids::{ProblemId, SessionId};
use crate::model::problem::Problem;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GradingResultError {
    #[error("total ({total}) does not match the {entries} problem results")]
    TotalMismatch { total: u32, entries: usize },

    #[error("correct count ({reported}) does not match the results ({counted})")]
    CorrectMismatch { reported: u32, counted: u32 },

    #[error("score {0} is out of range")]
    ScoreOutOfRange(u8),

    #[error("too many problems for one result: {0}")]
    TooManyProblems(usize),
}

/// Outcome for a single problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemResult {
    problem: Problem,
    submitted_answer: String,
    is_correct: bool,
}

impl ProblemResult {
    /// Grade one answer with the problem's own comparison rule.
    #[must_use]
    pub fn grade(problem: Problem, submitted_answer: impl Into<String>) -> Self {
        let submitted_answer = submitted_answer.into();
        let is_correct = problem.is_correct(&submitted_answer);
        Self {
            problem,
            submitted_answer,
            is_correct,
        }
    }

    /// Rehydrate a result graded elsewhere.
    #[must_use]
    pub fn from_persisted(problem: Problem, submitted_answer: String, is_correct: bool) -> Self {
        Self {
            problem,
            submitted_answer,
            is_correct,
        }
    }

    #[must_use]
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    #[must_use]
    pub fn problem_id(&self) -> ProblemId {
        self.problem.id()
    }

    #[must_use]
    pub fn submitted_answer(&self) -> &str {
        &self.submitted_answer
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        self.problem.correct_answer()
    }

    #[must_use]
    pub fn is_correct(&self) -> bool {
        self.is_correct
    }
}

/// Display-ready result of a graded attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradingResult {
    session_id: SessionId,
    total: u32,
    correct: u32,
    score: u8,
    results: Vec<ProblemResult>,
}

impl GradingResult {
    /// Grade every problem of the attempt against the learner's answers.
    ///
    /// Unanswered problems are graded as an empty submission.
    ///
    /// # Errors
    ///
    /// Returns `GradingResultError::TooManyProblems` if the count does not fit in `u32`.
    pub fn reconcile(
        session_id: SessionId,
        problems: &[Problem],
        answers: &AnswerSheet,
    ) -> Result<Self, GradingResultError> {
        let results = problems
            .iter()
            .map(|problem| {
                let submitted = answers.answer(problem.id()).unwrap_or_default();
                ProblemResult::grade(problem.clone(), submitted)
            })
            .collect();
        Self::from_results(session_id, results)
    }

    /// Aggregate already graded problem results.
    ///
    /// # Errors
    ///
    /// Returns `GradingResultError::TooManyProblems` if the count does not fit in `u32`.
    pub fn from_results(
        session_id: SessionId,
        results: Vec<ProblemResult>,
    ) -> Result<Self, GradingResultError> {
        let total = u32::try_from(results.len())
            .map_err(|_| GradingResultError::TooManyProblems(results.len()))?;
        let correct = count_correct(&results);
        Ok(Self {
            session_id,
            total,
            correct,
            score: score_percent(correct, total),
            results,
        })
    }

    /// Rehydrate a result reported by a grading service, checking its totals.
    ///
    /// # Errors
    ///
    /// Returns `GradingResultError` when total, correct count or score disagree
    /// with the per-problem entries.
    pub fn from_persisted(
        session_id: SessionId,
        total: u32,
        correct: u32,
        score: u8,
        results: Vec<ProblemResult>,
    ) -> Result<Self, GradingResultError> {
        if usize::try_from(total).ok() != Some(results.len()) {
            return Err(GradingResultError::TotalMismatch {
                total,
                entries: results.len(),
            });
        }
        let counted = count_correct(&results);
        if counted != correct {
            return Err(GradingResultError::CorrectMismatch {
                reported: correct,
                counted,
            });
        }
        if score > 100 {
            return Err(GradingResultError::ScoreOutOfRange(score));
        }
        Ok(Self {
            session_id,
            total,
            correct,
            score,
            results,
        })
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    /// Integer percentage, 0-100.
    #[must_use]
    pub fn score(&self) -> u8 {
        self.score
    }

    #[must_use]
    pub fn results(&self) -> &[ProblemResult] {
        &self.results
    }

    #[must_use]
    pub fn result_for(&self, problem_id: ProblemId) -> Option<&ProblemResult> {
        self.results.iter().find(|r| r.problem_id() == problem_id)
    }

    /// Problems answered wrong or left blank, in presentation order.
    pub fn incorrect(&self) -> impl Iterator<Item = &ProblemResult> {
        self.results.iter().filter(|r| !r.is_correct())
    }

    #[must_use]
    pub fn passed(&self, pass_mark: u8) -> bool {
        self.score >= pass_mark
    }
}

fn count_correct(results: &[ProblemResult]) -> u32 {
    results
        .iter()
        .filter(|r| r.is_correct())
        .fold(0_u32, |acc, _| acc.saturating_add(1))
}

/// `correct / total` as a percentage, rounded half up. Zero problems score 0.
#[must_use]
pub fn score_percent(correct: u32, total: u32) -> u8 {
    if total == 0 {
        return 0;
    }
    let correct = u64::from(correct.min(total));
    let total = u64::from(total);
    let rounded = (correct * 200 + total) / (total * 2);
    u8::try_from(rounded).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::problem::{ProblemDraft, ProblemKind};

    fn problem(id: u64, kind: ProblemKind, answer: &str) -> Problem {
        let choices = if kind == ProblemKind::MultipleChoice {
            vec!["one".into(), "two".into(), "three".into()]
        } else {
            Vec::new()
        };
        ProblemDraft {
            id: ProblemId::new(id),
            order: u32::try_from(id).unwrap(),
            kind,
            difficulty: "easy".into(),
            prompt: format!("Q{id}"),
            choices,
            correct_answer: answer.into(),
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn score_rounds_half_up() {
        assert_eq!(score_percent(7, 10), 70);
        assert_eq!(score_percent(1, 3), 33);
        assert_eq!(score_percent(2, 3), 67);
        assert_eq!(score_percent(1, 8), 13);
        assert_eq!(score_percent(3, 3), 100);
        assert_eq!(score_percent(0, 0), 0);
    }

    #[test]
    fn reconcile_covers_unanswered_problems() {
        let problems = vec![
            problem(1, ProblemKind::MultipleChoice, "B"),
            problem(2, ProblemKind::ShortAnswer, "Seoul"),
            problem(3, ProblemKind::Essay, "water"),
        ];
        let mut answers = AnswerSheet::new(problems.iter().map(Problem::id));
        answers.set_answer(ProblemId::new(1), "B").unwrap();
        answers.set_answer(ProblemId::new(2), "  seoul ").unwrap();

        let result = GradingResult::reconcile(SessionId::new(5), &problems, &answers).unwrap();

        assert_eq!(result.results().len(), 3);
        assert_eq!(result.correct(), 2);
        assert_eq!(result.score(), 67);
        let third = result.result_for(ProblemId::new(3)).unwrap();
        assert_eq!(third.submitted_answer(), "");
        assert_eq!(third.correct_answer(), "water");
        assert!(!third.is_correct());
        assert_eq!(result.incorrect().count(), 1);
    }

    #[test]
    fn same_input_differs_by_kind() {
        let problems = vec![
            problem(1, ProblemKind::MultipleChoice, "B"),
            problem(2, ProblemKind::ShortAnswer, "B"),
        ];
        let mut answers = AnswerSheet::new(problems.iter().map(Problem::id));
        answers.set_answer(ProblemId::new(1), " b ").unwrap();
        answers.set_answer(ProblemId::new(2), " b ").unwrap();

        let result = GradingResult::reconcile(SessionId::new(1), &problems, &answers).unwrap();
        assert!(!result.results()[0].is_correct());
        assert!(result.results()[1].is_correct());
    }

    #[test]
    fn empty_expected_answer_matches_blank_submission() {
        let problems = vec![problem(1, ProblemKind::Essay, "")];
        let answers = AnswerSheet::new(problems.iter().map(Problem::id));
        let result = GradingResult::reconcile(SessionId::new(1), &problems, &answers).unwrap();
        assert!(result.results()[0].is_correct());
    }

    #[test]
    fn pass_mark_is_inclusive() {
        let problems: Vec<_> = (1..=10)
            .map(|id| problem(id, ProblemKind::ShortAnswer, "x"))
            .collect();
        let mut answers = AnswerSheet::new(problems.iter().map(Problem::id));
        for id in 1..=6 {
            answers.set_answer(ProblemId::new(id), "x").unwrap();
        }
        let result = GradingResult::reconcile(SessionId::new(1), &problems, &answers).unwrap();
        assert_eq!(result.score(), 60);
        assert!(result.passed(60));
        assert!(!result.passed(61));
    }

    #[test]
    fn from_persisted_checks_totals() {
        let p = problem(1, ProblemKind::ShortAnswer, "x");
        let results = vec![ProblemResult::from_persisted(p, "x".into(), true)];

        let err = GradingResult::from_persisted(SessionId::new(1), 2, 1, 50, results.clone())
            .unwrap_err();
        assert!(matches!(err, GradingResultError::TotalMismatch { total: 2, entries: 1 }));

        let err = GradingResult::from_persisted(SessionId::new(1), 1, 0, 0, results.clone())
            .unwrap_err();
        assert!(matches!(err, GradingResultError::CorrectMismatch { .. }));

        let ok = GradingResult::from_persisted(SessionId::new(1), 1, 1, 100, results).unwrap();
        assert_eq!(ok.score(), 100);
    }
}
