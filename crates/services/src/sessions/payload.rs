use std::collections::BTreeMap;

use worksheet_core::model::{AnswerSection, AnswerSheet, AttemptId, Problem, ProblemId, is_answered};

/// Answers split into the sections a grading service expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionPayload {
    pub attempt_id: AttemptId,
    pub multiple_choice: BTreeMap<ProblemId, String>,
    /// Short answers and essays; sent under the subject's free section name.
    pub free: BTreeMap<ProblemId, String>,
}

impl SubmissionPayload {
    /// Partition the non-blank answers of `problems` by problem kind.
    #[must_use]
    pub fn partition(attempt_id: AttemptId, problems: &[Problem], answers: &AnswerSheet) -> Self {
        let mut payload = Self {
            attempt_id,
            multiple_choice: BTreeMap::new(),
            free: BTreeMap::new(),
        };
        for problem in problems {
            let Some(value) = answers.answer(problem.id()).filter(|v| is_answered(v)) else {
                continue;
            };
            let section = match problem.kind().section() {
                AnswerSection::MultipleChoice => &mut payload.multiple_choice,
                AnswerSection::Free => &mut payload.free,
            };
            section.insert(problem.id(), value.to_owned());
        }
        payload
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.multiple_choice.len() + self.free.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use worksheet_core::model::{ProblemDraft, ProblemKind};

    fn problem(id: u64, kind: ProblemKind) -> Problem {
        let (choices, answer) = match kind {
            ProblemKind::MultipleChoice => (vec!["x".to_string(), "y".to_string()], "A"),
            _ => (Vec::new(), "text"),
        };
        ProblemDraft {
            id: ProblemId::new(id),
            order: 1,
            kind,
            difficulty: String::new(),
            prompt: "prompt".into(),
            choices,
            correct_answer: answer.into(),
            explanation: None,
        }
        .validate()
        .unwrap()
    }

    #[test]
    fn partitions_by_kind_and_skips_blank_answers() {
        let problems = vec![
            problem(1, ProblemKind::MultipleChoice),
            problem(2, ProblemKind::ShortAnswer),
            problem(3, ProblemKind::Essay),
            problem(4, ProblemKind::MultipleChoice),
        ];
        let mut answers = AnswerSheet::new(problems.iter().map(Problem::id));
        answers.set_answer(ProblemId::new(1), "B").unwrap();
        answers.set_answer(ProblemId::new(2), "42").unwrap();
        answers.set_answer(ProblemId::new(3), "data:image/png;base64,AAAA").unwrap();
        answers.set_answer(ProblemId::new(4), "   ").unwrap();

        let payload = SubmissionPayload::partition(AttemptId::generate(), &problems, &answers);

        assert_eq!(payload.multiple_choice.len(), 1);
        assert_eq!(payload.multiple_choice[&ProblemId::new(1)], "B");
        assert_eq!(payload.free.len(), 2);
        assert!(payload.free[&ProblemId::new(3)].starts_with("data:image/"));
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn empty_sheet_gives_empty_payload() {
        let problems = vec![problem(1, ProblemKind::Essay)];
        let answers = AnswerSheet::new(problems.iter().map(Problem::id));
        assert!(SubmissionPayload::partition(AttemptId::generate(), &problems, &answers).is_empty());
    }
}
