use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::ProblemId;

//
// ─── PROBLEM KIND ──────────────────────────────────────────────────────────────
//

/// Which payload section an answer is submitted under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerSection {
    MultipleChoice,
    Free,
}

/// The three answer shapes a problem can take.
///
/// Every kind-dependent rule dispatches from here: answer comparison and the
/// submission section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProblemKind {
    /// Learner picks one option letter.
    MultipleChoice,
    /// Learner types a short literal answer.
    ShortAnswer,
    /// Free-form response, typed or captured as handwriting.
    Essay,
}

impl ProblemKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ProblemKind::MultipleChoice => "multiple_choice",
            ProblemKind::ShortAnswer => "short_answer",
            ProblemKind::Essay => "essay",
        }
    }

    #[must_use]
    pub fn section(self) -> AnswerSection {
        match self {
            ProblemKind::MultipleChoice => AnswerSection::MultipleChoice,
            ProblemKind::ShortAnswer | ProblemKind::Essay => AnswerSection::Free,
        }
    }

    /// Compares a submitted answer against the expected one.
    ///
    /// Option letters must match exactly. Text answers match ignoring case
    /// and surrounding whitespace.
    #[must_use]
    pub fn is_correct(self, submitted: &str, expected: &str) -> bool {
        match self {
            ProblemKind::MultipleChoice => submitted == expected,
            ProblemKind::ShortAnswer | ProblemKind::Essay => {
                submitted.trim().to_lowercase() == expected.trim().to_lowercase()
            }
        }
    }
}

impl fmt::Display for ProblemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProblemKind {
    type Err = ProblemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "multiple_choice" => Ok(ProblemKind::MultipleChoice),
            "short_answer" => Ok(ProblemKind::ShortAnswer),
            "essay" => Ok(ProblemKind::Essay),
            other => Err(ProblemError::UnknownKind(other.to_string())),
        }
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProblemError {
    #[error("unknown problem kind: {0}")]
    UnknownKind(String),

    #[error("problem {id}: display order must start at 1")]
    InvalidOrder { id: ProblemId },

    #[error("problem {id}: multiple-choice problem has no choices")]
    MissingChoices { id: ProblemId },

    #[error("problem {id}: correct answer {answer:?} is not one of {count} choice letters")]
    InvalidChoiceAnswer {
        id: ProblemId,
        answer: String,
        count: usize,
    },

    #[error("problem {id}: only multiple-choice problems carry choices")]
    UnexpectedChoices { id: ProblemId },
}

//
// ─── PROBLEM ───────────────────────────────────────────────────────────────────
//

/// Unvalidated problem as received from a content service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemDraft {
    pub id: ProblemId,
    pub order: u32,
    pub kind: ProblemKind,
    pub difficulty: String,
    pub prompt: String,
    pub choices: Vec<String>,
    pub correct_answer: String,
    pub explanation: Option<String>,
}

impl ProblemDraft {
    /// Check the draft and freeze it into a `Problem`.
    ///
    /// # Errors
    ///
    /// Returns `ProblemError` when the order is zero, or when choices and the
    /// correct answer do not fit the problem kind.
    pub fn validate(self) -> Result<Problem, ProblemError> {
        if self.order == 0 {
            return Err(ProblemError::InvalidOrder { id: self.id });
        }

        match self.kind {
            ProblemKind::MultipleChoice => {
                if self.choices.is_empty() {
                    return Err(ProblemError::MissingChoices { id: self.id });
                }
                if choice_index(&self.correct_answer)
                    .is_none_or(|index| index >= self.choices.len())
                {
                    return Err(ProblemError::InvalidChoiceAnswer {
                        id: self.id,
                        answer: self.correct_answer,
                        count: self.choices.len(),
                    });
                }
            }
            ProblemKind::ShortAnswer | ProblemKind::Essay => {
                if !self.choices.is_empty() {
                    return Err(ProblemError::UnexpectedChoices { id: self.id });
                }
            }
        }

        Ok(Problem {
            id: self.id,
            order: self.order,
            kind: self.kind,
            difficulty: self.difficulty,
            prompt: self.prompt,
            choices: self.choices,
            correct_answer: self.correct_answer,
            explanation: self.explanation.filter(|text| !text.trim().is_empty()),
        })
    }
}

/// One gradable question of a worksheet. Never mutated once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    id: ProblemId,
    order: u32,
    kind: ProblemKind,
    difficulty: String,
    prompt: String,
    choices: Vec<String>,
    correct_answer: String,
    explanation: Option<String>,
}

impl Problem {
    #[must_use]
    pub fn id(&self) -> ProblemId {
        self.id
    }

    /// 1-based display position.
    #[must_use]
    pub fn order(&self) -> u32 {
        self.order
    }

    #[must_use]
    pub fn kind(&self) -> ProblemKind {
        self.kind
    }

    #[must_use]
    pub fn difficulty(&self) -> &str {
        &self.difficulty
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Choice text for an option letter, if this problem has that option.
    #[must_use]
    pub fn choice_for_letter(&self, letter: &str) -> Option<&str> {
        choice_index(letter)
            .and_then(|index| self.choices.get(index))
            .map(String::as_str)
    }

    #[must_use]
    pub fn is_correct(&self, submitted: &str) -> bool {
        self.kind.is_correct(submitted, &self.correct_answer)
    }
}

/// Option letter for a 0-based choice index (`0 -> "A"`).
#[must_use]
pub fn choice_letter(index: usize) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i))
}

fn choice_index(letter: &str) -> Option<usize> {
    let mut chars = letter.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_uppercase() => Some(usize::from(c as u8 - b'A')),
        _ => None,
    }
}

/// Orders problems for presentation: display order first, id as tie-break.
pub fn sort_for_display(problems: &mut [Problem]) {
    problems.sort_by_key(|p| (p.order, p.id));
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
