use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::WorksheetId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown subject: {0}")]
pub struct UnknownSubject(pub String);

/// Subject area; each one is served by its own content and grading backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    Math,
    Korean,
    English,
}

impl Subject {
    pub const ALL: [Subject; 3] = [Subject::Math, Subject::Korean, Subject::English];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Subject::Math => "math",
            Subject::Korean => "korean",
            Subject::English => "english",
        }
    }

    /// Payload section holding non multiple-choice answers.
    ///
    /// Math worksheets are answered on a drawing canvas, the language
    /// services take typed text.
    #[must_use]
    pub fn free_answer_section(self) -> &'static str {
        match self {
            Subject::Math => "canvas_answers",
            Subject::Korean | Subject::English => "free_answers",
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Subject {
    type Err = UnknownSubject;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "math" => Ok(Subject::Math),
            "korean" => Ok(Subject::Korean),
            "english" => Ok(Subject::English),
            _ => Err(UnknownSubject(s.to_string())),
        }
    }
}

/// A worksheet addressed within its subject service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorksheetRef {
    pub subject: Subject,
    pub worksheet_id: WorksheetId,
}

impl WorksheetRef {
    #[must_use]
    pub fn new(subject: Subject, worksheet_id: WorksheetId) -> Self {
        Self {
            subject,
            worksheet_id,
        }
    }
}

impl fmt::Display for WorksheetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subject, self.worksheet_id)
    }
}
