use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Submitted,
    Graded,
    Blocked,
}

impl AttemptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "NOT_STARTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Submitted => "SUBMITTED",
            Self::Graded => "GRADED",
            Self::Blocked => "BLOCKED",
        }
    }

    /// A terminal attempt can only be viewed on the result page; no session
    /// may be started for it.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Graded)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: String,
    pub exam_instance_id: String,
    pub status: AttemptStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    SingleChoice,
    FreeText,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionOption {
    pub id: String,
    pub text: String,
}

/// Questions are fetched once at session start and never mutated locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub kind: QuestionKind,
    pub points: f64,
    #[serde(default)]
    pub passage: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Choice(String),
    Text(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedAnswer {
    pub question_id: String,
    pub value: AnswerValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationKind {
    TabSwitch,
    WindowBlur,
    Copy,
    Paste,
    RightClick,
}

impl ViolationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TabSwitch => "TAB_SWITCH",
            Self::WindowBlur => "WINDOW_BLUR",
            Self::Copy => "COPY",
            Self::Paste => "PASTE",
            Self::RightClick => "RIGHT_CLICK",
        }
    }

    /// Focus loss is recorded without nagging the student; everything else
    /// raises a transient warning in the UI.
    pub(crate) fn is_silent(self) -> bool {
        matches!(self, Self::WindowBlur)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub score: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
}
