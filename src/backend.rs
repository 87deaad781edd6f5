pub mod http;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AnswerValue, Attempt, Question, SavedAnswer, SubmitOutcome, ViolationKind};

#[derive(Debug, Clone, Deserialize)]
pub struct AttemptBundle {
    pub attempt: Attempt,
    pub questions: Vec<Question>,
}

/// The remote exam service as seen from an in-progress session. Answer saves
/// and violation reports are best effort: callers swallow their failures, so
/// implementations must not rely on retries happening upstream.
#[async_trait]
pub trait ExamBackend: Send + Sync {
    /// Idempotent: calling again for an already started attempt returns the
    /// same attempt instead of opening a second one.
    async fn start_or_resume_attempt(&self, exam_instance_id: &str) -> Result<AttemptBundle>;

    async fn fetch_saved_answers(&self, attempt_id: &str) -> Result<Vec<SavedAnswer>>;

    async fn save_answer(
        &self,
        attempt_id: &str,
        question_id: &str,
        value: &AnswerValue,
    ) -> Result<()>;

    /// At most once per attempt; the service is expected to reject a second
    /// call for the same attempt as defense in depth.
    async fn submit_attempt(&self, attempt_id: &str) -> Result<SubmitOutcome>;

    async fn report_violation(&self, attempt_id: &str, kind: ViolationKind) -> Result<()>;
}
