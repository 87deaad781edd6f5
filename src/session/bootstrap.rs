use std::sync::Arc;

use tokio::sync::mpsc;

use crate::backend::ExamBackend;
use crate::core::time::format_offset;
use crate::models::AttemptStatus;
use crate::session::answers::AnswerStore;
use crate::session::violations::SignalSource;
use crate::session::{ExamSession, SessionError, SessionInner, SessionStart, SessionTuning};

impl ExamSession {
    /// Bootstraps a session: starts or resumes the attempt, seeds saved
    /// answers on resume, then installs the countdown and violation listener.
    /// An attempt the backend reports as already finished becomes
    /// `SessionStart::AlreadyFinished` with nothing installed, so the caller
    /// can go straight to the result view.
    pub async fn start(
        backend: Arc<dyn ExamBackend>,
        signals: &dyn SignalSource,
        tuning: SessionTuning,
        exam_instance_id: &str,
    ) -> Result<SessionStart, SessionError> {
        let bundle = backend
            .start_or_resume_attempt(exam_instance_id)
            .await
            .map_err(|err| SessionError::Bootstrap(err.to_string()))?;

        let attempt = bundle.attempt;
        if attempt.status.is_terminal() {
            tracing::info!(
                attempt_id = %attempt.id,
                status = attempt.status.as_str(),
                "Attempt already finished; redirecting to results"
            );
            return Ok(SessionStart::AlreadyFinished { attempt });
        }
        if attempt.status == AttemptStatus::Blocked {
            return Err(SessionError::AttemptBlocked);
        }

        let answers = Arc::new(AnswerStore::default());
        if attempt.status == AttemptStatus::InProgress {
            match backend.fetch_saved_answers(&attempt.id).await {
                Ok(saved) => answers.seed(saved),
                // Resume must never block the student: continue with an
                // empty sheet instead.
                Err(err) => tracing::warn!(
                    attempt_id = %attempt.id,
                    error = %err,
                    "Failed to load saved answers"
                ),
            }
        }

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(SessionInner::new(
            attempt,
            bundle.questions,
            backend.clone(),
            tuning,
            answers,
            events_tx.clone(),
            events_rx,
        ));

        inner.violations.install(signals, backend, inner.attempt.id.clone(), events_tx);

        let weak = Arc::downgrade(&inner);
        inner.countdown.start(inner.tuning.countdown_tick, inner.attempt.expires_at, move || {
            if let Some(session) = weak.upgrade() {
                tokio::spawn(session.auto_submit());
            }
        });

        tracing::info!(
            attempt_id = %inner.attempt.id,
            questions = inner.questions.len(),
            expires_at = %format_offset(inner.attempt.expires_at),
            "Exam session started"
        );

        Ok(SessionStart::Active(ExamSession::from_inner(inner)))
    }
}
