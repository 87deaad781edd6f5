use std::sync::Mutex;

use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::models::SubmitOutcome;
use crate::session::{SessionError, SessionInner};

/// Which side of the race reached the submission funnel first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    Manual,
    Deadline,
}

impl SubmitTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Deadline => "deadline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitPhase {
    Active,
    Flushing,
    Submitted,
}

/// The per-session submission guard. `Active -> Flushing` is claimed
/// synchronously, before any await, so a race between the student's click and
/// the deadline callback is decided on the spot; `Flushing` is never rolled
/// back, which also keeps a failed submit from being retried by this session.
#[derive(Debug)]
pub(crate) struct SubmissionCoordinator {
    phase: Mutex<SubmitPhase>,
}

impl SubmissionCoordinator {
    pub(crate) fn new() -> Self {
        Self { phase: Mutex::new(SubmitPhase::Active) }
    }

    pub(crate) fn try_begin(&self) -> bool {
        let mut phase = self.phase.lock().expect("submission phase lock");
        if *phase == SubmitPhase::Active {
            *phase = SubmitPhase::Flushing;
            true
        } else {
            false
        }
    }

    pub(crate) fn mark_submitted(&self) {
        *self.phase.lock().expect("submission phase lock") = SubmitPhase::Submitted;
    }

    pub(crate) fn is_submitted(&self) -> bool {
        *self.phase.lock().expect("submission phase lock") == SubmitPhase::Submitted
    }
}

/// The single submission code path for both entry points.
///
/// Flush always precedes submit. The manual path waits for the flush fan-out
/// unconditionally; the deadline path waits at most `flush_timeout` so a dead
/// network cannot postpone a forced submission, accepting that a last-second
/// edit may then arrive unsaved.
pub(crate) async fn finish(
    inner: &SessionInner,
    trigger: SubmitTrigger,
) -> Result<SubmitOutcome, SessionError> {
    if !inner.coordinator.try_begin() {
        return Err(SessionError::SubmissionAlreadyStarted);
    }

    // No debounced save may start once submission has begun.
    inner.autosave.cancel_all();

    let mut flush = JoinSet::new();
    for (question_id, value) in inner.answers.snapshot() {
        let backend = inner.backend.clone();
        let attempt_id = inner.attempt.id.clone();
        flush.spawn(async move {
            match backend.save_answer(&attempt_id, &question_id, &value).await {
                Ok(()) => {
                    metrics::counter!("exam_answers_saved_total", "path" => "flush").increment(1);
                }
                Err(err) => {
                    tracing::warn!(
                        question_id = %question_id,
                        error = %err,
                        "Final flush save failed"
                    );
                }
            }
        });
    }

    match trigger {
        SubmitTrigger::Manual => {
            while flush.join_next().await.is_some() {}
        }
        SubmitTrigger::Deadline => {
            let drained = timeout(inner.tuning.flush_timeout, async {
                while flush.join_next().await.is_some() {}
            })
            .await;

            if drained.is_err() {
                tracing::warn!(
                    attempt_id = %inner.attempt.id,
                    "Flush still running at the deadline; submitting anyway"
                );
                // Leave the stragglers on the wire rather than aborting them.
                flush.detach_all();
            }
        }
    }

    match inner.backend.submit_attempt(&inner.attempt.id).await {
        Ok(outcome) => {
            inner.coordinator.mark_submitted();
            inner.stop_background();
            metrics::counter!("exam_submissions_total", "trigger" => trigger.as_str()).increment(1);
            tracing::info!(
                attempt_id = %inner.attempt.id,
                score = outcome.score,
                trigger = trigger.as_str(),
                "Attempt submitted"
            );
            Ok(outcome)
        }
        Err(err) => {
            // The guard stays engaged: a failed final submit is fatal to the
            // session and must not be retried from here.
            tracing::error!(
                attempt_id = %inner.attempt.id,
                error = %err,
                "Submit failed; the attempt stays locked"
            );
            Err(SessionError::SubmitFailed(err.to_string()))
        }
    }
}
