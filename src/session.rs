pub(crate) mod answers;
pub(crate) mod autosave;
pub(crate) mod bootstrap;
pub(crate) mod countdown;
pub(crate) mod submit;
pub mod violations;


use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, watch};

use crate::backend::ExamBackend;
use crate::core::config::Settings;
use crate::models::{AnswerValue, Attempt, Question, SubmitOutcome, ViolationKind};
use crate::session::answers::AnswerStore;
use crate::session::autosave::AutosaveScheduler;
use crate::session::countdown::Countdown;
use crate::session::submit::SubmissionCoordinator;
use crate::session::violations::ViolationDetector;

pub use crate::session::submit::SubmitTrigger;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to start attempt: {0}")]
    Bootstrap(String),
    #[error("attempt is blocked")]
    AttemptBlocked,
    #[error("submission already started for this attempt")]
    SubmissionAlreadyStarted,
    #[error("failed to submit attempt: {0}")]
    SubmitFailed(String),
}

/// Out-of-band notifications for the embedding UI. Violation warnings are
/// transient toasts; the auto-submit events are how the UI learns that the
/// deadline forced a submission while the student did nothing.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    ViolationWarning { kind: ViolationKind },
    AutoSubmitted { outcome: SubmitOutcome },
    AutoSubmitFailed { message: String },
}

#[derive(Debug, Clone)]
pub struct SessionTuning {
    pub debounce: Duration,
    pub flush_timeout: Duration,
    pub countdown_tick: Duration,
}

impl SessionTuning {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            debounce: Duration::from_millis(settings.timing().debounce_ms),
            flush_timeout: Duration::from_millis(settings.timing().flush_timeout_ms),
            countdown_tick: Duration::from_millis(settings.timing().countdown_tick_ms),
        }
    }
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(800),
            flush_timeout: Duration::from_millis(3000),
            countdown_tick: Duration::from_millis(1000),
        }
    }
}

/// Outcome of bootstrapping: either a live session, or an attempt that was
/// already finished server-side and should go straight to the result view.
pub enum SessionStart {
    Active(ExamSession),
    AlreadyFinished { attempt: Attempt },
}

/// One student's in-progress run of a timed exam. Cheap to clone; all clones
/// share the same underlying session state.
#[derive(Clone)]
pub struct ExamSession {
    inner: Arc<SessionInner>,
}

pub(crate) struct SessionInner {
    pub(crate) attempt: Attempt,
    pub(crate) questions: Vec<Question>,
    pub(crate) backend: Arc<dyn ExamBackend>,
    pub(crate) tuning: SessionTuning,
    pub(crate) answers: Arc<AnswerStore>,
    pub(crate) autosave: AutosaveScheduler,
    pub(crate) coordinator: SubmissionCoordinator,
    pub(crate) countdown: Countdown,
    pub(crate) violations: ViolationDetector,
    pub(crate) events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<SessionEvent>>>,
}

impl ExamSession {
    pub fn attempt(&self) -> &Attempt {
        &self.inner.attempt
    }

    pub fn questions(&self) -> &[Question] {
        &self.inner.questions
    }

    /// Whole seconds left on the clock, updated once per tick and clamped to
    /// zero. Subscribe once and render from the receiver.
    pub fn remaining_seconds(&self) -> watch::Receiver<i64> {
        self.inner.countdown.subscribe()
    }

    /// Successfully reported violations so far. Reports that failed to reach
    /// the backend are not counted.
    pub fn violation_count(&self) -> u32 {
        self.inner.violations.count()
    }

    pub fn answer(&self, question_id: &str) -> Option<AnswerValue> {
        self.inner.answers.get(question_id)
    }

    pub fn answers_snapshot(&self) -> HashMap<String, AnswerValue> {
        self.inner.answers.snapshot()
    }

    pub fn answered_count(&self) -> usize {
        self.inner.answers.answered_count()
    }

    pub fn total_questions(&self) -> usize {
        self.inner.questions.len()
    }

    pub fn is_submitted(&self) -> bool {
        self.inner.coordinator.is_submitted()
    }

    /// The event stream can be taken exactly once, by whichever component
    /// renders warnings and the auto-submit outcome.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SessionEvent>> {
        self.inner.events_rx.lock().expect("session events lock").take()
    }

    /// Records an edit. The store write is synchronous, so switching questions
    /// right after typing can never lose the edit; persistence happens on the
    /// per-question debounce. Returns the full answer set for re-rendering.
    pub fn record_answer(
        &self,
        question_id: &str,
        value: AnswerValue,
    ) -> HashMap<String, AnswerValue> {
        self.inner.autosave.record_change(question_id, value)
    }

    /// Student-confirmed submission. Flushes every stored answer, then submits
    /// exactly once; the deadline path funnels into the same code.
    pub async fn submit(&self) -> Result<SubmitOutcome, SessionError> {
        submit::finish(&self.inner, SubmitTrigger::Manual).await
    }

    /// Teardown for navigation away without submitting. Cancels all pending
    /// debounce timers and detaches the countdown and violation listeners;
    /// nothing acts on behalf of this session afterwards.
    pub fn shutdown(&self) {
        self.inner.teardown();
    }

    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }
}

impl SessionInner {
    pub(crate) fn new(
        attempt: Attempt,
        questions: Vec<Question>,
        backend: Arc<dyn ExamBackend>,
        tuning: SessionTuning,
        answers: Arc<AnswerStore>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    ) -> Self {
        let autosave = AutosaveScheduler::new(
            backend.clone(),
            answers.clone(),
            attempt.id.clone(),
            tuning.debounce,
        );
        let countdown = Countdown::new(attempt.expires_at);

        Self {
            attempt,
            questions,
            backend,
            tuning,
            answers,
            autosave,
            coordinator: SubmissionCoordinator::new(),
            countdown,
            violations: ViolationDetector::new(),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        }
    }

    pub(crate) fn stop_background(&self) {
        self.countdown.stop();
        self.violations.stop();
    }

    pub(crate) fn teardown(&self) {
        self.autosave.cancel_all();
        self.stop_background();
    }

    /// Deadline-triggered entry point. Losing the race against a manual
    /// submit is the expected quiet outcome; any other failure is reported
    /// through the event channel since no caller is awaiting this path.
    pub(crate) async fn auto_submit(self: Arc<Self>) {
        match submit::finish(&self, SubmitTrigger::Deadline).await {
            Ok(outcome) => {
                let _ = self.events_tx.send(SessionEvent::AutoSubmitted { outcome });
            }
            Err(SessionError::SubmissionAlreadyStarted) => {}
            Err(err) => {
                let _ =
                    self.events_tx.send(SessionEvent::AutoSubmitFailed { message: err.to_string() });
            }
        }
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        self.autosave.cancel_all();
        self.countdown.stop();
        self.violations.stop();
    }
}
