use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::backend::{AttemptBundle, ExamBackend};
use crate::models::{
    AnswerValue, Attempt, AttemptStatus, Question, QuestionKind, QuestionOption, SavedAnswer,
    SubmitOutcome, ViolationKind,
};
use crate::session::violations::{ExamSignal, SignalSource};

pub(crate) fn attempt(status: AttemptStatus, expires_in: time::Duration) -> Attempt {
    let now = OffsetDateTime::now_utc();
    Attempt {
        id: Uuid::new_v4().to_string(),
        exam_instance_id: "exam-1".to_string(),
        status,
        started_at: now,
        expires_at: now + expires_in,
    }
}

pub(crate) fn question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        kind: QuestionKind::FreeText,
        points: 1.0,
        passage: None,
        options: Vec::new(),
    }
}

pub(crate) fn choice_question(id: &str) -> Question {
    Question {
        id: id.to_string(),
        text: format!("Question {id}"),
        kind: QuestionKind::SingleChoice,
        points: 1.0,
        passage: None,
        options: vec![
            QuestionOption { id: format!("{id}-a"), text: "Option A".to_string() },
            QuestionOption { id: format!("{id}-b"), text: "Option B".to_string() },
        ],
    }
}

/// Scripted in-memory `ExamBackend`. Every network-facing call is recorded at
/// the moment it is issued; the failure toggles make the corresponding call
/// return an error after recording.
pub(crate) struct FakeBackend {
    bundle: Mutex<AttemptBundle>,
    pub(crate) saved_answers: Mutex<Vec<SavedAnswer>>,
    save_calls: Mutex<Vec<(String, AnswerValue)>>,
    violation_calls: Mutex<Vec<ViolationKind>>,
    pub(crate) submit_calls: AtomicU32,
    pub(crate) fetch_calls: AtomicU32,
    save_delay: Mutex<Duration>,
    pub(crate) fail_start: AtomicBool,
    pub(crate) fail_fetch: AtomicBool,
    pub(crate) fail_saves: AtomicBool,
    pub(crate) fail_submit: AtomicBool,
    pub(crate) fail_violations: AtomicBool,
}

impl FakeBackend {
    pub(crate) fn new(attempt: Attempt, questions: Vec<Question>) -> Arc<Self> {
        Arc::new(Self {
            bundle: Mutex::new(AttemptBundle { attempt, questions }),
            saved_answers: Mutex::new(Vec::new()),
            save_calls: Mutex::new(Vec::new()),
            violation_calls: Mutex::new(Vec::new()),
            submit_calls: AtomicU32::new(0),
            fetch_calls: AtomicU32::new(0),
            save_delay: Mutex::new(Duration::ZERO),
            fail_start: AtomicBool::new(false),
            fail_fetch: AtomicBool::new(false),
            fail_saves: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            fail_violations: AtomicBool::new(false),
        })
    }

    pub(crate) fn set_save_delay(&self, delay: Duration) {
        *self.save_delay.lock().expect("save delay lock") = delay;
    }

    pub(crate) fn save_calls(&self) -> Vec<(String, AnswerValue)> {
        self.save_calls.lock().expect("save calls lock").clone()
    }

    pub(crate) fn violation_calls(&self) -> Vec<ViolationKind> {
        self.violation_calls.lock().expect("violation calls lock").clone()
    }
}

#[async_trait]
impl ExamBackend for FakeBackend {
    async fn start_or_resume_attempt(&self, _exam_instance_id: &str) -> Result<AttemptBundle> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(anyhow!("attempt service unavailable"));
        }
        Ok(self.bundle.lock().expect("bundle lock").clone())
    }

    async fn fetch_saved_answers(&self, _attempt_id: &str) -> Result<Vec<SavedAnswer>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(anyhow!("saved answers unavailable"));
        }
        Ok(self.saved_answers.lock().expect("saved answers lock").clone())
    }

    async fn save_answer(
        &self,
        _attempt_id: &str,
        question_id: &str,
        value: &AnswerValue,
    ) -> Result<()> {
        self.save_calls
            .lock()
            .expect("save calls lock")
            .push((question_id.to_string(), value.clone()));

        let delay = *self.save_delay.lock().expect("save delay lock");
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("save rejected"));
        }
        Ok(())
    }

    async fn submit_attempt(&self, _attempt_id: &str) -> Result<SubmitOutcome> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(anyhow!("submit rejected"));
        }
        Ok(SubmitOutcome { score: 42.0, submitted_at: OffsetDateTime::now_utc() })
    }

    async fn report_violation(&self, _attempt_id: &str, kind: ViolationKind) -> Result<()> {
        self.violation_calls.lock().expect("violation calls lock").push(kind);
        if self.fail_violations.load(Ordering::SeqCst) {
            return Err(anyhow!("report rejected"));
        }
        Ok(())
    }
}

/// Hand-driven `SignalSource`; `emit` plays the role of the browser firing an
/// event.
pub(crate) struct FakeSignals {
    tx: mpsc::UnboundedSender<ExamSignal>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<ExamSignal>>>,
}

impl FakeSignals {
    pub(crate) fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx: Mutex::new(Some(rx)) }
    }

    pub(crate) fn emit(&self, signal: ExamSignal) {
        let _ = self.tx.send(signal);
    }

    pub(crate) fn subscribed(&self) -> bool {
        self.rx.lock().expect("signal source lock").is_none()
    }
}

impl SignalSource for FakeSignals {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExamSignal> {
        self.rx.lock().expect("signal source lock").take().expect("subscribed twice")
    }
}
