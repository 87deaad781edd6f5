use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::mpsc;

use examflow::models::{
    AnswerValue, Attempt, AttemptStatus, Question, QuestionKind, SavedAnswer, SubmitOutcome,
    ViolationKind,
};
use examflow::{
    AttemptBundle, ExamBackend, ExamSession, ExamSignal, SessionStart, SessionTuning, SignalSource,
};

struct InMemoryBackend {
    attempt: Attempt,
    questions: Vec<Question>,
    saves: Mutex<Vec<(String, AnswerValue)>>,
    submits: AtomicU32,
}

impl InMemoryBackend {
    fn new(expires_in: time::Duration) -> Arc<Self> {
        let now = OffsetDateTime::now_utc();
        Arc::new(Self {
            attempt: Attempt {
                id: "attempt-1".to_string(),
                exam_instance_id: "exam-1".to_string(),
                status: AttemptStatus::NotStarted,
                started_at: now,
                expires_at: now + expires_in,
            },
            questions: vec![
                Question {
                    id: "q1".to_string(),
                    text: "2 + 2 = ?".to_string(),
                    kind: QuestionKind::FreeText,
                    points: 1.0,
                    passage: None,
                    options: Vec::new(),
                },
                Question {
                    id: "q2".to_string(),
                    text: "Capital of France?".to_string(),
                    kind: QuestionKind::FreeText,
                    points: 2.0,
                    passage: None,
                    options: Vec::new(),
                },
            ],
            saves: Mutex::new(Vec::new()),
            submits: AtomicU32::new(0),
        })
    }
}

#[async_trait]
impl ExamBackend for InMemoryBackend {
    async fn start_or_resume_attempt(&self, _exam_instance_id: &str) -> Result<AttemptBundle> {
        Ok(AttemptBundle { attempt: self.attempt.clone(), questions: self.questions.clone() })
    }

    async fn fetch_saved_answers(&self, _attempt_id: &str) -> Result<Vec<SavedAnswer>> {
        Ok(Vec::new())
    }

    async fn save_answer(
        &self,
        _attempt_id: &str,
        question_id: &str,
        value: &AnswerValue,
    ) -> Result<()> {
        self.saves.lock().unwrap().push((question_id.to_string(), value.clone()));
        Ok(())
    }

    async fn submit_attempt(&self, _attempt_id: &str) -> Result<SubmitOutcome> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        Ok(SubmitOutcome { score: 3.0, submitted_at: OffsetDateTime::now_utc() })
    }

    async fn report_violation(&self, _attempt_id: &str, _kind: ViolationKind) -> Result<()> {
        Ok(())
    }
}

struct QuietSignals {
    rx: Mutex<Option<mpsc::UnboundedReceiver<ExamSignal>>>,
    _tx: mpsc::UnboundedSender<ExamSignal>,
}

impl QuietSignals {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { rx: Mutex::new(Some(rx)), _tx: tx }
    }
}

impl SignalSource for QuietSignals {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExamSignal> {
        self.rx.lock().unwrap().take().expect("subscribed twice")
    }
}

#[tokio::test(start_paused = true)]
async fn full_session_answer_and_submit_flow() {
    let backend = InMemoryBackend::new(time::Duration::hours(1));
    let signals = QuietSignals::new();
    let tuning = SessionTuning {
        debounce: Duration::from_millis(50),
        flush_timeout: Duration::from_millis(3000),
        countdown_tick: Duration::from_millis(1000),
    };

    let session = match ExamSession::start(backend.clone(), &signals, tuning, "exam-1")
        .await
        .expect("start session")
    {
        SessionStart::Active(session) => session,
        SessionStart::AlreadyFinished { .. } => panic!("fresh attempt should be live"),
    };

    assert_eq!(session.total_questions(), 2);
    assert_eq!(session.answered_count(), 0);

    session.record_answer("q1", AnswerValue::Text("4".to_string()));
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(backend.saves.lock().unwrap().len(), 1);

    let snapshot = session.record_answer("q2", AnswerValue::Text("Paris".to_string()));
    assert_eq!(snapshot.len(), 2);

    let outcome = session.submit().await.expect("submit");
    assert_eq!(outcome.score, 3.0);
    assert!(session.is_submitted());
    assert_eq!(backend.submits.load(Ordering::SeqCst), 1);

    // The flush persisted both answers even though q2 never hit its debounce.
    let saves = backend.saves.lock().unwrap();
    assert!(saves.iter().any(|(id, value)| id == "q2" && *value == AnswerValue::Text("Paris".to_string())));
}

#[tokio::test]
async fn tuning_defaults_follow_settings() {
    let settings = examflow::Settings::load().expect("settings");
    let tuning = SessionTuning::from_settings(&settings);
    assert_eq!(tuning.countdown_tick, Duration::from_millis(1000));
    assert!(!tuning.debounce.is_zero());
    assert!(!tuning.flush_timeout.is_zero());
}
