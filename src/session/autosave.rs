use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::backend::ExamBackend;
use crate::models::AnswerValue;
use crate::session::answers::AnswerStore;

/// Debounced per-question persistence. Each question owns its own timer slot:
/// a new edit replaces only that question's pending timer, never another
/// question's, and once a save request is on the wire it is left to finish.
pub(crate) struct AutosaveScheduler {
    backend: Arc<dyn ExamBackend>,
    store: Arc<AnswerStore>,
    attempt_id: String,
    debounce: Duration,
    timers: Mutex<HashMap<String, JoinHandle<()>>>,
    stopped: Arc<AtomicBool>,
}

impl AutosaveScheduler {
    pub(crate) fn new(
        backend: Arc<dyn ExamBackend>,
        store: Arc<AnswerStore>,
        attempt_id: String,
        debounce: Duration,
    ) -> Self {
        Self {
            backend,
            store,
            attempt_id,
            debounce,
            timers: Mutex::new(HashMap::new()),
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Writes the edit into the store synchronously, then (re)arms the
    /// question's debounce timer. When the quiet period elapses, whatever
    /// value is in the store at that moment is persisted; intermediate edits
    /// within the window are never sent. Save failures are logged and dropped:
    /// the store still holds the value and the final flush will carry it.
    pub(crate) fn record_change(
        &self,
        question_id: &str,
        value: AnswerValue,
    ) -> HashMap<String, AnswerValue> {
        let snapshot = self.store.set(question_id, value);

        if self.stopped.load(Ordering::SeqCst) {
            return snapshot;
        }

        let backend = self.backend.clone();
        let store = self.store.clone();
        let stopped = self.stopped.clone();
        let attempt_id = self.attempt_id.clone();
        let debounce = self.debounce;
        let question = question_id.to_string();

        let timer = tokio::spawn(async move {
            sleep(debounce).await;
            if stopped.load(Ordering::SeqCst) {
                return;
            }
            let Some(latest) = store.get(&question) else {
                return;
            };
            // Detached so that cancelling the timer slot never aborts a save
            // that already left for the network.
            tokio::spawn(async move {
                match backend.save_answer(&attempt_id, &question, &latest).await {
                    Ok(()) => {
                        metrics::counter!("exam_answers_saved_total", "path" => "debounce")
                            .increment(1);
                    }
                    Err(err) => {
                        tracing::warn!(
                            question_id = %question,
                            error = %err,
                            "Autosave failed; the value stays local until the final flush"
                        );
                    }
                }
            });
        });

        let mut timers = self.timers.lock().expect("autosave timers lock");
        if let Some(previous) = timers.insert(question_id.to_string(), timer) {
            previous.abort();
        }

        snapshot
    }

    /// Cancels every scheduled-but-unfired timer and refuses new ones. Called
    /// on submission (no debounced save may start past this point) and on
    /// unmount. In-flight save requests are not touched.
    pub(crate) fn cancel_all(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        let mut timers = self.timers.lock().expect("autosave timers lock");
        for (_, timer) in timers.drain() {
            timer.abort();
        }
    }
}
