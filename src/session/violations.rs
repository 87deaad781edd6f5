use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::backend::ExamBackend;
use crate::models::ViolationKind;
use crate::session::SessionEvent;

/// Raw integrity signals as the platform layer observes them. Suppressing the
/// default action (blocking the actual copy/paste/context menu) is the
/// platform adapter's job; by the time a signal reaches the detector the
/// action has already been swallowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExamSignal {
    PageHidden,
    WindowBlurred,
    CopyAttempt,
    PasteAttempt,
    ContextMenu,
}

impl ExamSignal {
    pub(crate) fn violation(self) -> ViolationKind {
        match self {
            Self::PageHidden => ViolationKind::TabSwitch,
            Self::WindowBlurred => ViolationKind::WindowBlur,
            Self::CopyAttempt => ViolationKind::Copy,
            Self::PasteAttempt => ViolationKind::Paste,
            Self::ContextMenu => ViolationKind::RightClick,
        }
    }
}

/// Platform capability behind the detector. Implementations stream every raw
/// occurrence with no debouncing; the detector reports each one.
pub trait SignalSource: Send + Sync {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<ExamSignal>;
}

/// Consumes platform signals for the lifetime of a live attempt, reporting
/// each one to the backend best-effort and counting the reports that land.
pub(crate) struct ViolationDetector {
    count: Arc<AtomicU32>,
    shutdown_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ViolationDetector {
    pub(crate) fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self { count: Arc::new(AtomicU32::new(0)), shutdown_tx, handle: Mutex::new(None) }
    }

    /// Installs the listener task. Idempotent: a second call while installed
    /// is a no-op, so double-mounting cannot double-report.
    pub(crate) fn install(
        &self,
        source: &dyn SignalSource,
        backend: Arc<dyn ExamBackend>,
        attempt_id: String,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
    ) {
        let mut handle = self.handle.lock().expect("violation detector lock");
        if handle.is_some() {
            return;
        }

        let mut signals = source.subscribe();
        let mut shutdown = self.shutdown_tx.subscribe();
        let count = self.count.clone();

        *handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    signal = signals.recv() => {
                        let Some(signal) = signal else { break };
                        let kind = signal.violation();

                        if !kind.is_silent() {
                            let _ = events_tx.send(SessionEvent::ViolationWarning { kind });
                        }

                        let backend = backend.clone();
                        let attempt_id = attempt_id.clone();
                        let count = count.clone();
                        tokio::spawn(async move {
                            match backend.report_violation(&attempt_id, kind).await {
                                Ok(()) => {
                                    count.fetch_add(1, Ordering::SeqCst);
                                    metrics::counter!(
                                        "exam_violations_reported_total",
                                        "kind" => kind.as_str()
                                    )
                                    .increment(1);
                                }
                                // Best effort: a lost report never interrupts
                                // the exam.
                                Err(err) => tracing::debug!(
                                    kind = kind.as_str(),
                                    error = %err,
                                    "Violation report dropped"
                                ),
                            }
                        });
                    }
                }
            }
        }));
    }

    pub(crate) fn count(&self) -> u32 {
        self.count.load(Ordering::SeqCst)
    }

    /// Detaches from the signal stream; no signal observed after this point is
    /// reported. Safe to call repeatedly.
    pub(crate) fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(task) = self.handle.lock().expect("violation detector lock").take() {
            task.abort();
        }
    }
}
