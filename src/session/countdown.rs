use std::sync::Mutex;

use time::OffsetDateTime;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};

use crate::core::time::{duration_until, remaining_whole_seconds};

/// Turns the attempt's fixed expiry timestamp into a once-per-tick feed of
/// remaining whole seconds, and fires the expiry callback exactly once when
/// the clock hits zero.
pub(crate) struct Countdown {
    remaining_rx: watch::Receiver<i64>,
    remaining_tx: Mutex<Option<watch::Sender<i64>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Countdown {
    pub(crate) fn new(expires_at: OffsetDateTime) -> Self {
        let initial = remaining_whole_seconds(expires_at, OffsetDateTime::now_utc());
        let (tx, rx) = watch::channel(initial);
        Self {
            remaining_rx: rx,
            remaining_tx: Mutex::new(Some(tx)),
            handle: Mutex::new(None),
        }
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<i64> {
        self.remaining_rx.clone()
    }

    /// Idempotent; a second call is a no-op. The deadline is captured once and
    /// every tick recomputes the distance to it, so late or throttled ticks
    /// self-correct instead of accumulating drift. A deadline already in the
    /// past fires on the first tick.
    pub(crate) fn start<F>(&self, tick: Duration, expires_at: OffsetDateTime, on_expiry: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let Some(tx) = self.remaining_tx.lock().expect("countdown lock").take() else {
            return;
        };

        let deadline = Instant::now() + duration_until(expires_at);
        let task = tokio::spawn(async move {
            let mut on_expiry = Some(on_expiry);
            let mut ticker = interval(tick);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;
                let left = deadline.saturating_duration_since(Instant::now());
                let _ = tx.send(left.as_secs() as i64);

                if left.is_zero() {
                    if let Some(callback) = on_expiry.take() {
                        callback();
                    }
                    break;
                }
            }
        });

        *self.handle.lock().expect("countdown lock") = Some(task);
    }

    /// Stops scheduling further ticks. Safe to call repeatedly and before
    /// `start`.
    pub(crate) fn stop(&self) {
        if let Some(task) = self.handle.lock().expect("countdown lock").take() {
            task.abort();
        }
    }
}
