use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::{interval, Instant};

/// Events delivered on the countdown's stream. `Tick` carries remaining
/// whole seconds; `Expired` is sent exactly once, after the final `Tick(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Tick(u64),
    Expired,
}

struct Inner {
    /// Original duration in seconds, for `reset` and the accessors.
    original: u64,
    remaining: u64,
    expired: bool,
    task: Option<JoinHandle<()>>,
}

/// Per-question wall-clock countdown.
///
/// Each periodic check recomputes `remaining = max(0, base − elapsed)` from
/// the start instant rather than decrementing a counter, so scheduling
/// jitter never accumulates into drift. The caller validates `duration > 0`;
/// nothing here can fail.
///
/// Ticks and the single expiry are delivered on the event stream returned by
/// [`Countdown::new`]; `stop` cancels the pending schedule and is safe to
/// call repeatedly or after natural expiry.
pub struct Countdown {
    inner: Arc<Mutex<Inner>>,
    events: UnboundedSender<TimerEvent>,
}

impl Countdown {
    pub fn new(duration_secs: u64) -> (Self, UnboundedReceiver<TimerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let countdown = Countdown {
            inner: Arc::new(Mutex::new(Inner {
                original: duration_secs,
                remaining: duration_secs,
                expired: false,
                task: None,
            })),
            events: tx,
        };
        (countdown, rx)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().expect("countdown state poisoned")
    }

    /// Starts the repeating 1-second check. No-op if already running or
    /// already expired.
    pub fn start(&self) {
        let mut inner = self.lock();
        if inner.task.is_some() || inner.remaining == 0 {
            return;
        }

        // Resuming counts down from whatever was left, so elapsed time
        // before a pause is preserved rather than double-counted.
        let base = inner.remaining;
        let shared = Arc::clone(&self.inner);
        let events = self.events.clone();

        inner.task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let mut ticker = interval(Duration::from_secs(1));
            ticker.tick().await; // first tick completes immediately

            loop {
                ticker.tick().await;
                let elapsed = started.elapsed().as_secs();
                let remaining = base.saturating_sub(elapsed);

                {
                    let mut state = shared.lock().expect("countdown state poisoned");
                    state.remaining = remaining;
                    if remaining == 0 {
                        state.expired = true;
                        state.task = None;
                    }
                }

                let _ = events.send(TimerEvent::Tick(remaining));
                if remaining == 0 {
                    let _ = events.send(TimerEvent::Expired);
                    return;
                }
            }
        }));
    }

    /// Cancels the pending schedule. Idempotent; safe after natural expiry.
    pub fn stop(&self) {
        let mut inner = self.lock();
        if let Some(task) = inner.task.take() {
            task.abort();
        }
    }

    /// Stops without resetting remaining time.
    pub fn pause(&self) {
        self.stop();
    }

    /// Restarts a fresh countdown from the remaining time. No-op while
    /// running or once expired.
    pub fn resume(&self) {
        self.start();
    }

    /// Stops and restores the full original duration.
    pub fn reset(&self) {
        self.stop();
        let mut inner = self.lock();
        inner.remaining = inner.original;
        inner.expired = false;
    }

    pub fn remaining_secs(&self) -> u64 {
        self.lock().remaining
    }

    pub fn elapsed_secs(&self) -> u64 {
        let inner = self.lock();
        inner.original - inner.remaining
    }

    pub fn progress(&self) -> f64 {
        let inner = self.lock();
        if inner.original == 0 {
            return 1.0;
        }
        (inner.original - inner.remaining) as f64 / inner.original as f64
    }

    pub fn is_expired(&self) -> bool {
        self.lock().expired
    }

    pub fn is_running(&self) -> bool {
        self.lock().task.is_some()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.stop();
    }
}
