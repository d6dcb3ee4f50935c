/// scheduler.rs — Cancellable fixed-interval polling
///
/// CONTRACT:
///   start(producer, interval) → (PollHandle, Ticks)
///     - producer runs once immediately, then every `interval`
///     - every invocation is spawned; a slow round trip never delays the
///       next tick, so outcomes may arrive out of order
///     - invocation k carries sequence number k (1-based, monotonic); the
///       consumer uses it to discard stale outcomes
///     - a failed invocation is forwarded as `Err` and the schedule continues
///   stop(handle)
///     - synchronous and idempotent; no invocation starts and no outcome is
///       forwarded once it returns. A stopped schedule cannot be resumed.
///
/// All timing uses tokio time, so tests run against a paused clock.
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::sync::{mpsc, Notify};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::error::FetchError;

/// tokio rejects a zero period.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Outcome of one producer invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick<T> {
    pub seq:     u64,
    pub outcome: Result<T, FetchError>,
}

pub type Ticks<T> = mpsc::UnboundedReceiver<Tick<T>>;

/// Cloneable "poll now" button for one schedule.
#[derive(Clone)]
pub struct PollTrigger {
    stopped: Arc<AtomicBool>,
    /// Shared while an outcome is forwarded, exclusive while stopping.
    gate:    Arc<RwLock<()>>,
    wake:    Arc<Notify>,
}

impl PollTrigger {
    /// Request one extra invocation right away. No-op once stopped.
    pub fn poll_now(&self) {
        if !self.stopped.load(Ordering::Acquire) {
            self.wake.notify_one();
        }
    }

    fn forward<T>(&self, tx: &mpsc::UnboundedSender<Tick<T>>, tick: Tick<T>) {
        let _open = self.gate.read().unwrap_or_else(PoisonError::into_inner);
        if self.stopped.load(Ordering::Acquire) {
            return;
        }
        // Receiver gone means the consumer shut down; nothing to do.
        let _ = tx.send(tick);
    }

    /// Returns false if the schedule was already stopped.
    fn close(&self) -> bool {
        let _closing = self.gate.write().unwrap_or_else(PoisonError::into_inner);
        !self.stopped.swap(true, Ordering::AcqRel)
    }
}

/// Owner of a running schedule. Dropping it stops the schedule.
pub struct PollHandle {
    name:    String,
    trigger: PollTrigger,
    driver:  JoinHandle<()>,
}

impl PollHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn poll_now(&self) {
        self.trigger.poll_now();
    }

    pub fn trigger(&self) -> PollTrigger {
        self.trigger.clone()
    }

    pub fn is_stopped(&self) -> bool {
        self.trigger.stopped.load(Ordering::Acquire)
    }

    pub fn stop(&self) {
        if !self.trigger.close() {
            return;
        }
        // Aborting the driver drops its JoinSet, which aborts every
        // in-flight invocation with it.
        self.driver.abort();
        debug!("poll[{}] stopped", self.name);
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawns schedules on the ambient tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct PollingScheduler;

impl PollingScheduler {
    pub fn new() -> Self {
        Self
    }

    pub fn start<T, F, Fut>(&self, name: &str, interval: Duration, producer: F) -> (PollHandle, Ticks<T>)
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let trigger = PollTrigger {
            stopped: Arc::new(AtomicBool::new(false)),
            gate:    Arc::new(RwLock::new(())),
            wake:    Arc::new(Notify::new()),
        };

        let period = if interval < MIN_INTERVAL {
            warn!("poll[{name}] interval {interval:?} too small, using {MIN_INTERVAL:?}");
            MIN_INTERVAL
        } else {
            interval
        };

        let driver = tokio::spawn(drive(name.to_owned(), period, producer, trigger.clone(), tx));
        debug!("poll[{name}] started every {period:?}");

        let handle = PollHandle { name: name.to_owned(), trigger, driver };
        (handle, rx)
    }

    pub fn stop(&self, handle: &PollHandle) {
        handle.stop();
    }
}

async fn drive<T, F, Fut>(
    name:         String,
    period:       Duration,
    mut producer: F,
    trigger:      PollTrigger,
    tx:           mpsc::UnboundedSender<Tick<T>>,
) where
    T: Send + 'static,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut inflight = JoinSet::new();
    let mut seq = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = trigger.wake.notified() => {}
            Some(_) = inflight.join_next(), if !inflight.is_empty() => continue,
        }

        if trigger.stopped.load(Ordering::Acquire) {
            break;
        }

        seq += 1;
        let fut = producer();
        let tx = tx.clone();
        let gate = trigger.clone();
        let name = name.clone();
        inflight.spawn(async move {
            let outcome = fut.await;
            if let Err(e) = &outcome {
                warn!("poll[{name}] #{seq} failed: {e}");
            }
            gate.forward(&tx, Tick { seq, outcome });
        });
    }
}
