//! Fixed-interval background task with explicit start/stop.
//!
//! [`PeriodicTask`] owns the cancellation token, the join handle and the
//! next-due instant of one background loop. The loop awaits the job's
//! readiness hook once, ticks immediately, then every `period`. Stopping
//! cancels the pending wait and waits for an in-flight tick to return;
//! ticks receive the token so they can bail out between units of work.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Work driven by a [`PeriodicTask`].
#[async_trait]
pub trait Tick: Send + Sync {
    /// Awaited once before the first tick.
    async fn before_first(&self) {}

    async fn tick(&self, cancel: &CancellationToken);
}

struct Running {
    generation: u64,
    cancel: CancellationToken,
    /// Cancelled by the loop itself once it has returned.
    exited: CancellationToken,
    handle: JoinHandle<()>,
}

impl Running {
    fn is_live(&self) -> bool {
        !self.exited.is_cancelled()
    }
}

pub struct PeriodicTask {
    name: &'static str,
    period: Duration,
    running: Mutex<Option<Running>>,
    generation: AtomicU64,
    next_due: Arc<Mutex<Option<Instant>>>,
}

impl PeriodicTask {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            running: Mutex::new(None),
            generation: AtomicU64::new(0),
            next_due: Arc::new(Mutex::new(None)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Spawn the loop. Returns `false` if it is already running, including
    /// while a stopped loop is still finishing its last tick.
    pub fn start(&self, job: Arc<dyn Tick>) -> bool {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.as_ref().is_some_and(Running::is_live) {
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        let exited = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.name,
            self.period,
            job,
            cancel.clone(),
            exited.clone(),
            self.next_due.clone(),
        ));
        *running = Some(Running {
            generation,
            cancel,
            exited,
            handle,
        });
        true
    }

    /// Cancel the loop and wait for it to exit. Returns `false` if it was
    /// not running.
    ///
    /// Dropping the returned future leaves the loop cancelled but
    /// registered until it exits, so a later [`start`](Self::start) cannot
    /// overlap its last tick.
    pub async fn stop(&self) -> bool {
        let (generation, cancel, exited) = {
            let running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            let Some(r) = running.as_ref() else {
                return false;
            };
            (r.generation, r.cancel.clone(), r.exited.clone())
        };
        let was_running = !exited.is_cancelled();
        cancel.cancel();
        exited.cancelled().await;

        let finished = {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            if running.as_ref().is_some_and(|r| r.generation == generation) {
                running.take()
            } else {
                None
            }
        };
        if let Some(Running { handle, .. }) = finished {
            if let Err(e) = handle.await {
                tracing::error!(task = self.name, error = %e, "Periodic task ended abnormally");
            }
        }
        set_next_due(&self.next_due, None);
        was_running
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(Running::is_live)
    }

    /// Time until the next tick, `None` while stopped or before the first
    /// tick.
    pub fn time_until_next(&self) -> Option<Duration> {
        if !self.is_running() {
            return None;
        }
        let due = (*self.next_due.lock().unwrap_or_else(PoisonError::into_inner))?;
        Some(due.saturating_duration_since(Instant::now()))
    }
}

fn set_next_due(slot: &Mutex<Option<Instant>>, value: Option<Instant>) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = value;
}

async fn run_loop(
    name: &'static str,
    period: Duration,
    job: Arc<dyn Tick>,
    cancel: CancellationToken,
    exited: CancellationToken,
    next_due: Arc<Mutex<Option<Instant>>>,
) {
    let _exited = exited.drop_guard();

    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = job.before_first() => {}
    }

    tracing::info!(task = name, interval_secs = period.as_secs(), "Periodic task started");

    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(task = name, "Periodic task stopping");
                break;
            }
            _ = interval.tick() => {
                set_next_due(&next_due, Some(Instant::now() + period));
                job.tick(&cancel).await;
            }
        }
    }

    set_next_due(&next_due, None);
}
