//! Evaluation scheduler.
//!
//! Every tick reads each registered limit, feeds the result through the
//! [`NotificationPolicy`] and hands alerts and recoveries to the
//! notification sink. Limits are evaluated one after another; a failed
//! read skips that limit for the tick and leaves its state untouched.
//!
//! State lives behind a `tokio::sync::Mutex` so status queries from the
//! HTTP surface see a consistent view. The lock is never held across a
//! probe read or a sink send.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sysobserver_core::badness::{BadnessDefaults, EffectiveBadness};
use sysobserver_core::limits::ObservableLimit;
use sysobserver_core::notify::{AlertDecision, LimitState, NotificationPolicy, RecoveryDecision};
use sysobserver_core::registry::LimitRegistry;
use sysobserver_core::stats::ObserverStats;
use sysobserver_core::table::render_kv;
use sysobserver_core::types::LimitId;
use sysobserver_events::NotificationSink;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::periodic::{PeriodicTask, Tick};

/// Suffix identifying the machine in every outgoing message.
pub fn machine_tag(machine_name: &str) -> String {
    format!("`@{machine_name}`")
}

/// Message sent once when the daemon comes up.
pub fn startup_message(machine_name: &str) -> String {
    format!("Running observer on `{machine_name}` ...")
}

// ---------------------------------------------------------------------------
// Status views
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ObserverStatus {
    pub running: bool,
    pub machine_name: String,
    pub interval_secs: u64,
    /// Seconds until the next tick; `None` while stopped.
    pub next_check_in_secs: Option<u64>,
    pub limits: usize,
    pub stats: ObserverStats,
    /// Monospace rendering of the fields above.
    pub text: String,
}

/// Status line, counter block and next-check line.
pub fn render_status(
    machine_name: &str,
    running: bool,
    next_check_in_secs: Option<u64>,
    stats: &ObserverStats,
) -> String {
    let state = if running { "running" } else { "stopped" };
    let next = next_check_in_secs.map_or_else(|| "?".to_string(), |secs| format!("{secs}s"));
    let counters = render_kv(stats.as_rows(), true).unwrap_or_default();
    format!("**Observer status for** `{machine_name}` [`{state}`]\n{counters}\nNext check in `{next}`")
}

#[derive(Debug, Clone, Serialize)]
pub struct LimitStatus {
    pub limit_id: LimitId,
    pub display_name: String,
    pub threshold: f64,
    pub unit: String,
    pub counter: u32,
    pub effective: EffectiveBadness,
    /// Counter has reached the effective threshold.
    pub currently_exceeded: bool,
    pub notified: bool,
    pub state: LimitState,
}

// ---------------------------------------------------------------------------
// Evaluator
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct EvaluationState {
    policy: NotificationPolicy,
    stats: ObserverStats,
}

struct Evaluator {
    registry: LimitRegistry,
    sink: Arc<dyn NotificationSink>,
    machine_name: String,
    state: Mutex<EvaluationState>,
}

impl Evaluator {
    async fn evaluate(&self, limit: &ObservableLimit) {
        let probe = limit.retrieve.clone();
        let current = match tokio::task::spawn_blocking(move || probe.retrieve()).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                tracing::warn!(limit_id = %limit.id, error = %e, "Limit retrieval failed");
                self.state.lock().await.stats.retrieval_failures += 1;
                return;
            }
            Err(e) => {
                tracing::warn!(limit_id = %limit.id, error = %e, "Limit retrieval task failed");
                self.state.lock().await.stats.retrieval_failures += 1;
                return;
            }
        };

        if limit.is_within_bounds(current) {
            self.on_good(limit).await;
        } else {
            self.on_bad(limit, current).await;
        }
    }

    async fn on_bad(&self, limit: &ObservableLimit, current: f64) {
        let decision = {
            let mut state = self.state.lock().await;
            state.stats.record_breach(&limit.id);
            state.policy.on_bad_sample(&limit.id, &limit.badness)
        };
        tracing::debug!(limit_id = %limit.id, current, threshold = limit.threshold, "Limit exceeded");

        if decision != AlertDecision::SendAlert {
            return;
        }

        let message = format!(
            "{} {}",
            limit.render_alert(current),
            machine_tag(&self.machine_name)
        );
        if let Err(e) = self.sink.send(&message).await {
            tracing::warn!(limit_id = %limit.id, error = %e, "Alert delivery failed");
        }

        let mut state = self.state.lock().await;
        state.policy.mark_notified(&limit.id);
        state.stats.alerts_sent += 1;
        tracing::info!(limit_id = %limit.id, current, "Alert sent");
    }

    async fn on_good(&self, limit: &ObservableLimit) {
        let decision = self
            .state
            .lock()
            .await
            .policy
            .on_good_sample(&limit.id, Some(&limit.badness));

        if decision != RecoveryDecision::SendRecovery {
            return;
        }

        let message = format!(
            "{} {}",
            limit.render_recovery(),
            machine_tag(&self.machine_name)
        );
        if let Err(e) = self.sink.send(&message).await {
            tracing::warn!(limit_id = %limit.id, error = %e, "Recovery delivery failed");
        }

        self.state.lock().await.stats.recoveries_sent += 1;
        tracing::info!(limit_id = %limit.id, "Recovery sent");
    }
}

#[async_trait]
impl Tick for Evaluator {
    async fn before_first(&self) {
        self.sink.wait_ready().await;
    }

    async fn tick(&self, cancel: &CancellationToken) {
        tracing::debug!(limits = self.registry.len(), "Evaluating limits");
        for limit in self.registry.iter() {
            if cancel.is_cancelled() {
                tracing::debug!("Evaluation cancelled mid-tick");
                return;
            }
            self.evaluate(limit).await;
        }
        self.state.lock().await.stats.ticks += 1;
    }
}

// ---------------------------------------------------------------------------
// EvaluationScheduler
// ---------------------------------------------------------------------------

/// Periodically evaluates every limit of a registry.
pub struct EvaluationScheduler {
    evaluator: Arc<Evaluator>,
    task: Arc<PeriodicTask>,
}

impl EvaluationScheduler {
    pub fn new(
        registry: LimitRegistry,
        sink: Arc<dyn NotificationSink>,
        machine_name: impl Into<String>,
        interval: Duration,
    ) -> Self {
        Self::with_defaults(registry, sink, machine_name, interval, BadnessDefaults::default())
    }

    /// Like [`EvaluationScheduler::new`] with custom tracker defaults.
    pub fn with_defaults(
        registry: LimitRegistry,
        sink: Arc<dyn NotificationSink>,
        machine_name: impl Into<String>,
        interval: Duration,
        defaults: BadnessDefaults,
    ) -> Self {
        let evaluator = Evaluator {
            registry,
            sink,
            machine_name: machine_name.into(),
            state: Mutex::new(EvaluationState {
                policy: NotificationPolicy::with_defaults(defaults),
                stats: ObserverStats::default(),
            }),
        };
        Self {
            evaluator: Arc::new(evaluator),
            task: Arc::new(PeriodicTask::new("evaluation", interval)),
        }
    }

    pub fn registry(&self) -> &LimitRegistry {
        &self.evaluator.registry
    }

    pub fn machine_name(&self) -> &str {
        &self.evaluator.machine_name
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Begin ticking. Returns `false` if already running.
    pub fn start(&self) -> bool {
        let started = self.task.start(self.evaluator.clone());
        if started {
            tracing::info!(limits = self.evaluator.registry.len(), "Evaluation scheduler started");
        }
        started
    }

    /// Stop ticking and reset every limit to normal. Returns `false` if it
    /// was not running; the reset happens either way.
    ///
    /// The stop runs on its own task: dropping this future (a request
    /// timeout, say) still lets the in-flight tick finish and the reset run.
    pub async fn stop(&self) -> bool {
        let task = self.task.clone();
        let evaluator = self.evaluator.clone();
        let stopping = tokio::spawn(async move {
            let stopped = task.stop().await;
            evaluator.state.lock().await.policy.reset(None);
            if stopped {
                tracing::info!("Evaluation scheduler stopped");
            }
            stopped
        });
        match stopping.await {
            Ok(stopped) => stopped,
            Err(e) => {
                tracing::error!(error = %e, "Evaluation scheduler stop failed");
                false
            }
        }
    }

    pub async fn restart(&self) {
        self.stop().await;
        self.start();
    }

    pub async fn status(&self) -> ObserverStatus {
        let stats = self.evaluator.state.lock().await.stats.clone();
        let running = self.task.is_running();
        let next_check_in_secs = self.task.time_until_next().map(|d| d.as_secs());
        let machine_name = self.evaluator.machine_name.clone();
        ObserverStatus {
            text: render_status(&machine_name, running, next_check_in_secs, &stats),
            running,
            machine_name,
            interval_secs: self.task.period().as_secs(),
            next_check_in_secs,
            limits: self.evaluator.registry.len(),
            stats,
        }
    }

    pub async fn dump_badness(&self) -> BTreeMap<LimitId, u32> {
        self.evaluator.state.lock().await.policy.dump_badness()
    }

    pub async fn dump_limits(&self) -> Vec<LimitStatus> {
        let state = self.evaluator.state.lock().await;
        let tracker = state.policy.tracker();
        self.evaluator
            .registry
            .iter()
            .map(|limit| LimitStatus {
                limit_id: limit.id.clone(),
                display_name: limit.display_name.clone(),
                threshold: limit.threshold,
                unit: limit.unit.clone(),
                counter: tracker.counter(&limit.id),
                effective: tracker.resolve(&limit.badness),
                currently_exceeded: tracker.threshold_reached(&limit.id, &limit.badness),
                notified: state.policy.is_notified(&limit.id),
                state: state.policy.state(&limit.id),
            })
            .collect()
    }

    /// Run a single evaluation pass outside the periodic loop.
    ///
    /// Not serialized with the periodic tick: callers must not use it while
    /// the scheduler is running.
    #[doc(hidden)]
    pub async fn evaluate_once(&self) {
        self.evaluator.tick(&CancellationToken::new()).await;
    }
}
