#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sysobserver_agent::api::build_app_router;
use sysobserver_agent::api::cooldown::CommandCooldown;
use sysobserver_agent::api::state::AppState;
use sysobserver_agent::config::ObserverConfig;
use sysobserver_agent::info::{HostReport, HostReporter};
use sysobserver_agent::sampler::HistorySampler;
use sysobserver_agent::scheduler::EvaluationScheduler;
use sysobserver_core::category::{Category, SnapshotCategory};
use sysobserver_core::error::CoreError;
use sysobserver_core::history::{HistoryBuffer, SnapshotSource};
use sysobserver_core::limits::{BadnessOverrides, Check, ObservableLimit, Retrieve};
use sysobserver_core::registry::LimitRegistry;
use sysobserver_events::{NotificationSink, SinkError};

pub const MACHINE: &str = "test-box";

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Probe whose reading is set by the test. `None` fails the read.
#[derive(Clone, Default)]
pub struct Dial {
    value: Arc<Mutex<Option<f64>>>,
}

impl Dial {
    pub fn new(value: f64) -> Self {
        let dial = Self::default();
        dial.set(value);
        dial
    }

    pub fn set(&self, value: f64) {
        *self.value.lock().unwrap() = Some(value);
    }

    pub fn fail(&self) {
        *self.value.lock().unwrap() = None;
    }
}

impl Retrieve for Dial {
    fn retrieve(&self) -> Result<f64, CoreError> {
        self.value
            .lock()
            .unwrap()
            .ok_or_else(|| CoreError::retrieval("dial", "sensor offline"))
    }
}

/// Reading that blocks inside `retrieve` until [`Latch::open`] is called,
/// then reads `value`.
#[derive(Clone)]
pub struct Latch {
    value: f64,
    state: Arc<(Mutex<LatchState>, Condvar)>,
}

#[derive(Default)]
struct LatchState {
    entered: bool,
    open: bool,
}

impl Latch {
    pub fn new(value: f64) -> Self {
        Self {
            value,
            state: Arc::new((Mutex::new(LatchState::default()), Condvar::new())),
        }
    }

    pub fn open(&self) {
        let (lock, cvar) = &*self.state;
        lock.lock().unwrap().open = true;
        cvar.notify_all();
    }

    /// A read is blocked on the latch, or has been.
    pub fn entered(&self) -> bool {
        self.state.0.lock().unwrap().entered
    }
}

impl Retrieve for Latch {
    fn retrieve(&self) -> Result<f64, CoreError> {
        let (lock, cvar) = &*self.state;
        let mut state = lock.lock().unwrap();
        state.entered = true;
        while !state.open {
            state = cvar.wait(state).unwrap();
        }
        Ok(self.value)
    }
}

/// A `below 90` limit reading from `latch`, alerting on the first bad
/// sample.
pub fn latched_limit(id: &str, latch: &Latch) -> ObservableLimit {
    ObservableLimit::new(id, id.to_uppercase(), Arc::new(latch.clone()), Check::Below, 90.0)
        .with_unit("%")
}

/// Poll `condition` every 10 ms for up to 5 s.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

/// A `below 90` limit reading from `dial`.
pub fn limit(id: &str, dial: &Dial, badness: BadnessOverrides) -> ObservableLimit {
    ObservableLimit::new(id, id.to_uppercase(), Arc::new(dial.clone()), Check::Below, 90.0)
        .with_unit("%")
        .with_message("{name} at {current}{unit} (max {threshold}{unit})")
        .with_badness(badness)
}

pub fn registry(limits: impl IntoIterator<Item = ObservableLimit>) -> LimitRegistry {
    limits
        .into_iter()
        .collect::<Result<LimitRegistry, CoreError>>()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingSink {
    messages: Mutex<Vec<String>>,
    attempts: AtomicU32,
    failing: AtomicBool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.failing.store(true, Ordering::SeqCst);
        sink
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(&self, message: &str) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Closed("transport down".into()));
        }
        self.messages.lock().unwrap().push(message.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Snapshot source and host report
// ---------------------------------------------------------------------------

/// Returns `{"load": n}` with an increasing `n`, or fails when told to.
#[derive(Default)]
pub struct CountingSource {
    calls: AtomicU32,
    pub fail: AtomicBool,
}

impl SnapshotSource for CountingSource {
    fn collect(
        &self,
        _categories: &BTreeSet<SnapshotCategory>,
    ) -> Result<BTreeMap<String, f64>, CoreError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CoreError::Snapshot("host metrics unavailable".into()));
        }
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(BTreeMap::from([("load".to_string(), n as f64)]))
    }
}

pub struct FakeReporter;

impl HostReporter for FakeReporter {
    fn report(&self, machine_name: &str) -> Result<HostReport, CoreError> {
        Ok(HostReport {
            machine_name: machine_name.to_string(),
            uptime_secs: 3600,
            cpu_count: 4,
            mem_total_bytes: 8 * 1024 * 1024 * 1024,
            mem_used_bytes: 2 * 1024 * 1024 * 1024,
            mem_available_bytes: 6 * 1024 * 1024 * 1024,
            load_percent: [10.0, 20.0, 30.0],
            disks: Vec::new(),
            accelerators: Vec::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub fn test_config(cooldown: Duration) -> ObserverConfig {
    ObserverConfig {
        machine_name: MACHINE.to_string(),
        categories: BTreeSet::from([Category::Cpu]),
        check_interval: Duration::from_secs(300),
        history_interval: Duration::from_secs(300),
        webhook_url: None,
        autostart: false,
        command_cooldown: cooldown,
        host: "127.0.0.1".to_string(),
        port: 0,
    }
}

pub struct TestApp {
    pub router: axum::Router,
    pub dial: Dial,
    pub sink: Arc<RecordingSink>,
    pub observer: Arc<EvaluationScheduler>,
    pub history: Arc<HistorySampler>,
}

/// Router over one `cpu` limit (threshold 90, alert on first bad sample)
/// and a counting snapshot source.
pub fn build_test_app(cooldown: Duration) -> TestApp {
    let config = test_config(cooldown);
    let dial = Dial::new(10.0);
    let sink = Arc::new(RecordingSink::default());

    let observer = Arc::new(EvaluationScheduler::new(
        registry([limit("cpu", &dial, BadnessOverrides::DEFAULT)]),
        sink.clone(),
        MACHINE,
        config.check_interval,
    ));
    let history = Arc::new(HistorySampler::new(
        Arc::new(CountingSource::default()),
        BTreeSet::from([SnapshotCategory::Cpu]),
        sink.clone(),
        HistoryBuffer::new(3).unwrap(),
        config.history_interval,
    ));

    let state = AppState {
        config: Arc::new(config),
        observer: observer.clone(),
        history: history.clone(),
        reporter: Arc::new(FakeReporter),
        cooldown: Arc::new(CommandCooldown::new(cooldown)),
    };

    TestApp {
        router: build_app_router(state),
        dial,
        sink,
        observer,
        history,
    }
}
