//! History sampler: periodic full snapshots into a bounded buffer.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use sysobserver_core::category::SnapshotCategory;
use sysobserver_core::history::{HistoryBuffer, HistorySeries, SnapshotSource, StatsSnapshot};
use sysobserver_core::types::SequenceId;
use sysobserver_events::NotificationSink;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::periodic::{PeriodicTask, Tick};

#[derive(Debug, Clone, Serialize)]
pub struct HistoryStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub next_sample_in_secs: Option<u64>,
    pub len: usize,
    pub capacity: usize,
    pub latest_sequence_id: Option<SequenceId>,
}

struct Sampler {
    source: Arc<dyn SnapshotSource>,
    categories: BTreeSet<SnapshotCategory>,
    /// Readiness gate awaited before the first sample.
    ready: Arc<dyn NotificationSink>,
    buffer: Mutex<HistoryBuffer>,
}

#[async_trait]
impl Tick for Sampler {
    async fn before_first(&self) {
        self.ready.wait_ready().await;
    }

    async fn tick(&self, _cancel: &CancellationToken) {
        let source = self.source.clone();
        let categories = self.categories.clone();
        let values = match tokio::task::spawn_blocking(move || source.collect(&categories)).await {
            Ok(Ok(values)) => values,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "History snapshot failed, sample skipped");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, "History snapshot task failed, sample skipped");
                return;
            }
        };

        let sequence_id = self.buffer.lock().await.push(Utc::now(), values);
        tracing::debug!(sequence_id, "History snapshot stored");
    }
}

/// Periodically appends host snapshots to a [`HistoryBuffer`].
///
/// The buffer survives stop/start; only eviction removes snapshots.
pub struct HistorySampler {
    sampler: Arc<Sampler>,
    task: PeriodicTask,
}

impl HistorySampler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        categories: BTreeSet<SnapshotCategory>,
        ready: Arc<dyn NotificationSink>,
        buffer: HistoryBuffer,
        interval: Duration,
    ) -> Self {
        Self {
            sampler: Arc::new(Sampler {
                source,
                categories,
                ready,
                buffer: Mutex::new(buffer),
            }),
            task: PeriodicTask::new("history", interval),
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    pub fn start(&self) -> bool {
        let started = self.task.start(self.sampler.clone());
        if started {
            tracing::info!(
                interval_secs = self.task.period().as_secs(),
                "History sampler started"
            );
        }
        started
    }

    pub async fn stop(&self) -> bool {
        let stopped = self.task.stop().await;
        if stopped {
            tracing::info!("History sampler stopped");
        }
        stopped
    }

    pub async fn restart(&self) {
        self.stop().await;
        self.start();
    }

    pub async fn status(&self) -> HistoryStatus {
        let buffer = self.sampler.buffer.lock().await;
        HistoryStatus {
            running: self.task.is_running(),
            interval_secs: self.task.period().as_secs(),
            next_sample_in_secs: self.task.time_until_next().map(|d| d.as_secs()),
            len: buffer.len(),
            capacity: buffer.capacity(),
            latest_sequence_id: buffer.latest().map(|s| s.sequence_id),
        }
    }

    pub async fn history(&self) -> Vec<StatsSnapshot> {
        self.sampler.buffer.lock().await.snapshots()
    }

    pub async fn series(&self) -> HistorySeries {
        self.sampler.buffer.lock().await.series()
    }

    /// Take one sample outside the periodic loop.
    ///
    /// Not serialized with the periodic tick: callers must not use it while
    /// the sampler is running.
    #[doc(hidden)]
    pub async fn sample_once(&self) {
        self.sampler.tick(&CancellationToken::new()).await;
    }
}
