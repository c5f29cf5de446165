//! Capacity-bounded snapshot history.
//!
//! [`HistoryBuffer`] is a ring buffer of [`StatsSnapshot`]s: appending to a
//! full buffer evicts the oldest entry. Sequence ids are assigned on append
//! and stay contiguous among retained entries. Rendering charts from the
//! buffer is left to consumers; [`HistoryBuffer::series`] turns the rows
//! into per-metric columns for them.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::time::Duration;

use serde::Serialize;

use crate::category::SnapshotCategory;
use crate::error::CoreError;
use crate::types::{SequenceId, Timestamp};

/// Seconds in one week, the default history horizon.
pub const WEEK: Duration = Duration::from_secs(7 * 24 * 3600);

/// One full sample of all enabled metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub sequence_id: SequenceId,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
    pub values: BTreeMap<String, f64>,
}

/// Column view of the buffer for charting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistorySeries {
    pub sequence_ids: Vec<SequenceId>,
    pub timestamps: Vec<i64>,
    /// One column per metric key; `None` where a snapshot lacks the key.
    pub series: BTreeMap<String, Vec<Option<f64>>>,
}

/// Host collaborator producing a full reading of the enabled groups.
///
/// Either every requested reading succeeds or the whole snapshot fails;
/// partial snapshots are never returned.
pub trait SnapshotSource: Send + Sync {
    fn collect(
        &self,
        categories: &BTreeSet<SnapshotCategory>,
    ) -> Result<BTreeMap<String, f64>, CoreError>;
}

/// Number of snapshots covering `horizon` at the given sampling interval.
pub fn capacity_for(horizon: Duration, interval: Duration) -> usize {
    if interval.is_zero() {
        return 1;
    }
    let samples = horizon.as_secs_f64() / interval.as_secs_f64();
    (samples.round() as usize).max(1)
}

#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    capacity: usize,
    entries: VecDeque<StatsSnapshot>,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::Validation(
                "history capacity must be at least 1".into(),
            ));
        }
        Ok(Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        })
    }

    /// Buffer sized for one week of samples at `interval`.
    pub fn for_week(interval: Duration) -> Self {
        let capacity = capacity_for(WEEK, interval);
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence id the next appended snapshot will receive.
    pub fn next_sequence_id(&self) -> SequenceId {
        self.entries.back().map_or(0, |s| s.sequence_id + 1)
    }

    /// Append a new snapshot, evicting the oldest one if full. Returns the
    /// assigned sequence id.
    pub fn push(&mut self, timestamp: Timestamp, values: BTreeMap<String, f64>) -> SequenceId {
        let sequence_id = self.next_sequence_id();
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(StatsSnapshot {
            sequence_id,
            timestamp: timestamp.timestamp(),
            values,
        });
        sequence_id
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatsSnapshot> {
        self.entries.iter()
    }

    /// Oldest-first copy of the retained snapshots.
    pub fn snapshots(&self) -> Vec<StatsSnapshot> {
        self.entries.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&StatsSnapshot> {
        self.entries.back()
    }

    /// Convert the buffered rows into columns ordered by sequence id.
    pub fn series(&self) -> HistorySeries {
        let keys: BTreeSet<&String> = self.entries.iter().flat_map(|s| s.values.keys()).collect();

        let series = keys
            .into_iter()
            .map(|key| {
                let column: Vec<Option<f64>> = self
                    .entries
                    .iter()
                    .map(|s| s.values.get(key).copied())
                    .collect();
                (key.clone(), column)
            })
            .collect();

        HistorySeries {
            sequence_ids: self.entries.iter().map(|s| s.sequence_id).collect(),
            timestamps: self.entries.iter().map(|s| s.timestamp).collect(),
            series,
        }
    }
}
