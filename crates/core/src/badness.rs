//! Per-limit badness counters.
//!
//! Pure state machine, no I/O. Each failed check raises a limit's counter by
//! its increment, each passed check lowers it by its decrement. The counter
//! is clamped to `[0, effective threshold]`, so a flapping value has to fall
//! all the way back to zero before the limit counts as normal again.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::limits::BadnessOverrides;
use crate::types::LimitId;

/// Tracker-wide fallback used when increment and threshold are equal, i.e.
/// a limit without overrides alerts on its first bad sample.
pub const DEFAULT_THRESHOLD: u32 = 3;
pub const DEFAULT_INCREMENT: u32 = 3;
pub const DEFAULT_DECREMENT: u32 = 1;

/// Hysteresis parameters with every override resolved against the
/// tracker defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EffectiveBadness {
    pub increment: u32,
    pub decrement: u32,
    pub threshold: u32,
}

/// Tracker defaults. Each value must be at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BadnessDefaults {
    pub increment: u32,
    pub decrement: u32,
    pub threshold: u32,
}

impl Default for BadnessDefaults {
    fn default() -> Self {
        Self {
            increment: DEFAULT_INCREMENT,
            decrement: DEFAULT_DECREMENT,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

/// Gathers badness counters for limits with individual thresholds and
/// increments.
#[derive(Debug, Default)]
pub struct BadnessTracker {
    defaults: BadnessDefaults,
    counters: HashMap<LimitId, u32>,
}

impl BadnessTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a tracker with custom defaults. Zero values are raised to 1.
    pub fn with_defaults(defaults: BadnessDefaults) -> Self {
        Self {
            defaults: BadnessDefaults {
                increment: defaults.increment.max(1),
                decrement: defaults.decrement.max(1),
                threshold: defaults.threshold.max(1),
            },
            counters: HashMap::new(),
        }
    }

    pub fn defaults(&self) -> BadnessDefaults {
        self.defaults
    }

    /// Resolve a limit's overrides against the tracker defaults.
    pub fn resolve(&self, overrides: &BadnessOverrides) -> EffectiveBadness {
        EffectiveBadness {
            increment: overrides.increment.unwrap_or(self.defaults.increment),
            decrement: overrides.decrement.unwrap_or(self.defaults.decrement),
            threshold: overrides.threshold.unwrap_or(self.defaults.threshold),
        }
    }

    /// Current counter value; untracked limits read as 0.
    pub fn counter(&self, id: &str) -> u32 {
        self.counters.get(id).copied().unwrap_or(0)
    }

    /// Raise the counter and return `true` if the threshold is reached.
    pub fn increase(&mut self, id: &str, overrides: &BadnessOverrides) -> bool {
        let effective = self.resolve(overrides);
        let counter = self.counters.entry(id.to_string()).or_insert(0);
        *counter = counter
            .saturating_add(effective.increment)
            .min(effective.threshold);
        *counter >= effective.threshold
    }

    /// Lower the counter (floor 0) and return `true` if back to normal.
    ///
    /// Without overrides the tracker's default decrement is used.
    pub fn decrease(&mut self, id: &str, overrides: Option<&BadnessOverrides>) -> bool {
        let decrement = overrides
            .and_then(|o| o.decrement)
            .unwrap_or(self.defaults.decrement);
        if let Some(counter) = self.counters.get_mut(id) {
            *counter = counter.saturating_sub(decrement);
        }
        self.is_normal(id)
    }

    pub fn is_normal(&self, id: &str) -> bool {
        self.counter(id) == 0
    }

    pub fn threshold_reached(&self, id: &str, overrides: &BadnessOverrides) -> bool {
        self.counter(id) >= self.resolve(overrides).threshold
    }

    /// Reset one counter, or all tracked counters when `id` is `None`.
    pub fn reset(&mut self, id: Option<&str>) {
        match id {
            Some(id) => {
                if let Some(counter) = self.counters.get_mut(id) {
                    *counter = 0;
                }
            }
            None => self.counters.values_mut().for_each(|c| *c = 0),
        }
    }

    /// Snapshot of every tracked counter, ordered by limit id.
    pub fn dump(&self) -> BTreeMap<LimitId, u32> {
        self.counters
            .iter()
            .map(|(id, value)| (id.clone(), *value))
            .collect()
    }
}
