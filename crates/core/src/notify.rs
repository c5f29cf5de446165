//! Edge-triggered alert and recovery decisions.
//!
//! [`NotificationPolicy`] wraps a [`BadnessTracker`] with a per-limit
//! "already notified" flag. A limit alerts once when its counter reaches the
//! effective threshold and stays silent until the counter has drained back
//! to zero, at which point exactly one recovery is emitted.
//!
//! ```text
//!   NORMAL --bad--> BAD_UNNOTIFIED --bad, threshold reached--> BAD_NOTIFIED
//!     ^                   |                                       |
//!     +---good, counter 0-+ (silent)        (recovery) good, counter 0
//! ```

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::badness::{BadnessDefaults, BadnessTracker};
use crate::limits::BadnessOverrides;
use crate::types::LimitId;

/// Outcome of feeding a failed check into the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// The caller must send the alert and then call
    /// [`NotificationPolicy::mark_notified`].
    SendAlert,
    NoAction,
}

/// Outcome of feeding a passed check into the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    SendRecovery,
    NoAction,
}

/// Observable per-limit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitState {
    Normal,
    BadUnnotified,
    BadNotified,
}

/// Badness counters plus notification flags.
#[derive(Debug, Default)]
pub struct NotificationPolicy {
    tracker: BadnessTracker,
    notified: HashMap<LimitId, bool>,
}

impl NotificationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_defaults(defaults: BadnessDefaults) -> Self {
        Self {
            tracker: BadnessTracker::with_defaults(defaults),
            notified: HashMap::new(),
        }
    }

    pub fn tracker(&self) -> &BadnessTracker {
        &self.tracker
    }

    pub fn is_notified(&self, id: &str) -> bool {
        self.notified.get(id).copied().unwrap_or(false)
    }

    /// Record a failed check.
    pub fn on_bad_sample(&mut self, id: &str, overrides: &BadnessOverrides) -> AlertDecision {
        let reached = self.tracker.increase(id, overrides);
        if reached && !self.is_notified(id) {
            AlertDecision::SendAlert
        } else {
            AlertDecision::NoAction
        }
    }

    /// Record a passed check.
    ///
    /// A limit that returns to normal without ever having alerted is cleared
    /// silently; there is nothing to recover from.
    pub fn on_good_sample(
        &mut self,
        id: &str,
        overrides: Option<&BadnessOverrides>,
    ) -> RecoveryDecision {
        let was_notified = self.is_notified(id);
        if !self.tracker.decrease(id, overrides) {
            return RecoveryDecision::NoAction;
        }

        if let Some(flag) = self.notified.get_mut(id) {
            *flag = false;
        }

        if was_notified {
            RecoveryDecision::SendRecovery
        } else {
            RecoveryDecision::NoAction
        }
    }

    /// Mark a limit as notified. Called by the sender once the alert has
    /// been handed to the sink.
    pub fn mark_notified(&mut self, id: &str) {
        self.notified.insert(id.to_string(), true);
    }

    /// Reset counter and flag of one limit, or of all limits.
    pub fn reset(&mut self, id: Option<&str>) {
        self.tracker.reset(id);
        match id {
            Some(id) => {
                if let Some(flag) = self.notified.get_mut(id) {
                    *flag = false;
                }
            }
            None => self.notified.values_mut().for_each(|f| *f = false),
        }
    }

    pub fn state(&self, id: &str) -> LimitState {
        if self.tracker.is_normal(id) {
            LimitState::Normal
        } else if self.is_notified(id) {
            LimitState::BadNotified
        } else {
            LimitState::BadUnnotified
        }
    }

    pub fn dump_badness(&self) -> BTreeMap<LimitId, u32> {
        self.tracker.dump()
    }
}
