//! Observable limit definitions.
//!
//! An [`ObservableLimit`] pairs a metric probe with a threshold, a bounds
//! check, an alert message template and optional hysteresis overrides.
//! Limits are built once by the [`registry`](crate::registry) and are
//! read-only afterwards.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::LimitId;

// ---------------------------------------------------------------------------
// Probes
// ---------------------------------------------------------------------------

/// Produces the current value of a single metric.
///
/// Implementations are small value-holding objects bound to their target
/// (a mount path, a device index) at registry build time. Calls may block
/// on syscalls, so callers run them off the async executor.
pub trait Retrieve: Send + Sync {
    fn retrieve(&self) -> Result<f64, CoreError>;
}

impl<F> Retrieve for F
where
    F: Fn() -> Result<f64, CoreError> + Send + Sync,
{
    fn retrieve(&self) -> Result<f64, CoreError> {
        self()
    }
}

/// Shared handle to a probe.
pub type Probe = Arc<dyn Retrieve>;

// ---------------------------------------------------------------------------
// Check
// ---------------------------------------------------------------------------

/// Bounds check applied to `(current, threshold)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Check {
    /// Within bounds while `current < threshold` (load, usage, temperature).
    Below,
    /// Within bounds while `current > threshold` (free space).
    Above,
}

impl Check {
    /// Returns `true` if the value is within bounds.
    pub fn passes(self, current: f64, threshold: f64) -> bool {
        match self {
            Check::Below => current < threshold,
            Check::Above => current > threshold,
        }
    }
}

// ---------------------------------------------------------------------------
// Badness overrides
// ---------------------------------------------------------------------------

/// Per-limit hysteresis overrides. `None` falls back to tracker defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BadnessOverrides {
    pub increment: Option<u32>,
    pub decrement: Option<u32>,
    pub threshold: Option<u32>,
}

impl BadnessOverrides {
    /// Use tracker defaults for everything.
    pub const DEFAULT: BadnessOverrides = BadnessOverrides {
        increment: None,
        decrement: None,
        threshold: None,
    };

    pub fn new(increment: Option<u32>, decrement: Option<u32>, threshold: Option<u32>) -> Self {
        Self {
            increment,
            decrement,
            threshold,
        }
    }

    /// Every override that is present must be at least 1.
    pub fn validate(&self) -> Result<(), CoreError> {
        for (name, value) in [
            ("badness_increment", self.increment),
            ("badness_decrement", self.decrement),
            ("badness_threshold", self.threshold),
        ] {
            if value == Some(0) {
                return Err(CoreError::Validation(format!("{name} must be >= 1")));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ObservableLimit
// ---------------------------------------------------------------------------

/// A named metric limit under observation.
#[derive(Clone)]
pub struct ObservableLimit {
    pub id: LimitId,
    pub display_name: String,
    pub retrieve: Probe,
    pub check: Check,
    /// Display-only unit suffix (`%`, `GB`, `°C`).
    pub unit: String,
    pub threshold: f64,
    /// Alert text with `{current}`, `{threshold}`, `{unit}` and `{name}`
    /// placeholders.
    pub message_template: String,
    pub badness: BadnessOverrides,
}

impl fmt::Debug for ObservableLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservableLimit")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("check", &self.check)
            .field("unit", &self.unit)
            .field("threshold", &self.threshold)
            .field("badness", &self.badness)
            .finish_non_exhaustive()
    }
}

impl ObservableLimit {
    /// Create a limit with an empty unit, a generic message and tracker
    /// default hysteresis.
    pub fn new(
        id: impl Into<LimitId>,
        display_name: impl Into<String>,
        retrieve: Probe,
        check: Check,
        threshold: f64,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            retrieve,
            check,
            unit: String::new(),
            threshold,
            message_template:
                "**{name}** is out of bounds! (value: `{current}{unit}`, threshold: `{threshold}{unit}`)"
                    .to_string(),
            badness: BadnessOverrides::DEFAULT,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_message(mut self, template: impl Into<String>) -> Self {
        self.message_template = template.into();
        self
    }

    pub fn with_badness(mut self, badness: BadnessOverrides) -> Self {
        self.badness = badness;
        self
    }

    /// Check structural invariants: non-empty id, finite threshold, valid
    /// badness overrides.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.id.trim().is_empty() {
            return Err(CoreError::Validation("limit id must not be empty".into()));
        }
        if !self.threshold.is_finite() {
            return Err(CoreError::Validation(format!(
                "threshold of {} must be finite",
                self.id
            )));
        }
        self.badness.validate().map_err(|e| match e {
            CoreError::Validation(msg) => CoreError::Validation(format!("{}: {msg}", self.id)),
            other => other,
        })
    }

    /// Returns `true` if `current` is within bounds.
    pub fn is_within_bounds(&self, current: f64) -> bool {
        self.check.passes(current, self.threshold)
    }

    /// Fill the message template with the current reading.
    pub fn render_alert(&self, current: f64) -> String {
        self.message_template
            .replace("{current}", &format!("{current:.1}"))
            .replace("{threshold}", &format!("{:.1}", self.threshold))
            .replace("{unit}", &self.unit)
            .replace("{name}", &self.display_name)
    }

    pub fn render_recovery(&self) -> String {
        format!("*{} has recovered*", self.display_name)
    }
}
