use std::sync::Arc;

use crate::api::cooldown::CommandCooldown;
use crate::config::ObserverConfig;
use crate::info::HostReporter;
use crate::sampler::HistorySampler;
use crate::scheduler::EvaluationScheduler;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; every field is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ObserverConfig>,
    pub observer: Arc<EvaluationScheduler>,
    pub history: Arc<HistorySampler>,
    /// Source of `/info` reports.
    pub reporter: Arc<dyn HostReporter>,
    /// Spacing of start/stop/restart commands.
    pub cooldown: Arc<CommandCooldown>,
}
