//! Handlers for the observer control surface.

use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use sysobserver_core::history::{HistorySeries, StatsSnapshot};
use sysobserver_core::types::LimitId;

use crate::api::error::{AppError, AppResult};
use crate::api::response::DataResponse;
use crate::api::state::AppState;
use crate::info::HostReport;
use crate::sampler::HistoryStatus;
use crate::scheduler::{LimitStatus, ObserverStatus};

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub reply: &'static str,
    pub machine_name: String,
    pub version: &'static str,
}

#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub report: HostReport,
    /// Monospace rendering of `report`.
    pub text: String,
}

/// Outcome of a start/stop/restart command.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    pub command: &'static str,
    /// Whether the command changed the running state.
    pub changed: bool,
    pub running: bool,
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// Liveness and host info
// ---------------------------------------------------------------------------

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// GET /ping
pub async fn ping(State(state): State<AppState>) -> Json<DataResponse<PingResponse>> {
    Json(DataResponse {
        data: PingResponse {
            reply: "pong",
            machine_name: state.config.machine_name.clone(),
            version: env!("CARGO_PKG_VERSION"),
        },
    })
}

/// GET /info
///
/// Collects a fresh host report on a blocking thread.
pub async fn info(State(state): State<AppState>) -> AppResult<Json<DataResponse<InfoResponse>>> {
    let reporter = state.reporter.clone();
    let machine_name = state.config.machine_name.clone();
    let report = tokio::task::spawn_blocking(move || reporter.report(&machine_name))
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))??;
    let text = report.render_text();
    Ok(Json(DataResponse {
        data: InfoResponse { report, text },
    }))
}

// ---------------------------------------------------------------------------
// Evaluation scheduler
// ---------------------------------------------------------------------------

/// POST /observer/start
pub async fn observer_start(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CommandResponse>>> {
    state.cooldown.acquire("observer/start")?;
    let changed = state.observer.start();
    Ok(command_response(
        "start",
        changed,
        true,
        if changed {
            "Observer started"
        } else {
            "Observer is already running"
        },
    ))
}

/// POST /observer/stop
///
/// Also resets every limit to normal.
pub async fn observer_stop(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CommandResponse>>> {
    state.cooldown.acquire("observer/stop")?;
    let changed = state.observer.stop().await;
    Ok(command_response(
        "stop",
        changed,
        false,
        if changed {
            "Observer stopped"
        } else {
            "Observer was not running"
        },
    ))
}

/// POST /observer/restart
pub async fn observer_restart(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CommandResponse>>> {
    state.cooldown.acquire("observer/restart")?;
    state.observer.restart().await;
    Ok(command_response("restart", true, true, "Observer restarted"))
}

/// GET /observer/status
pub async fn observer_status(State(state): State<AppState>) -> Json<DataResponse<ObserverStatus>> {
    Json(DataResponse {
        data: state.observer.status().await,
    })
}

/// GET /observer/badness
pub async fn observer_badness(
    State(state): State<AppState>,
) -> Json<DataResponse<BTreeMap<LimitId, u32>>> {
    Json(DataResponse {
        data: state.observer.dump_badness().await,
    })
}

/// GET /observer/limits
pub async fn observer_limits(State(state): State<AppState>) -> Json<DataResponse<Vec<LimitStatus>>> {
    Json(DataResponse {
        data: state.observer.dump_limits().await,
    })
}

// ---------------------------------------------------------------------------
// History sampler
// ---------------------------------------------------------------------------

/// POST /history/start
pub async fn history_start(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CommandResponse>>> {
    state.cooldown.acquire("history/start")?;
    let changed = state.history.start();
    Ok(command_response(
        "start",
        changed,
        true,
        if changed {
            "History sampler started"
        } else {
            "History sampler is already running"
        },
    ))
}

/// POST /history/stop
pub async fn history_stop(
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<CommandResponse>>> {
    state.cooldown.acquire("history/stop")?;
    let changed = state.history.stop().await;
    Ok(command_response(
        "stop",
        changed,
        false,
        if changed {
            "History sampler stopped"
        } else {
            "History sampler was not running"
        },
    ))
}

/// GET /history/status
pub async fn history_status(State(state): State<AppState>) -> Json<DataResponse<HistoryStatus>> {
    Json(DataResponse {
        data: state.history.status().await,
    })
}

/// GET /history
pub async fn history_snapshots(
    State(state): State<AppState>,
) -> Json<DataResponse<Vec<StatsSnapshot>>> {
    Json(DataResponse {
        data: state.history.history().await,
    })
}

/// GET /history/series
pub async fn history_series(State(state): State<AppState>) -> Json<DataResponse<HistorySeries>> {
    Json(DataResponse {
        data: state.history.series().await,
    })
}

fn command_response(
    command: &'static str,
    changed: bool,
    running: bool,
    message: &'static str,
) -> Json<DataResponse<CommandResponse>> {
    Json(DataResponse {
        data: CommandResponse {
            command,
            changed,
            running,
            message,
        },
    })
}
