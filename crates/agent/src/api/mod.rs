//! HTTP control surface.
//!
//! Provides [`build_app_router`] so both the binary and the integration
//! tests use the exact same middleware stack.

pub mod cooldown;
pub mod error;
pub mod handlers;
pub mod response;
pub mod state;

use std::time::Duration;

use axum::http::{HeaderName, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::api::state::AppState;

/// Upper bound for a single request. Covers a stop that waits for an
/// in-flight tick with webhook retries.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Build the `/api/v1` route tree.
///
/// ```text
/// /ping                    liveness with machine name
/// /info                    host information report
///
/// /observer/start          POST, cooldown
/// /observer/stop           POST, cooldown, resets limit state
/// /observer/restart        POST, cooldown
/// /observer/status         scheduler status and counters
/// /observer/badness        counter per limit
/// /observer/limits         per-limit state
///
/// /history                 buffered snapshots
/// /history/series          per-metric columns
/// /history/start           POST, cooldown
/// /history/stop            POST, cooldown
/// /history/status          sampler status
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/ping", get(handlers::ping))
        .route("/info", get(handlers::info))
        .route("/observer/start", post(handlers::observer_start))
        .route("/observer/stop", post(handlers::observer_stop))
        .route("/observer/restart", post(handlers::observer_restart))
        .route("/observer/status", get(handlers::observer_status))
        .route("/observer/badness", get(handlers::observer_badness))
        .route("/observer/limits", get(handlers::observer_limits))
        .route("/history", get(handlers::history_snapshots))
        .route("/history/series", get(handlers::history_series))
        .route("/history/start", post(handlers::history_start))
        .route("/history/stop", post(handlers::history_stop))
        .route("/history/status", get(handlers::history_status))
}

/// Build the full application [`Router`] with all middleware layers.
///
/// The middleware stack is applied bottom-up:
///
/// 1. Set request ID on incoming requests
/// 2. Structured request/response tracing
/// 3. Propagate request ID to response
/// 4. Request timeout
/// 5. Panic recovery (catch panics, return 500)
pub fn build_app_router(state: AppState) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            REQUEST_TIMEOUT,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .with_state(state)
}
