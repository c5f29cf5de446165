//! `sysobserver-agent`: host metric threshold alerting daemon.
//!
//! Evaluates CPU, memory, disk and accelerator limits on a fixed interval,
//! sends an alert when a limit stays out of bounds and a recovery once it
//! is back, keeps a week of metric snapshots and exposes both through a
//! small HTTP control surface. See [`ObserverConfig::from_env`] for the
//! environment variables.

use std::net::SocketAddr;
use std::sync::Arc;

use sysobserver_agent::accel::AcceleratorCollector;
use sysobserver_agent::api::cooldown::CommandCooldown;
use sysobserver_agent::api::state::AppState;
use sysobserver_agent::api::build_app_router;
use sysobserver_agent::config::ObserverConfig;
use sysobserver_agent::host::LocalHost;
use sysobserver_agent::sampler::HistorySampler;
use sysobserver_agent::scheduler::{startup_message, EvaluationScheduler};
use sysobserver_agent::snapshot::HostSnapshotSource;
use sysobserver_core::category::snapshot_categories;
use sysobserver_core::history::HistoryBuffer;
use sysobserver_core::registry;
use sysobserver_events::{FanoutSink, LogSink, NotificationSink, WebhookSink};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "sysobserver_agent=info,sysobserver_events=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ObserverConfig::from_env().unwrap_or_else(|e| {
        tracing::error!(error = %e, "Invalid configuration");
        std::process::exit(1);
    });

    tracing::info!(
        machine_name = %config.machine_name,
        categories = ?config.categories,
        check_interval_secs = config.check_interval.as_secs(),
        history_interval_secs = config.history_interval.as_secs(),
        "Starting sysobserver-agent",
    );

    // --- Host probes and limit registry ---
    let accel = Arc::new(AcceleratorCollector::new());
    tracing::info!(accelerators = accel.device_ids().len(), "Accelerator detection complete");
    let host = LocalHost::new(accel);

    let limits = registry::build(&config.categories, &host).unwrap_or_else(|e| {
        tracing::error!(error = %e, "Failed to build limit registry");
        std::process::exit(1);
    });
    tracing::info!(limits = limits.len(), "Limit registry built");

    // --- Notification sink ---
    let mut fanout = FanoutSink::new().with(Arc::new(LogSink::new()));
    if let Some(url) = &config.webhook_url {
        match WebhookSink::new(url.clone()) {
            Ok(webhook) => fanout = fanout.with(Arc::new(webhook)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to create webhook sink");
                std::process::exit(1);
            }
        }
    }
    let sink: Arc<dyn NotificationSink> = Arc::new(fanout);

    // --- Schedulers ---
    let observer = Arc::new(EvaluationScheduler::new(
        limits,
        sink.clone(),
        config.machine_name.clone(),
        config.check_interval,
    ));
    let history = Arc::new(HistorySampler::new(
        Arc::new(HostSnapshotSource::new(host.clone())),
        snapshot_categories(&config.categories),
        sink.clone(),
        HistoryBuffer::for_week(config.history_interval),
        config.history_interval,
    ));

    {
        let sink = sink.clone();
        let machine_name = config.machine_name.clone();
        tokio::spawn(async move {
            sink.wait_ready().await;
            if let Err(e) = sink.send(&startup_message(&machine_name)).await {
                tracing::warn!(error = %e, "Startup announcement failed");
            }
        });
    }

    if config.autostart {
        observer.start();
        history.start();
    }

    // --- HTTP control surface ---
    let addr = match config.host.parse() {
        Ok(ip) => SocketAddr::new(ip, config.port),
        Err(e) => {
            tracing::error!(host = %config.host, error = %e, "Invalid HOST address");
            std::process::exit(1);
        }
    };

    let state = AppState {
        config: Arc::new(config.clone()),
        observer: observer.clone(),
        history: history.clone(),
        reporter: Arc::new(host),
        cooldown: Arc::new(CommandCooldown::new(config.command_cooldown)),
    };
    let app = build_app_router(state);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Control surface listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
    }

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, stopping schedulers");
    observer.stop().await;
    history.stop().await;
    tracing::info!("Graceful shutdown complete");
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
