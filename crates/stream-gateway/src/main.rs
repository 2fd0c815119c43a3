//! Stream Gateway
//!
//! Fans meeting bus events out to managed stream subscriptions.
//!
//! # Servers
//!
//! - Event bus subscriber (Redis pub/sub, `GW_REDIS_CHANNEL`)
//! - HTTP server for health and metrics (default: 0.0.0.0:8090)
//!
//! # Startup Flow
//!
//! 1. Initialize tracing
//! 2. Load configuration from environment
//! 3. Initialize Prometheus metrics recorder
//! 4. Build shared state (directory, caches, router)
//! 5. Start health HTTP server
//! 6. Start bus subscriber (marks ready once subscribed)
//! 7. Wait for shutdown signal

#![warn(clippy::pedantic)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use common::secret::ExposeSecret;
use stream_gateway::bus::BusSubscriber;
use stream_gateway::cache::VoiceStateCaches;
use stream_gateway::config::Config;
use stream_gateway::directory::ConnectionDirectory;
use stream_gateway::observability::{health_router, init_metrics_recorder, HealthState};
use stream_gateway::router::EventRouter;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How long the bus task gets to finish after cancellation.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;

    init_tracing(config.log_json);

    info!(
        gw_id = %config.gw_id,
        redis_channel = %config.redis_channel,
        health_bind_address = %config.health_bind_address,
        outbound_buffer = config.outbound_buffer,
        "Starting Stream Gateway"
    );

    // Must happen before any metrics are recorded
    let prometheus_handle = init_metrics_recorder()
        .map_err(|e| anyhow::anyhow!("failed to install Prometheus recorder: {e}"))?;

    let health_state = Arc::new(HealthState::new());
    let directory = Arc::new(ConnectionDirectory::new());
    let caches = Arc::new(VoiceStateCaches::new());
    let router = EventRouter::new(Arc::clone(&directory), Arc::clone(&caches));

    let shutdown_token = CancellationToken::new();

    // Bind before spawning to fail fast on bind errors
    let health_addr: SocketAddr = config
        .health_bind_address
        .parse()
        .with_context(|| format!("invalid health bind address {}", config.health_bind_address))?;
    let listener = tokio::net::TcpListener::bind(health_addr)
        .await
        .with_context(|| format!("failed to bind health server to {health_addr}"))?;

    let app = health_router(Arc::clone(&health_state), prometheus_handle);
    let health_shutdown_token = shutdown_token.child_token();
    tokio::spawn(async move {
        info!(addr = %health_addr, "Health server starting");
        let server = axum::serve(listener, app).with_graceful_shutdown(async move {
            health_shutdown_token.cancelled().await;
            info!("Health server shutting down");
        });
        if let Err(e) = server.await {
            error!(error = %e, "Health server failed");
        }
    });

    let subscriber = BusSubscriber::new(
        config.redis_url.expose_secret(),
        config.redis_channel.clone(),
        router,
        Arc::clone(&health_state),
    )
    .context("failed to create bus subscriber")?;
    let bus_task = tokio::spawn(subscriber.run(shutdown_token.child_token()));

    info!("Stream Gateway running - press Ctrl+C to shutdown");
    shutdown_signal().await;

    info!("Shutdown signal received, initiating graceful shutdown...");
    health_state.set_not_ready();
    shutdown_token.cancel();

    match tokio::time::timeout(SHUTDOWN_GRACE, bus_task).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Bus task ended abnormally"),
        Err(_) => warn!(
            grace_secs = SHUTDOWN_GRACE.as_secs(),
            "Bus task did not stop in time"
        ),
    }

    info!(
        connections = directory.len(),
        cached_meetings = caches.voice.meeting_count(),
        "Stream Gateway shutdown complete"
    );
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "stream_gateway=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
///
/// If a handler cannot be installed the error is logged and that signal is
/// never observed.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
