//! Long-running mode: REST API, proactive loop and telemetry retention.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, info};

use scalesense_api::{ApiState, build_router};
use scalesense_core::ScalerConfig;
use scalesense_engine::Controller;
use scalesense_metrics::{FanoutSink, LogSink, ObservabilitySink, PrometheusSink};
use scalesense_signal::InMemoryTelemetry;

/// Raw samples are kept for this many analysis windows.
const RETENTION_WINDOWS: i64 = 2;

pub async fn run(config: ScalerConfig, port: u16, interval_secs: u64) -> anyhow::Result<()> {
    config.validate().context("invalid configuration")?;
    info!("Scalesense daemon starting");

    // ── Collaborators ──────────────────────────────────────────

    let telemetry = InMemoryTelemetry::new();
    let prometheus = PrometheusSink::new();
    let sinks: Vec<Arc<dyn ObservabilitySink>> =
        vec![Arc::new(LogSink), Arc::new(prometheus.clone())];
    let sink = Arc::new(FanoutSink::new(sinks));

    let retention = chrono::Duration::minutes(
        config.metric_window_minutes as i64 * RETENTION_WINDOWS,
    );
    let controller = Controller::new(config, Arc::new(telemetry.clone()), sink)
        .with_actuator(crate::logging_actuator());
    info!(interval = interval_secs, "controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let loop_shutdown = shutdown_rx.clone();
    let retention_shutdown = shutdown_rx;

    // ── Background tasks ───────────────────────────────────────

    let interval = Duration::from_secs(interval_secs);

    let loop_controller = controller.clone();
    let loop_handle = tokio::spawn(async move {
        loop_controller.run(interval, loop_shutdown).await;
    });

    let retention_store = telemetry.clone();
    let retention_handle = tokio::spawn(async move {
        prune_loop(retention_store, retention, interval, retention_shutdown).await;
    });

    // ── API server ─────────────────────────────────────────────

    let router = build_router(ApiState::new(controller, telemetry, prometheus));
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    let _ = loop_handle.await;
    let _ = retention_handle.await;

    info!("Scalesense daemon stopped");
    Ok(())
}

async fn prune_loop(
    telemetry: InMemoryTelemetry,
    retention: chrono::Duration,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                let removed = telemetry.prune_before(Utc::now() - retention).await;
                if removed > 0 {
                    debug!(removed, "expired telemetry samples pruned");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
