//! scalesense-api — REST API for the Scalesense controller.
//!
//! Exposes the evaluation cycle to alarm webhooks, accepts pushed
//! telemetry samples into the in-memory store, and serves the latest
//! decision plus Prometheus exposition of published observations.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | POST | `/api/v1/evaluate` | Run one cycle for a trigger event |
//! | POST | `/api/v1/samples` | Ingest telemetry samples |
//! | GET | `/api/v1/decisions/latest` | Last successful decision |
//! | GET | `/metrics` | Prometheus exposition |
//! | GET | `/healthz` | Liveness |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::RwLock;

use scalesense_core::Decision;
use scalesense_engine::Controller;
use scalesense_metrics::PrometheusSink;
use scalesense_signal::InMemoryTelemetry;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub controller: Controller,
    pub telemetry: InMemoryTelemetry,
    pub prometheus: PrometheusSink,
    pub latest: Arc<RwLock<Option<Decision>>>,
}

impl ApiState {
    pub fn new(
        controller: Controller,
        telemetry: InMemoryTelemetry,
        prometheus: PrometheusSink,
    ) -> Self {
        Self {
            controller,
            telemetry,
            prometheus,
            latest: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember a decision as the latest one.
    pub async fn record_decision(&self, decision: Decision) {
        *self.latest.write().await = Some(decision);
    }
}

/// Build the complete API router (REST + metrics + health).
pub fn build_router(state: ApiState) -> Router {
    let api_routes = Router::new()
        .route("/evaluate", post(handlers::evaluate))
        .route("/samples", post(handlers::ingest_samples))
        .route("/decisions/latest", get(handlers::latest_decision))
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::prometheus_metrics).with_state(state))
        .route("/healthz", get(handlers::healthz))
}
