//! REST API handlers.
//!
//! Evaluation responses carry the cycle's own status code and body; every
//! other route uses the `ApiResponse` envelope.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use scalesense_core::MetricIdentity;
use scalesense_engine::TriggerEvent;

use crate::ApiState;

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

/// One pushed telemetry sample.
#[derive(Debug, Clone, Deserialize)]
pub struct SampleInput {
    #[serde(flatten)]
    pub identity: MetricIdentity,
    pub value: f64,
    /// Defaults to the time of ingestion.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

// ── Evaluation ─────────────────────────────────────────────────

/// POST /api/v1/evaluate
pub async fn evaluate(
    State(state): State<ApiState>,
    Json(event): Json<TriggerEvent>,
) -> impl IntoResponse {
    let response = state.controller.handle_trigger(&event).await;

    if let Some(decision) = response.decision() {
        state.record_decision(decision).await;
    }

    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(response.body))
}

/// GET /api/v1/decisions/latest
pub async fn latest_decision(State(state): State<ApiState>) -> impl IntoResponse {
    match state.latest.read().await.clone() {
        Some(decision) => ApiResponse::ok(decision).into_response(),
        None => error_response("no decision recorded yet", StatusCode::NOT_FOUND).into_response(),
    }
}

// ── Telemetry ──────────────────────────────────────────────────

/// POST /api/v1/samples
pub async fn ingest_samples(
    State(state): State<ApiState>,
    Json(samples): Json<Vec<SampleInput>>,
) -> impl IntoResponse {
    if let Some(bad) = samples
        .iter()
        .find(|s| s.identity.namespace.is_empty() || s.identity.metric_name.is_empty())
    {
        let msg = format!("sample for '{}' is missing a namespace or metric name", bad.identity);
        return error_response(&msg, StatusCode::BAD_REQUEST).into_response();
    }
    if samples.iter().any(|s| !s.value.is_finite()) {
        return error_response("sample values must be finite", StatusCode::BAD_REQUEST)
            .into_response();
    }

    let now = Utc::now();
    for sample in &samples {
        state
            .telemetry
            .record(&sample.identity, sample.timestamp.unwrap_or(now), sample.value)
            .await;
    }
    debug!(accepted = samples.len(), "telemetry samples ingested");

    ApiResponse::ok(serde_json::json!({
        "accepted": samples.len(),
        "series": state.telemetry.series_count().await,
    }))
    .into_response()
}

// ── Prometheus ─────────────────────────────────────────────────

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.prometheus.render().await;
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
