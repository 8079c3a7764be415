//! Controller — the evaluation-cycle entry point.
//!
//! Turns a trigger event into one full cycle (fetch → analyze → decide →
//! record → actuate) and always answers with a structured response; no
//! failure escapes `handle_trigger`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use scalesense_core::{Decision, ScalerConfig, ScalingAction, ScalingMode};
use scalesense_metrics::{Observation, ObservabilitySink, Unit};
use scalesense_signal::TelemetryStore;

use crate::engine::DecisionEngine;

/// Inbound trigger. Alarm deliveries carry a `source` tag; scheduled
/// ticks usually carry none.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerEvent {
    #[serde(default)]
    pub source: Option<String>,
}

impl TriggerEvent {
    pub fn scheduled() -> Self {
        Self::default()
    }

    pub fn from_source(source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
        }
    }
}

/// Result of one cycle: an HTTP-style status and a JSON body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResponse {
    pub status_code: u16,
    pub body: serde_json::Value,
}

impl CycleResponse {
    fn completed(decision: &Decision) -> anyhow::Result<Self> {
        let decision = serde_json::to_value(decision).context("failed to serialize decision")?;
        Ok(Self {
            status_code: 200,
            body: json!({
                "message": "Autoscaling evaluation completed",
                "decision": decision,
            }),
        })
    }

    fn failed(error: &anyhow::Error) -> Self {
        Self {
            status_code: 500,
            body: json!({
                "message": "Autoscaling evaluation failed",
                "error": format!("{error:#}"),
            }),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status_code == 200
    }

    /// The decision carried by a successful response.
    pub fn decision(&self) -> Option<Decision> {
        self.body
            .get("decision")
            .and_then(|d| serde_json::from_value(d.clone()).ok())
    }
}

/// What the actuator receives for an actionable decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaleRequest {
    pub cluster_name: String,
    pub namespace: String,
    pub deployment_name: String,
    pub action: ScalingAction,
    pub mode: ScalingMode,
    pub reasons: Vec<String>,
    pub min_replicas: u32,
    pub max_replicas: u32,
}

/// Callback that applies a scaling request to the workload.
///
/// The controller never talks to an orchestrator itself.
pub type ActuatorFn = Arc<dyn Fn(ScaleRequest) -> ActuatorFuture + Send + Sync>;

pub type ActuatorFuture = std::pin::Pin<
    Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>,
>;

pub const EXECUTION_SUCCESS_METRIC: &str = "ExecutionSuccess";
pub const EXECUTION_FAILURE_METRIC: &str = "ExecutionFailure";

/// Long-lived holder of the collaborator handles. Each cycle builds its
/// own engine from them.
#[derive(Clone)]
pub struct Controller {
    config: ScalerConfig,
    telemetry: Arc<dyn TelemetryStore>,
    sink: Arc<dyn ObservabilitySink>,
    actuator: Option<ActuatorFn>,
}

impl Controller {
    pub fn new(
        config: ScalerConfig,
        telemetry: Arc<dyn TelemetryStore>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        Self {
            config,
            telemetry,
            sink,
            actuator: None,
        }
    }

    /// Set the callback used to apply actionable decisions.
    pub fn with_actuator(mut self, actuator: ActuatorFn) -> Self {
        self.actuator = Some(actuator);
        self
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    /// Alarm-sourced triggers are reactive; everything else is proactive.
    pub fn classify_trigger(&self, event: &TriggerEvent) -> ScalingMode {
        match event.source.as_deref() {
            Some(source) if source == self.config.alarm_source => ScalingMode::Reactive,
            _ => ScalingMode::Proactive,
        }
    }

    /// Run one cycle and return its decision.
    pub async fn run_cycle(&self, trigger_mode: ScalingMode) -> anyhow::Result<Decision> {
        let engine = DecisionEngine::new(
            self.config.clone(),
            self.telemetry.clone(),
            self.sink.clone(),
        )
        .context("failed to build decision engine")?;

        let verdicts = engine.collect_metrics().await;
        let decision = engine
            .make_scaling_decision(&verdicts)
            .with_trigger_mode(trigger_mode);

        info!(
            action = %decision.action,
            mode = %decision.mode,
            trigger = %trigger_mode,
            summary = %decision.summary(),
            "scaling decision made"
        );

        let success = engine.execute_scaling_action(&decision).await;
        self.actuate(&decision).await;

        engine
            .publish_observability(
                EXECUTION_SUCCESS_METRIC,
                if success { 1.0 } else { 0.0 },
                Unit::Count,
            )
            .await;

        Ok(decision)
    }

    async fn actuate(&self, decision: &Decision) {
        let Some(actuator) = &self.actuator else {
            return;
        };
        if !decision.is_actionable() {
            return;
        }

        let request = ScaleRequest {
            cluster_name: self.config.cluster_name.clone(),
            namespace: self.config.namespace.clone(),
            deployment_name: self.config.deployment_name.clone(),
            action: decision.action,
            mode: decision.mode,
            reasons: decision.reasons.clone(),
            min_replicas: self.config.min_replicas,
            max_replicas: self.config.max_replicas,
        };
        if let Err(e) = actuator(request).await {
            warn!(
                deployment = %self.config.deployment_name,
                action = %decision.action,
                error = %e,
                "scaling actuation failed"
            );
        }
    }

    /// Entry point for one trigger. Never fails: errors become a 500
    /// response after a best-effort failure count is published.
    pub async fn handle_trigger(&self, event: &TriggerEvent) -> CycleResponse {
        let trigger_mode = self.classify_trigger(event);
        info!(mode = %trigger_mode, source = ?event.source, "autoscaler triggered");

        let result = self
            .run_cycle(trigger_mode)
            .await
            .and_then(|decision| CycleResponse::completed(&decision));

        match result {
            Ok(response) => response,
            Err(e) => {
                error!(error = %format!("{e:#}"), "autoscaling evaluation failed");
                let failure = Observation::new(
                    &self.config.observability_namespace,
                    EXECUTION_FAILURE_METRIC,
                    1.0,
                    Unit::Count,
                );
                let _ = self.sink.publish(&failure).await;
                CycleResponse::failed(&e)
            }
        }
    }

    /// Run proactive cycles on a fixed interval until shutdown.
    pub async fn run(
        &self,
        interval: Duration,
        mut shutdown: tokio::sync::watch::Receiver<bool>,
    ) {
        info!(interval_secs = interval.as_secs(), "proactive evaluation loop started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    let response = self.handle_trigger(&TriggerEvent::scheduled()).await;
                    if !response.is_success() {
                        warn!(status = response.status_code, "scheduled evaluation failed");
                    }
                }
                _ = shutdown.changed() => {
                    info!("proactive evaluation loop shutting down");
                    break;
                }
            }
        }
    }
}
