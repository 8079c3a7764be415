//! Decision engine — correlates per-metric verdicts into one scaling action.
//!
//! One engine is built per evaluation cycle from injected collaborators
//! (telemetry store, observability sink). It holds no mutable state, so
//! overlapping cycles never share anything but those handles.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use scalesense_core::{
    ConfigResult, Decision, Dimension, MetricKind, MetricSnapshot, ScalerConfig, ScalingAction,
    ScalingMode, Verdicts,
};
use scalesense_metrics::{Observation, ObservabilitySink, Unit};
use scalesense_signal::{AnalyzerThresholds, SignalAnalyzer, Statistic, TelemetryStore};

use crate::evaluator::{MetricEvaluator, Vote};

/// Votes needed on one side before the engine acts.
pub const CORRELATION_THRESHOLD: u32 = 2;

/// Name of the observation carrying the signed decision.
pub const SCALING_DECISION_METRIC: &str = "ScalingDecision";

pub struct DecisionEngine {
    config: ScalerConfig,
    telemetry: Arc<dyn TelemetryStore>,
    sink: Arc<dyn ObservabilitySink>,
}

impl DecisionEngine {
    /// Build an engine for one cycle. Fails on an unusable config.
    pub fn new(
        config: ScalerConfig,
        telemetry: Arc<dyn TelemetryStore>,
        sink: Arc<dyn ObservabilitySink>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            telemetry,
            sink,
        })
    }

    pub fn config(&self) -> &ScalerConfig {
        &self.config
    }

    fn analyzer(&self, kind: MetricKind) -> SignalAnalyzer {
        SignalAnalyzer::new(
            self.config.metric_identity(kind),
            self.telemetry.clone(),
            AnalyzerThresholds::from(&self.config),
        )
    }

    /// Analyze the four metric series over the configured window.
    ///
    /// Series are fetched concurrently; a series with no data degrades to
    /// a stable, non-signal verdict.
    pub async fn collect_metrics(&self) -> Verdicts {
        let window = self.config.metric_window_minutes;
        let cpu = self.analyzer(MetricKind::Cpu);
        let memory = self.analyzer(MetricKind::Memory);
        let latency = self.analyzer(MetricKind::Latency);
        let inference = self.analyzer(MetricKind::Inference);

        let (cpu, memory, latency, inference) = tokio::join!(
            cpu.analyze(window, Statistic::Average),
            memory.analyze(window, Statistic::Average),
            latency.analyze(window, Statistic::Average),
            inference.analyze(window, Statistic::Average),
        );

        let verdicts: Verdicts = [
            (MetricKind::Cpu, cpu),
            (MetricKind::Memory, memory),
            (MetricKind::Latency, latency),
            (MetricKind::Inference, inference),
        ]
        .into_iter()
        .collect();

        debug!(
            metrics = verdicts.len(),
            signals = verdicts.values().filter(|v| v.is_signal).count(),
            "metrics collected"
        );
        verdicts
    }

    /// Correlate verdicts into a decision.
    ///
    /// Noise-classified metrics never vote. The action needs at least
    /// `CORRELATION_THRESHOLD` votes on one side, scale-up winning ties.
    pub fn make_scaling_decision(&self, verdicts: &Verdicts) -> Decision {
        let mut details = Vec::new();
        let mut metrics_evaluated = BTreeMap::new();
        let mut mode = ScalingMode::Proactive;
        let mut scale_up: u32 = 0;
        let mut scale_down: u32 = 0;

        for (kind, verdict) in verdicts {
            metrics_evaluated.insert(*kind, MetricSnapshot::from(verdict));

            if !verdict.is_signal {
                details.push(format!("{kind}: filtered as noise (variation below threshold)"));
                continue;
            }

            let evaluation = MetricEvaluator::for_kind(*kind).evaluate(verdict);
            match evaluation.vote {
                Vote::Up => scale_up += 1,
                Vote::Down => scale_down += 1,
                Vote::Abstain => {}
            }
            if evaluation.escalate {
                mode = ScalingMode::Reactive;
            }
            if let Some(reason) = evaluation.reason {
                debug!(metric = %kind, %reason, "metric voted");
                details.push(reason);
            }
        }

        let (action, summary) = if scale_up >= CORRELATION_THRESHOLD {
            (
                ScalingAction::ScaleUp,
                format!("Multi-metric evaluation: {scale_up} scale-up signals detected"),
            )
        } else if scale_down >= CORRELATION_THRESHOLD {
            (
                ScalingAction::ScaleDown,
                format!("Multi-metric evaluation: {scale_down} scale-down signals detected"),
            )
        } else {
            (
                ScalingAction::NoAction,
                "No correlated signals detected for scaling action".to_string(),
            )
        };

        let mut reasons = Vec::with_capacity(details.len() + 1);
        reasons.push(summary);
        reasons.extend(details);

        Decision {
            action,
            reasons,
            mode,
            metrics_evaluated,
            trigger_mode: ScalingMode::Proactive,
            timestamp: Utc::now(),
        }
    }

    /// Workload identity attached to every published observation.
    pub fn dimensions(&self) -> Vec<Dimension> {
        vec![
            Dimension::new("ClusterName", &self.config.cluster_name),
            Dimension::new("Namespace", &self.config.namespace),
            Dimension::new("Deployment", &self.config.deployment_name),
        ]
    }

    /// Best-effort publish. Sink failures are logged and dropped.
    pub async fn publish_observability(&self, name: &str, value: f64, unit: Unit) {
        let observation = Observation::new(&self.config.observability_namespace, name, value, unit)
            .with_dimensions(self.dimensions());
        if let Err(e) = self.sink.publish(&observation).await {
            warn!(metric = %name, error = %e, "failed to publish observation");
        }
    }

    /// Record the decision: publish its signed value and, for an actual
    /// action, log the full decision record. Replica changes are left to
    /// the actuator.
    pub async fn execute_scaling_action(&self, decision: &Decision) -> bool {
        self.publish_observability(
            SCALING_DECISION_METRIC,
            decision.action.signal_value(),
            Unit::None,
        )
        .await;

        if !decision.is_actionable() {
            return true;
        }

        let record = DecisionRecord::from(decision);
        match serde_json::to_string(&record) {
            Ok(json) => info!(
                action = %decision.action,
                mode = %decision.mode,
                decision = %json,
                "scaling decision recorded"
            ),
            Err(e) => warn!(
                action = %decision.action,
                error = %e,
                "failed to serialize decision record"
            ),
        }

        true
    }
}

/// The structured log form of an actionable decision.
#[derive(Serialize)]
struct DecisionRecord<'a> {
    decision: ScalingAction,
    mode: ScalingMode,
    reasoning: &'a [String],
    metrics: &'a BTreeMap<MetricKind, MetricSnapshot>,
    timestamp: DateTime<Utc>,
}

impl<'a> From<&'a Decision> for DecisionRecord<'a> {
    fn from(d: &'a Decision) -> Self {
        Self {
            decision: d.action,
            mode: d.mode,
            reasoning: &d.reasons,
            metrics: &d.metrics_evaluated,
            timestamp: d.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use scalesense_core::{MetricIdentity, SignalVerdict, TrendDirection, TrendResult};
    use scalesense_metrics::{PrometheusSink, SinkError, SinkResult};
    use scalesense_signal::InMemoryTelemetry;

    struct BrokenSink;

    #[async_trait]
    impl ObservabilitySink for BrokenSink {
        async fn publish(&self, _observation: &Observation) -> SinkResult<()> {
            Err(SinkError::Unavailable("sink down".to_string()))
        }
    }

    fn engine_with(
        telemetry: InMemoryTelemetry,
        sink: Arc<dyn ObservabilitySink>,
    ) -> DecisionEngine {
        DecisionEngine::new(ScalerConfig::default(), Arc::new(telemetry), sink).unwrap()
    }

    fn engine() -> DecisionEngine {
        engine_with(InMemoryTelemetry::new(), Arc::new(PrometheusSink::new()))
    }

    fn signal(values: &[f64], direction: TrendDirection, magnitude: f64) -> SignalVerdict {
        SignalVerdict::new(values.to_vec(), TrendResult::new(direction, magnitude), true)
    }

    fn noise(values: &[f64]) -> SignalVerdict {
        SignalVerdict::new(values.to_vec(), TrendResult::new(TrendDirection::Stable, 0.01), false)
    }

    fn verdicts(
        cpu: SignalVerdict,
        memory: SignalVerdict,
        latency: SignalVerdict,
        inference: SignalVerdict,
    ) -> Verdicts {
        [
            (MetricKind::Cpu, cpu),
            (MetricKind::Memory, memory),
            (MetricKind::Latency, latency),
            (MetricKind::Inference, inference),
        ]
        .into_iter()
        .collect()
    }

    fn all_scale_up() -> Verdicts {
        verdicts(
            signal(&[60.0, 65.0, 70.0, 75.0, 80.0], TrendDirection::Increasing, 0.20),
            signal(&[70.0, 75.0, 80.0, 85.0, 90.0], TrendDirection::Increasing, 0.18),
            signal(&[3200.0, 3800.0, 4400.0, 5000.0, 5600.0], TrendDirection::Increasing, 0.22),
            signal(&[2500.0, 2700.0, 2900.0, 3100.0, 3300.0], TrendDirection::Increasing, 0.15),
        )
    }

    fn all_scale_down() -> Verdicts {
        verdicts(
            signal(&[50.0, 45.0, 40.0, 35.0, 25.0], TrendDirection::Decreasing, 0.20),
            signal(&[60.0, 55.0, 50.0, 45.0, 35.0], TrendDirection::Decreasing, 0.18),
            signal(&[3000.0, 2800.0, 2600.0, 2400.0, 2200.0], TrendDirection::Decreasing, 0.15),
            signal(&[2500.0, 2400.0, 2300.0, 2200.0, 2100.0], TrendDirection::Decreasing, 0.10),
        )
    }

    fn all_noise() -> Verdicts {
        verdicts(
            noise(&[50.0; 5]),
            noise(&[45.0; 5]),
            noise(&[2000.0; 5]),
            noise(&[1500.0; 5]),
        )
    }

    #[test]
    fn construction_rejects_invalid_config() {
        let config = ScalerConfig {
            min_replicas: 11,
            ..ScalerConfig::default()
        };
        let result = DecisionEngine::new(
            config,
            Arc::new(InMemoryTelemetry::new()),
            Arc::new(PrometheusSink::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn scale_up_when_all_metrics_agree() {
        let decision = engine().make_scaling_decision(&all_scale_up());

        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert!(decision.reasons[0].starts_with("Multi-metric evaluation:"));
        assert_eq!(decision.reasons[0], "Multi-metric evaluation: 4 scale-up signals detected");
        assert_eq!(decision.mode, ScalingMode::Reactive);
        assert_eq!(decision.reasons.len(), 5);
    }

    #[test]
    fn per_metric_reasons_follow_evaluation_order() {
        let decision = engine().make_scaling_decision(&all_scale_up());

        assert!(decision.reasons[1].starts_with("CPU:"));
        assert!(decision.reasons[2].starts_with("Memory:"));
        assert!(decision.reasons[3].starts_with("API latency:"));
        assert!(decision.reasons[4].starts_with("Inference:"));
    }

    #[test]
    fn scale_down_with_three_possible_voters() {
        let decision = engine().make_scaling_decision(&all_scale_down());

        assert_eq!(decision.action, ScalingAction::ScaleDown);
        assert_eq!(decision.reasons[0], "Multi-metric evaluation: 2 scale-down signals detected");
        assert_eq!(decision.mode, ScalingMode::Proactive);
    }

    #[test]
    fn noise_never_votes() {
        let decision = engine().make_scaling_decision(&all_noise());

        assert_eq!(decision.action, ScalingAction::NoAction);
        assert_eq!(decision.reasons[0], "No correlated signals detected for scaling action");
        assert_eq!(decision.reasons.len(), 5);
        for reason in &decision.reasons[1..] {
            assert!(reason.contains("noise"), "unexpected reason: {reason}");
        }
        assert!(decision.reasons[1].starts_with("cpu:"));
    }

    #[test]
    fn noisy_breach_is_ignored() {
        // Values that would vote up, but classified as noise.
        let mut v = all_scale_up();
        for verdict in v.values_mut() {
            verdict.is_signal = false;
        }
        let decision = engine().make_scaling_decision(&v);
        assert_eq!(decision.action, ScalingAction::NoAction);
        assert_eq!(decision.mode, ScalingMode::Proactive);
    }

    #[test]
    fn single_signal_is_not_enough() {
        let v = verdicts(
            signal(&[60.0, 65.0, 70.0, 75.0, 80.0], TrendDirection::Increasing, 0.20),
            noise(&[45.0; 5]),
            noise(&[2000.0; 5]),
            noise(&[1500.0; 5]),
        );
        let decision = engine().make_scaling_decision(&v);

        assert_eq!(decision.action, ScalingAction::NoAction);
        assert!(decision.reasons[0].contains("No correlated signals"));
        assert_eq!(decision.reasons[1], "CPU: high utilization (80%) with increasing trend");
    }

    #[test]
    fn latency_alone_escalates_mode_without_acting() {
        let v = verdicts(
            noise(&[50.0; 5]),
            noise(&[45.0; 5]),
            signal(&[4000.0, 4500.0, 5000.0, 5500.0, 6000.0], TrendDirection::Increasing, 0.2),
            noise(&[1500.0; 5]),
        );
        let decision = engine().make_scaling_decision(&v);

        assert_eq!(decision.action, ScalingAction::NoAction);
        assert_eq!(decision.mode, ScalingMode::Reactive);
    }

    #[test]
    fn scale_up_wins_when_both_sides_reach_threshold() {
        // Down: cpu + memory. Up: latency + inference.
        let v = verdicts(
            signal(&[40.0, 35.0, 30.0, 25.0, 20.0], TrendDirection::Decreasing, 0.2),
            signal(&[50.0, 45.0, 40.0, 35.0, 30.0], TrendDirection::Decreasing, 0.2),
            signal(&[4000.0, 4500.0, 5000.0, 5500.0, 6000.0], TrendDirection::Increasing, 0.2),
            signal(&[2000.0, 2500.0, 3000.0, 3500.0, 4000.0], TrendDirection::Increasing, 0.2),
        );
        let decision = engine().make_scaling_decision(&v);
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert_eq!(decision.reasons[0], "Multi-metric evaluation: 2 scale-up signals detected");
    }

    #[test]
    fn snapshot_records_every_metric() {
        let decision = engine().make_scaling_decision(&all_scale_up());
        assert_eq!(decision.metrics_evaluated.len(), 4);

        let cpu = &decision.metrics_evaluated[&MetricKind::Cpu];
        assert_eq!(cpu.current, 80.0);
        assert_eq!(cpu.trend, TrendDirection::Increasing);
        assert_eq!(cpu.magnitude, 0.20);
        assert!(cpu.is_signal);
    }

    #[test]
    fn decisions_are_idempotent_apart_from_timestamp() {
        let e = engine();
        let v = all_scale_up();
        let first = e.make_scaling_decision(&v);
        let mut second = e.make_scaling_decision(&v);

        second.timestamp = first.timestamp;
        assert_eq!(first, second);
    }

    #[test]
    fn empty_verdicts_take_no_action() {
        let decision = engine().make_scaling_decision(&Verdicts::new());
        assert_eq!(decision.action, ScalingAction::NoAction);
        assert_eq!(decision.reasons.len(), 1);
    }

    #[tokio::test]
    async fn collect_metrics_without_data_degrades_to_noise() {
        let verdicts = engine().collect_metrics().await;

        assert_eq!(verdicts.len(), 4);
        for verdict in verdicts.values() {
            assert_eq!(verdict, &SignalVerdict::no_data());
        }
    }

    async fn seed(store: &InMemoryTelemetry, identity: &MetricIdentity, values: &[f64]) {
        let now = Utc::now();
        for (i, v) in values.iter().enumerate() {
            let age = (values.len() - i) as i64;
            store
                .record(identity, now - Duration::minutes(age) + Duration::seconds(1), *v)
                .await;
        }
    }

    #[tokio::test]
    async fn collect_metrics_reads_each_identity() {
        let config = ScalerConfig::default();
        let store = InMemoryTelemetry::new();
        let cpu = config.metric_identity(MetricKind::Cpu);
        let memory = config.metric_identity(MetricKind::Memory);
        seed(&store, &cpu, &[40.0, 50.0, 60.0, 72.0, 85.0]).await;
        seed(&store, &memory, &[40.0, 55.0, 70.0, 85.0, 95.0]).await;

        let engine = engine_with(store, Arc::new(PrometheusSink::new()));
        let verdicts = engine.collect_metrics().await;

        let cpu = &verdicts[&MetricKind::Cpu];
        assert_eq!(cpu.current, 85.0);
        assert_eq!(cpu.trend.direction, TrendDirection::Increasing);
        assert!(cpu.is_signal);
        assert!(!verdicts[&MetricKind::Latency].is_signal);

        let decision = engine.make_scaling_decision(&verdicts);
        assert_eq!(decision.action, ScalingAction::ScaleUp);
    }

    #[tokio::test]
    async fn execute_publishes_signed_decision() {
        let sink = Arc::new(PrometheusSink::new());
        let e = engine_with(InMemoryTelemetry::new(), sink.clone());

        let up = e.make_scaling_decision(&all_scale_up());
        assert!(e.execute_scaling_action(&up).await);
        assert_eq!(sink.latest(SCALING_DECISION_METRIC).await, Some(1.0));

        let down = e.make_scaling_decision(&all_scale_down());
        assert_eq!(down.action, ScalingAction::ScaleDown);
        assert!(e.execute_scaling_action(&down).await);
        assert_eq!(sink.latest(SCALING_DECISION_METRIC).await, Some(-1.0));

        let none = e.make_scaling_decision(&all_noise());
        assert!(e.execute_scaling_action(&none).await);
        assert_eq!(sink.latest(SCALING_DECISION_METRIC).await, Some(0.0));

        let output = sink.render().await;
        assert!(output.contains("deployment=\"claim-status-api\""));
    }

    #[tokio::test]
    async fn execute_survives_sink_failure() {
        let e = engine_with(InMemoryTelemetry::new(), Arc::new(BrokenSink));
        let decision = e.make_scaling_decision(&all_scale_up());
        assert!(e.execute_scaling_action(&decision).await);
    }
}
