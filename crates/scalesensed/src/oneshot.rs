//! One-shot evaluation: a single trigger against a fixture or empty store.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use tracing::info;

use scalesense_core::ScalerConfig;
use scalesense_engine::{Controller, CycleResponse, TriggerEvent};
use scalesense_metrics::LogSink;
use scalesense_signal::InMemoryTelemetry;

pub async fn run(
    config: ScalerConfig,
    event: Option<&Path>,
    fixture: Option<&Path>,
) -> anyhow::Result<()> {
    let response = evaluate_once(config, event, fixture).await?;

    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.is_success() {
        anyhow::bail!("evaluation failed with status {}", response.status_code);
    }
    Ok(())
}

/// Build a controller over the given inputs and run one cycle.
pub async fn evaluate_once(
    config: ScalerConfig,
    event: Option<&Path>,
    fixture: Option<&Path>,
) -> anyhow::Result<CycleResponse> {
    let event = match event {
        Some(path) => read_event(path)?,
        None => TriggerEvent::scheduled(),
    };

    let telemetry = match fixture {
        Some(path) => InMemoryTelemetry::from_fixture(path, Utc::now(), config.period_secs)
            .context("failed to load telemetry fixture")?,
        None => InMemoryTelemetry::new(),
    };
    info!(series = telemetry.series_count().await, "telemetry ready");

    let controller = Controller::new(config, Arc::new(telemetry), Arc::new(LogSink))
        .with_actuator(crate::logging_actuator());

    Ok(controller.handle_trigger(&event).await)
}

fn read_event(path: &Path) -> anyhow::Result<TriggerEvent> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read event from {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse event from {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use scalesense_core::{MetricKind, ScalingAction, ScalingMode};

    fn write_json(value: serde_json::Value) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(value.to_string().as_bytes()).unwrap();
        file
    }

    fn fixture_series(
        config: &ScalerConfig,
        kind: MetricKind,
        values: &[f64],
    ) -> serde_json::Value {
        let identity = config.metric_identity(kind);
        let mut series = serde_json::to_value(identity).unwrap();
        series["values"] = serde_json::json!(values);
        series
    }

    #[tokio::test]
    async fn empty_store_takes_no_action() {
        let response = evaluate_once(ScalerConfig::default(), None, None).await.unwrap();
        assert!(response.is_success());
        let decision = response.decision().unwrap();
        assert_eq!(decision.action, ScalingAction::NoAction);
        assert_eq!(decision.trigger_mode, ScalingMode::Proactive);
    }

    #[tokio::test]
    async fn fixture_and_alarm_event_scale_up_reactively() {
        let config = ScalerConfig::default();
        let fixture = write_json(serde_json::json!({
            "series": [
                fixture_series(&config, MetricKind::Cpu, &[40.0, 50.0, 60.0, 72.0, 85.0]),
                fixture_series(&config, MetricKind::Memory, &[40.0, 55.0, 70.0, 85.0, 95.0]),
                fixture_series(
                    &config,
                    MetricKind::Latency,
                    &[2000.0, 3000.0, 4000.0, 5000.0, 6500.0],
                ),
            ]
        }));
        let event = write_json(serde_json::json!({ "source": "aws.cloudwatch" }));

        let response = evaluate_once(config, Some(event.path()), Some(fixture.path()))
            .await
            .unwrap();

        let decision = response.decision().unwrap();
        assert_eq!(decision.action, ScalingAction::ScaleUp);
        assert_eq!(decision.mode, ScalingMode::Reactive);
        assert_eq!(decision.trigger_mode, ScalingMode::Reactive);
        assert_eq!(
            decision.reasons[0],
            "Multi-metric evaluation: 3 scale-up signals detected"
        );
    }

    #[tokio::test]
    async fn invalid_config_yields_500() {
        let config = ScalerConfig {
            min_replicas: 20,
            ..ScalerConfig::default()
        };
        let response = evaluate_once(config, None, None).await.unwrap();
        assert_eq!(response.status_code, 500);
        assert_eq!(response.body["message"], "Autoscaling evaluation failed");
    }

    #[tokio::test]
    async fn unreadable_event_is_an_error() {
        let missing = Path::new("/nonexistent/scalesense-event.json");
        let err = evaluate_once(ScalerConfig::default(), Some(missing), None)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to read event"));
    }
}
