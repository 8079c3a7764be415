//! Scaler configuration: defaults, optional TOML file, environment overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::types::{MetricIdentity, MetricKind};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalerConfig {
    pub cluster_name: String,
    pub namespace: String,
    pub deployment_name: String,
    /// Carried through to the actuator; not enforced by the engine.
    pub min_replicas: u32,
    pub max_replicas: u32,
    /// Trailing window of telemetry analyzed per cycle.
    pub metric_window_minutes: u32,
    /// Proportional change per sample step that counts as a trend.
    pub trend_threshold: f64,
    /// Coefficient of variation at or below which a series is noise.
    pub noise_filter_threshold: f64,
    /// Telemetry bucket size.
    pub period_secs: u32,
    pub container_metrics_namespace: String,
    pub app_metrics_namespace: String,
    pub service_name: String,
    pub inference_model: String,
    /// Namespace published observations are filed under.
    pub observability_namespace: String,
    /// Trigger source tag that marks an alarm (reactive) evaluation.
    pub alarm_source: String,
}

impl Default for ScalerConfig {
    fn default() -> Self {
        Self {
            cluster_name: "test-cluster".to_string(),
            namespace: "materclaims".to_string(),
            deployment_name: "claim-status-api".to_string(),
            min_replicas: 2,
            max_replicas: 10,
            metric_window_minutes: 10,
            trend_threshold: 0.15,
            noise_filter_threshold: 0.05,
            period_secs: 60,
            container_metrics_namespace: "ContainerInsights".to_string(),
            app_metrics_namespace: "ClaimStatusAPI".to_string(),
            service_name: "claim-status-api".to_string(),
            inference_model: "nova-lite".to_string(),
            observability_namespace: "IntelligentAutoscaler".to_string(),
            alarm_source: "aws.cloudwatch".to_string(),
        }
    }
}

impl ScalerConfig {
    /// Load a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: ScalerConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Defaults overridden by the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Override fields from an environment lookup.
    ///
    /// The lookup is injected so callers can layer env on top of a file
    /// and tests can supply a fixed map.
    pub fn apply_env<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set_string = |target: &mut String, var: &str| {
            if let Some(v) = lookup(var) {
                *target = v;
            }
        };
        set_string(&mut self.cluster_name, "CLUSTER_NAME");
        set_string(&mut self.namespace, "NAMESPACE");
        set_string(&mut self.deployment_name, "DEPLOYMENT_NAME");
        set_string(&mut self.container_metrics_namespace, "CONTAINER_METRICS_NAMESPACE");
        set_string(&mut self.app_metrics_namespace, "APP_METRICS_NAMESPACE");
        set_string(&mut self.service_name, "SERVICE_NAME");
        set_string(&mut self.inference_model, "INFERENCE_MODEL");
        set_string(&mut self.observability_namespace, "OBSERVABILITY_NAMESPACE");
        set_string(&mut self.alarm_source, "ALARM_SOURCE");

        if let Some(v) = parse_var(&lookup, "MIN_REPLICAS")? {
            self.min_replicas = v;
        }
        if let Some(v) = parse_var(&lookup, "MAX_REPLICAS")? {
            self.max_replicas = v;
        }
        if let Some(v) = parse_var(&lookup, "METRIC_WINDOW_MINUTES")? {
            self.metric_window_minutes = v;
        }
        if let Some(v) = parse_var(&lookup, "METRIC_PERIOD_SECONDS")? {
            self.period_secs = v;
        }
        if let Some(v) = parse_var(&lookup, "TREND_THRESHOLD")? {
            self.trend_threshold = v;
        }
        if let Some(v) = parse_var(&lookup, "NOISE_FILTER_THRESHOLD")? {
            self.noise_filter_threshold = v;
        }
        Ok(())
    }

    /// Reject configurations no cycle could run with.
    pub fn validate(&self) -> ConfigResult<()> {
        for (field, value) in [
            ("cluster_name", &self.cluster_name),
            ("namespace", &self.namespace),
            ("deployment_name", &self.deployment_name),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("{field} must not be empty")));
            }
        }
        if self.min_replicas > self.max_replicas {
            return Err(ConfigError::Invalid(format!(
                "min_replicas {} exceeds max_replicas {}",
                self.min_replicas, self.max_replicas
            )));
        }
        if self.metric_window_minutes == 0 {
            return Err(ConfigError::Invalid(
                "metric_window_minutes must be positive".to_string(),
            ));
        }
        if self.period_secs == 0 {
            return Err(ConfigError::Invalid("period_secs must be positive".to_string()));
        }
        for (field, value) in [
            ("trend_threshold", self.trend_threshold),
            ("noise_filter_threshold", self.noise_filter_threshold),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{field} must be a non-negative number, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Telemetry identity of each metric the engine correlates.
    pub fn metric_identity(&self, kind: MetricKind) -> MetricIdentity {
        match kind {
            MetricKind::Cpu => {
                MetricIdentity::new(&self.container_metrics_namespace, "pod_cpu_utilization")
                    .with_dimension("ClusterName", &self.cluster_name)
                    .with_dimension("Namespace", &self.namespace)
            }
            MetricKind::Memory => {
                MetricIdentity::new(&self.container_metrics_namespace, "pod_memory_utilization")
                    .with_dimension("ClusterName", &self.cluster_name)
                    .with_dimension("Namespace", &self.namespace)
            }
            MetricKind::Latency => MetricIdentity::new(&self.app_metrics_namespace, "APILatency")
                .with_dimension("Service", &self.service_name)
                .with_dimension("Namespace", &self.namespace),
            MetricKind::Inference => {
                MetricIdentity::new(&self.app_metrics_namespace, "BedrockInferenceDuration")
                    .with_dimension("Service", &self.service_name)
                    .with_dimension("Model", &self.inference_model)
            }
        }
    }
}

fn parse_var<F, T>(lookup: &F, var: &str) -> ConfigResult<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: raw,
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults() {
        let config = ScalerConfig::default();
        assert_eq!(config.metric_window_minutes, 10);
        assert_eq!(config.trend_threshold, 0.15);
        assert_eq!(config.noise_filter_threshold, 0.05);
        assert_eq!(config.min_replicas, 2);
        assert_eq!(config.max_replicas, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides_defaults() {
        let mut config = ScalerConfig::default();
        config
            .apply_env(env(&[
                ("CLUSTER_NAME", "prod"),
                ("METRIC_WINDOW_MINUTES", "15"),
                ("TREND_THRESHOLD", "0.2"),
            ]))
            .unwrap();

        assert_eq!(config.cluster_name, "prod");
        assert_eq!(config.metric_window_minutes, 15);
        assert_eq!(config.trend_threshold, 0.2);
        // Untouched fields keep their defaults.
        assert_eq!(config.namespace, "materclaims");
    }

    #[test]
    fn env_rejects_unparseable_numbers() {
        let mut config = ScalerConfig::default();
        let err = config
            .apply_env(env(&[("MAX_REPLICAS", "lots")]))
            .unwrap_err();
        match err {
            ConfigError::InvalidValue { var, value } => {
                assert_eq!(var, "MAX_REPLICAS");
                assert_eq!(value, "lots");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn validate_rejects_inverted_bounds() {
        let config = ScalerConfig {
            min_replicas: 5,
            max_replicas: 2,
            ..ScalerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_thresholds_and_identity() {
        let config = ScalerConfig {
            noise_filter_threshold: f64::NAN,
            ..ScalerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ScalerConfig {
            cluster_name: "  ".to_string(),
            ..ScalerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = ScalerConfig {
            metric_window_minutes: 0,
            ..ScalerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn from_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
cluster_name = "staging"
trend_threshold = 0.25
"#
        )
        .unwrap();

        let config = ScalerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.cluster_name, "staging");
        assert_eq!(config.trend_threshold, 0.25);
        assert_eq!(config.metric_window_minutes, 10);
    }

    #[test]
    fn metric_identities() {
        let config = ScalerConfig::default();

        let cpu = config.metric_identity(MetricKind::Cpu);
        assert_eq!(cpu.namespace, "ContainerInsights");
        assert_eq!(cpu.metric_name, "pod_cpu_utilization");
        assert_eq!(cpu.dimensions.len(), 2);

        let inference = config.metric_identity(MetricKind::Inference);
        assert_eq!(inference.metric_name, "BedrockInferenceDuration");
        assert!(inference
            .dimensions
            .iter()
            .any(|d| d.name == "Model" && d.value == "nova-lite"));
    }
}
