//! Prometheus text exposition of published observations.
//!
//! `PrometheusSink` keeps the latest value per observation series so a
//! scraper sees the most recent decision, execution status, and failure
//! count.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::sink::{Observation, ObservabilitySink, SinkResult, Unit};

/// Latest value of one labelled series.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: Vec<(String, String)>,
    pub value: f64,
}

/// A metric family: one exposition name, its unit, and its series.
#[derive(Debug, Clone, PartialEq)]
pub struct Family {
    pub name: String,
    pub source: String,
    pub unit: Unit,
    pub samples: Vec<Sample>,
}

/// Retained state of one family.
struct FamilyEntry {
    source: String,
    unit: Unit,
    /// rendered labels → latest sample of that series
    samples: BTreeMap<String, Sample>,
    /// Most recently published value across all series.
    last_value: f64,
}

/// Sink that retains the latest observation per series for scraping.
#[derive(Clone, Default)]
pub struct PrometheusSink {
    /// metric name → family entry
    families: Arc<RwLock<BTreeMap<String, FamilyEntry>>>,
}

impl PrometheusSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all families, ordered by name.
    pub async fn families(&self) -> Vec<Family> {
        let families = self.families.read().await;
        families
            .iter()
            .map(|(name, entry)| Family {
                name: name.clone(),
                source: entry.source.clone(),
                unit: entry.unit,
                samples: entry.samples.values().cloned().collect(),
            })
            .collect()
    }

    /// Most recently published value for an observation name, whatever
    /// its dimensions.
    pub async fn latest(&self, observation_name: &str) -> Option<f64> {
        let families = self.families.read().await;
        families
            .get(&metric_name(observation_name))
            .map(|entry| entry.last_value)
    }

    pub async fn render(&self) -> String {
        render_prometheus(&self.families().await)
    }
}

#[async_trait]
impl ObservabilitySink for PrometheusSink {
    async fn publish(&self, observation: &Observation) -> SinkResult<()> {
        let labels: Vec<(String, String)> = observation
            .dimensions
            .iter()
            .map(|d| (label_name(&d.name), d.value.clone()))
            .collect();
        let key = render_labels(&labels);

        let mut families = self.families.write().await;
        let entry = families
            .entry(metric_name(&observation.name))
            .or_insert_with(|| FamilyEntry {
                source: observation.name.clone(),
                unit: observation.unit,
                samples: BTreeMap::new(),
                last_value: observation.value,
            });
        entry.unit = observation.unit;
        entry.last_value = observation.value;
        entry.samples.insert(
            key,
            Sample {
                labels,
                value: observation.value,
            },
        );
        Ok(())
    }
}

/// Render metric families into Prometheus text format.
///
/// Every family is exposed as a GAUGE holding its latest value.
pub fn render_prometheus(families: &[Family]) -> String {
    let mut out = String::new();

    for family in families {
        out.push_str(&format!(
            "# HELP {} Latest {} observation (unit: {}).\n",
            family.name, family.source, family.unit
        ));
        out.push_str(&format!("# TYPE {} gauge\n", family.name));
        for s in &family.samples {
            out.push_str(&format!("{}{} {}\n", family.name, render_labels(&s.labels), s.value));
        }
    }

    out
}

/// `ScalingDecision` → `scalesense_scaling_decision`.
fn metric_name(observation_name: &str) -> String {
    format!("scalesense_{}", snake_case(observation_name))
}

/// `ClusterName` → `cluster_name`.
fn label_name(dimension_name: &str) -> String {
    snake_case(dimension_name)
}

fn snake_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    let mut prev_lower = false;
    for c in s.chars() {
        if c.is_ascii_uppercase() {
            if prev_lower {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
            prev_lower = false;
        } else if c.is_ascii_alphanumeric() {
            out.push(c);
            prev_lower = true;
        } else {
            out.push('_');
            prev_lower = false;
        }
    }
    out
}

fn render_labels(labels: &[(String, String)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let inner = labels
        .iter()
        .map(|(k, v)| format!("{k}=\"{}\"", escape_label_value(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{inner}}}")
}

fn escape_label_value(v: &str) -> String {
    v.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use scalesense_core::Dimension;

    fn decision_observation(value: f64) -> Observation {
        Observation::new("IntelligentAutoscaler", "ScalingDecision", value, Unit::None)
            .with_dimensions(vec![
                Dimension::new("ClusterName", "test-cluster"),
                Dimension::new("Namespace", "materclaims"),
                Dimension::new("Deployment", "claim-status-api"),
            ])
    }

    #[test]
    fn render_empty() {
        assert!(render_prometheus(&[]).is_empty());
    }

    #[test]
    fn names_are_snake_cased() {
        assert_eq!(metric_name("ScalingDecision"), "scalesense_scaling_decision");
        assert_eq!(metric_name("ExecutionSuccess"), "scalesense_execution_success");
        assert_eq!(label_name("ClusterName"), "cluster_name");
    }

    #[test]
    fn label_values_are_escaped() {
        assert_eq!(escape_label_value(r#"a"b\c"#), r#"a\"b\\c"#);
    }

    #[tokio::test]
    async fn render_single_observation() {
        let sink = PrometheusSink::new();
        sink.publish(&decision_observation(1.0)).await.unwrap();

        let output = sink.render().await;
        assert!(output.contains(
            "# HELP scalesense_scaling_decision Latest ScalingDecision observation (unit: None)."
        ));
        assert!(output.contains("# TYPE scalesense_scaling_decision gauge"));
        assert!(output.contains(
            "scalesense_scaling_decision{cluster_name=\"test-cluster\",namespace=\"materclaims\",deployment=\"claim-status-api\"} 1"
        ));
    }

    #[tokio::test]
    async fn latest_value_wins() {
        let sink = PrometheusSink::new();
        sink.publish(&decision_observation(1.0)).await.unwrap();
        sink.publish(&decision_observation(-1.0)).await.unwrap();

        assert_eq!(sink.latest("ScalingDecision").await, Some(-1.0));
        let families = sink.families().await;
        assert_eq!(families.len(), 1);
        assert_eq!(families[0].samples.len(), 1);
    }

    #[tokio::test]
    async fn latest_follows_publish_order_across_series() {
        let sink = PrometheusSink::new();
        let tagged = |cluster: &str, value: f64| {
            Observation::new("IntelligentAutoscaler", "ScalingDecision", value, Unit::None)
                .with_dimensions(vec![Dimension::new("ClusterName", cluster)])
        };
        sink.publish(&tagged("zzz", 7.0)).await.unwrap();
        sink.publish(&tagged("aaa", -1.0)).await.unwrap();

        assert_eq!(sink.latest("ScalingDecision").await, Some(-1.0));
        assert_eq!(sink.families().await[0].samples.len(), 2);
        assert_eq!(sink.latest("ExecutionSuccess").await, None);
    }

    #[tokio::test]
    async fn unlabelled_observation_renders_bare() {
        let sink = PrometheusSink::new();
        let failure =
            Observation::new("IntelligentAutoscaler", "ExecutionFailure", 1.0, Unit::Count);
        sink.publish(&failure).await.unwrap();

        let output = sink.render().await;
        assert!(output.contains("scalesense_execution_failure 1\n"));
        assert!(output.contains("(unit: Count)"));
    }

    #[tokio::test]
    async fn render_format_is_prometheus_compatible() {
        let sink = PrometheusSink::new();
        sink.publish(&decision_observation(0.0)).await.unwrap();
        let success =
            Observation::new("IntelligentAutoscaler", "ExecutionSuccess", 1.0, Unit::Count);
        sink.publish(&success).await.unwrap();

        // Every sample line is `name[{labels}] value`.
        for line in sink.render().await.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (_, value) = line.rsplit_once(' ').unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad value in line: {line}");
            assert!(line.starts_with("scalesense_"), "bad name in line: {line}");
        }
    }
}
