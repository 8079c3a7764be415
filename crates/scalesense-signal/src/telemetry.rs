//! Telemetry store — the source of raw metric series.
//!
//! The analyzer only depends on the `TelemetryStore` trait. The bundled
//! `InMemoryTelemetry` keeps raw samples per series and aggregates them
//! into fixed-size buckets at query time, the way a monitoring backend
//! answers a statistics query.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use scalesense_core::MetricIdentity;

/// Result type alias for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("telemetry backend unavailable: {0}")]
    Unavailable(String),

    #[error("series not found: {0}")]
    SeriesNotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("failed to load fixture: {0}")]
    Fixture(String),
}

/// Per-bucket aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Statistic {
    #[default]
    Average,
    Minimum,
    Maximum,
    Sum,
    SampleCount,
}

impl Statistic {
    fn reduce(&self, samples: &[f64]) -> f64 {
        match self {
            Statistic::Average => samples.iter().sum::<f64>() / samples.len() as f64,
            Statistic::Minimum => samples.iter().copied().fold(f64::INFINITY, f64::min),
            Statistic::Maximum => samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Sum => samples.iter().sum(),
            Statistic::SampleCount => samples.len() as f64,
        }
    }
}

/// A statistics query over one series.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub identity: MetricIdentity,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period_secs: u32,
    pub statistic: Statistic,
}

/// One aggregated bucket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Source of metric series.
///
/// Implementations may return datapoints in any order.
#[async_trait]
pub trait TelemetryStore: Send + Sync {
    async fn query(&self, query: &MetricQuery) -> TelemetryResult<Vec<Datapoint>>;
}

type Series = Vec<(DateTime<Utc>, f64)>;

/// Identity with dimensions sorted, so lookups ignore listing order.
fn series_key(identity: &MetricIdentity) -> MetricIdentity {
    let mut key = identity.clone();
    key.dimensions.sort();
    key
}

/// Raw-sample telemetry store held in memory.
///
/// Cheap to clone; clones share the same samples.
#[derive(Clone, Default)]
pub struct InMemoryTelemetry {
    series: Arc<RwLock<HashMap<MetricIdentity, Series>>>,
}

/// On-disk fixture: evenly spaced values per series, newest last.
#[derive(Debug, Deserialize)]
struct Fixture {
    series: Vec<FixtureSeries>,
}

#[derive(Debug, Deserialize)]
struct FixtureSeries {
    #[serde(flatten)]
    identity: MetricIdentity,
    values: Vec<f64>,
}

impl InMemoryTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a JSON fixture, spacing each series `period_secs` apart.
    ///
    /// Samples sit mid-bucket: the newest lands half a period before `end`,
    /// so a window of `n * period_secs` ending at or shortly after `end`
    /// sees all `n` values.
    pub fn from_fixture(
        path: &Path,
        end: DateTime<Utc>,
        period_secs: u32,
    ) -> TelemetryResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::Fixture(format!("{}: {e}", path.display())))?;
        let fixture: Fixture = serde_json::from_str(&content)
            .map_err(|e| TelemetryError::Fixture(format!("{}: {e}", path.display())))?;

        let period_ms = period_secs as i64 * 1000;
        let mut map = HashMap::new();
        for s in fixture.series {
            let n = s.values.len() as i64;
            let samples: Series = s
                .values
                .iter()
                .enumerate()
                .map(|(i, v)| {
                    let age_ms = (n - 1 - i as i64) * period_ms + period_ms / 2;
                    (end - Duration::milliseconds(age_ms), *v)
                })
                .collect();
            map.insert(series_key(&s.identity), samples);
        }

        debug!(series = map.len(), path = %path.display(), "telemetry fixture loaded");
        Ok(Self {
            series: Arc::new(RwLock::new(map)),
        })
    }

    /// Record one raw sample.
    pub async fn record(&self, identity: &MetricIdentity, timestamp: DateTime<Utc>, value: f64) {
        let mut series = self.series.write().await;
        series
            .entry(series_key(identity))
            .or_default()
            .push((timestamp, value));
    }

    /// Drop samples older than `cutoff` across all series.
    pub async fn prune_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut series = self.series.write().await;
        let mut removed = 0;
        for samples in series.values_mut() {
            let before = samples.len();
            samples.retain(|(t, _)| *t >= cutoff);
            removed += before - samples.len();
        }
        series.retain(|_, samples| !samples.is_empty());
        removed
    }

    /// Number of series with at least one sample.
    pub async fn series_count(&self) -> usize {
        self.series.read().await.len()
    }
}

#[async_trait]
impl TelemetryStore for InMemoryTelemetry {
    async fn query(&self, query: &MetricQuery) -> TelemetryResult<Vec<Datapoint>> {
        if query.period_secs == 0 {
            return Err(TelemetryError::InvalidQuery("period must be positive".to_string()));
        }
        if query.end <= query.start {
            return Err(TelemetryError::InvalidQuery(
                "end must be after start".to_string(),
            ));
        }

        let series = self.series.read().await;
        let samples = series
            .get(&series_key(&query.identity))
            .ok_or_else(|| TelemetryError::SeriesNotFound(query.identity.to_string()))?;

        let period = query.period_secs as i64;
        let mut buckets: BTreeMap<i64, Vec<f64>> = BTreeMap::new();
        for (t, v) in samples {
            if *t < query.start || *t >= query.end {
                continue;
            }
            let index = (*t - query.start).num_seconds() / period;
            buckets.entry(index).or_default().push(*v);
        }

        Ok(buckets
            .into_iter()
            .map(|(index, values)| Datapoint {
                timestamp: query.start + Duration::seconds(index * period),
                value: query.statistic.reduce(&values),
            })
            .collect())
    }
}
