//! Signal analyzer — trend and noise classification for one metric series.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, warn};

use scalesense_core::{MetricIdentity, ScalerConfig, SignalVerdict, TrendDirection, TrendResult};

use crate::telemetry::{MetricQuery, Statistic, TelemetryStore};

/// Thresholds shared by every analyzer in a cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerThresholds {
    /// Normalized slope below which a series is stable.
    pub trend: f64,
    /// Coefficient of variation at or below which a series is noise.
    pub noise: f64,
    /// Telemetry bucket size in seconds.
    pub period_secs: u32,
}

impl Default for AnalyzerThresholds {
    fn default() -> Self {
        Self {
            trend: 0.15,
            noise: 0.05,
            period_secs: 60,
        }
    }
}

impl From<&ScalerConfig> for AnalyzerThresholds {
    fn from(config: &ScalerConfig) -> Self {
        Self {
            trend: config.trend_threshold,
            noise: config.noise_filter_threshold,
            period_secs: config.period_secs,
        }
    }
}

/// Analyzes one metric identity against an injected telemetry store.
pub struct SignalAnalyzer {
    identity: MetricIdentity,
    store: Arc<dyn TelemetryStore>,
    thresholds: AnalyzerThresholds,
}

impl SignalAnalyzer {
    pub fn new(
        identity: MetricIdentity,
        store: Arc<dyn TelemetryStore>,
        thresholds: AnalyzerThresholds,
    ) -> Self {
        Self {
            identity,
            store,
            thresholds,
        }
    }

    /// Samples for the trailing window, oldest first.
    ///
    /// Any telemetry failure yields an empty series; it is never an error
    /// at this layer.
    pub async fn fetch_values(&self, window_minutes: u32, statistic: Statistic) -> Vec<f64> {
        let end = Utc::now();
        let query = MetricQuery {
            identity: self.identity.clone(),
            start: end - Duration::minutes(window_minutes as i64),
            end,
            period_secs: self.thresholds.period_secs,
            statistic,
        };

        match self.store.query(&query).await {
            Ok(mut points) => {
                points.sort_by_key(|p| p.timestamp);
                let values: Vec<f64> = points
                    .into_iter()
                    .map(|p| p.value)
                    .filter(|v| v.is_finite())
                    .collect();
                debug!(metric = %self.identity, samples = values.len(), "telemetry fetched");
                values
            }
            Err(e) => {
                warn!(
                    metric = %self.identity,
                    error = %e,
                    "telemetry fetch failed, treating as no data"
                );
                Vec::new()
            }
        }
    }

    pub fn compute_trend(&self, values: &[f64]) -> TrendResult {
        compute_trend(values, self.thresholds.trend)
    }

    pub fn is_signal(&self, values: &[f64]) -> bool {
        is_signal(values, self.thresholds.noise)
    }

    /// Fetch the window and classify it.
    pub async fn analyze(&self, window_minutes: u32, statistic: Statistic) -> SignalVerdict {
        let values = self.fetch_values(window_minutes, statistic).await;
        let trend = self.compute_trend(&values);
        let is_signal = self.is_signal(&values);
        SignalVerdict::new(values, trend, is_signal)
    }
}

/// Least-squares trend of `values` against their sample index.
///
/// The slope is normalized by the series mean. Fewer than three samples,
/// a zero index variance, a non-finite intermediate, or a magnitude below
/// `threshold` classify as stable.
pub fn compute_trend(values: &[f64], threshold: f64) -> TrendResult {
    let n = values.len();
    if n < 3 {
        return TrendResult::stable();
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = mean(values);

    let (numerator, denominator) = values.iter().enumerate().fold(
        (0.0, 0.0),
        |(num, den), (i, y)| {
            let dx = i as f64 - x_mean;
            (num + dx * (y - y_mean), den + dx * dx)
        },
    );

    if denominator == 0.0 {
        return TrendResult::stable();
    }

    let slope = numerator / denominator;
    let magnitude = if y_mean != 0.0 {
        (slope / y_mean).abs()
    } else {
        0.0
    };
    // Sums over samples near f64::MAX overflow.
    if !slope.is_finite() || !y_mean.is_finite() || !magnitude.is_finite() {
        return TrendResult::stable();
    }

    let direction = if magnitude < threshold {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };

    TrendResult::new(direction, magnitude)
}

/// Whether the relative dispersion of `values` exceeds the noise floor.
///
/// Uses the sample standard deviation over the mean. Fewer than two
/// samples, a zero mean, or an overflowing dispersion are never a signal.
pub fn is_signal(values: &[f64], noise_threshold: f64) -> bool {
    if values.len() < 2 {
        return false;
    }

    let m = mean(values);
    if m == 0.0 || !m.is_finite() {
        return false;
    }

    let variance =
        values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    let coefficient_of_variation = variance.sqrt() / m;

    coefficient_of_variation.is_finite() && coefficient_of_variation > noise_threshold
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
