//! Domain types for one evaluation cycle.
//!
//! Everything here is transient: built fresh from telemetry each cycle,
//! handed from the signal analyzer to the decision engine, and discarded
//! once the resulting `Decision` has been recorded.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Metrics ────────────────────────────────────────────────────────

/// The fixed set of metrics the decision engine correlates.
///
/// Ordering of the variants is the evaluation order of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Pod CPU utilization (percent).
    Cpu,
    /// Pod memory utilization (percent).
    Memory,
    /// API request latency (milliseconds).
    Latency,
    /// Model inference duration (milliseconds).
    Inference,
}

impl MetricKind {
    /// All metric kinds, in evaluation order.
    pub const ALL: [MetricKind; 4] = [
        MetricKind::Cpu,
        MetricKind::Memory,
        MetricKind::Latency,
        MetricKind::Inference,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Cpu => "cpu",
            MetricKind::Memory => "memory",
            MetricKind::Latency => "latency",
            MetricKind::Inference => "inference",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `name=value` dimension attached to a metric.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Identity of one metric series in the telemetry store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetricIdentity {
    pub namespace: String,
    pub metric_name: String,
    #[serde(default)]
    pub dimensions: Vec<Dimension>,
}

impl MetricIdentity {
    pub fn new(namespace: impl Into<String>, metric_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            metric_name: metric_name.into(),
            dimensions: Vec::new(),
        }
    }

    /// Add a dimension (builder style).
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.push(Dimension::new(name, value));
        self
    }
}

impl fmt::Display for MetricIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.metric_name)
    }
}

// ── Signal analysis ────────────────────────────────────────────────

/// Direction of a linear trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

/// Direction and normalized magnitude of a series' slope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    pub direction: TrendDirection,
    /// `|slope / mean|`, always non-negative.
    pub magnitude: f64,
}

impl TrendResult {
    /// The verdict for insufficient or degenerate data.
    pub fn stable() -> Self {
        Self {
            direction: TrendDirection::Stable,
            magnitude: 0.0,
        }
    }

    pub fn new(direction: TrendDirection, magnitude: f64) -> Self {
        Self {
            direction,
            magnitude,
        }
    }

    pub fn is_increasing(&self) -> bool {
        self.direction == TrendDirection::Increasing
    }

    pub fn is_decreasing(&self) -> bool {
        self.direction == TrendDirection::Decreasing
    }
}

/// Analyzer output for one metric series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalVerdict {
    /// Samples in chronological order.
    pub values: Vec<f64>,
    /// Last sample, or 0 when the series is empty.
    pub current: f64,
    pub trend: TrendResult,
    /// Whether the series' variation is a real movement rather than jitter.
    pub is_signal: bool,
}

impl SignalVerdict {
    /// Verdict over `values`; `current` is the last sample.
    pub fn new(values: Vec<f64>, trend: TrendResult, is_signal: bool) -> Self {
        Self {
            current: values.last().copied().unwrap_or(0.0),
            values,
            trend,
            is_signal,
        }
    }

    /// Verdict for a series with no data.
    pub fn no_data() -> Self {
        Self {
            values: Vec::new(),
            current: 0.0,
            trend: TrendResult::stable(),
            is_signal: false,
        }
    }
}

/// Per-metric verdicts for one cycle, in evaluation order.
pub type Verdicts = BTreeMap<MetricKind, SignalVerdict>;

// ── Decisions ──────────────────────────────────────────────────────

/// The discrete outcome of a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingAction {
    ScaleUp,
    ScaleDown,
    #[serde(rename = "none")]
    NoAction,
}

impl ScalingAction {
    /// Signed value published as the `ScalingDecision` observation.
    pub fn signal_value(&self) -> f64 {
        match self {
            ScalingAction::ScaleUp => 1.0,
            ScalingAction::ScaleDown => -1.0,
            ScalingAction::NoAction => 0.0,
        }
    }
}

impl fmt::Display for ScalingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingAction::ScaleUp => write!(f, "scale_up"),
            ScalingAction::ScaleDown => write!(f, "scale_down"),
            ScalingAction::NoAction => write!(f, "none"),
        }
    }
}

/// Urgency of an evaluation: scheduled (proactive) or alarm-driven (reactive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalingMode {
    #[default]
    Proactive,
    Reactive,
}

impl fmt::Display for ScalingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalingMode::Proactive => write!(f, "proactive"),
            ScalingMode::Reactive => write!(f, "reactive"),
        }
    }
}

/// What the engine saw for one metric when it decided.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub current: f64,
    pub trend: TrendDirection,
    pub magnitude: f64,
    pub is_signal: bool,
}

impl From<&SignalVerdict> for MetricSnapshot {
    fn from(v: &SignalVerdict) -> Self {
        Self {
            current: v.current,
            trend: v.trend.direction,
            magnitude: v.trend.magnitude,
            is_signal: v.is_signal,
        }
    }
}

/// The scaling verdict of one cycle, with its full reasoning trace.
///
/// `reasons[0]` is always the summary line; per-metric detail follows in
/// evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: ScalingAction,
    pub reasons: Vec<String>,
    pub mode: ScalingMode,
    pub metrics_evaluated: BTreeMap<MetricKind, MetricSnapshot>,
    pub trigger_mode: ScalingMode,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// The summary reason.
    pub fn summary(&self) -> &str {
        self.reasons.first().map(String::as_str).unwrap_or_default()
    }

    /// Stamp the trigger that started this cycle.
    pub fn with_trigger_mode(mut self, trigger_mode: ScalingMode) -> Self {
        self.trigger_mode = trigger_mode;
        self
    }

    pub fn is_actionable(&self) -> bool {
        self.action != ScalingAction::NoAction
    }
}
