//! scalesense-signal — per-metric signal analysis.
//!
//! Turns one telemetry series into a `SignalVerdict`: the trend of the
//! series (least-squares slope normalized by the mean) and whether its
//! variation is a real movement or measurement jitter (coefficient of
//! variation against a noise floor).
//!
//! # Architecture
//!
//! ```text
//! SignalAnalyzer (one per metric identity)
//!   ├── fetch_values()  → TelemetryStore::query(), failures → empty series
//!   ├── compute_trend() → TrendResult { direction, magnitude }
//!   ├── is_signal()     → coefficient of variation > noise threshold
//!   └── analyze()       → SignalVerdict
//!
//! TelemetryStore (trait, injected)
//!   └── InMemoryTelemetry → raw samples, bucketed per query period
//! ```

pub mod analyzer;
pub mod telemetry;

pub use analyzer::{compute_trend, is_signal, AnalyzerThresholds, SignalAnalyzer};
pub use telemetry::{
    Datapoint, InMemoryTelemetry, MetricQuery, Statistic, TelemetryError, TelemetryResult,
    TelemetryStore,
};
