//! scalesense-metrics — observability for scaling decisions.
//!
//! Every cycle publishes a handful of named, unit-tagged observations
//! (`ScalingDecision`, `ExecutionSuccess`, `ExecutionFailure`) tagged with
//! the workload identity. Sinks are best-effort: callers log and drop
//! publish errors.
//!
//! # Architecture
//!
//! ```text
//! ObservabilitySink (trait, injected)
//!   ├── LogSink        → structured tracing event per observation
//!   ├── PrometheusSink → latest value per series, text exposition
//!   └── FanoutSink     → publish to several sinks
//! ```

pub mod prometheus;
pub mod sink;

pub use prometheus::{render_prometheus, PrometheusSink};
pub use sink::{FanoutSink, LogSink, Observation, ObservabilitySink, SinkError, SinkResult, Unit};
