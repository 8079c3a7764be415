//! scalesense-engine — correlates metric signals into scaling decisions.
//!
//! A cycle fetches four telemetry series, classifies each one (trend +
//! signal/noise), lets each metric's evaluator cast at most one vote, and
//! acts only when at least two metrics agree.
//!
//! # Decision Algorithm
//!
//! ```text
//! for metric in [cpu, memory, latency, inference]:
//!     if not is_signal: reason "filtered as noise", no vote
//!     cpu:       > 70% & increasing → up    | < 30% & decreasing → down
//!     memory:    > 80% & increasing → up    | < 40% & decreasing → down
//!     latency:   > 5000ms & increasing → up, mode = reactive
//!     inference: > 3000ms & increasing → up
//!
//! up >= 2   → scale_up
//! down >= 2 → scale_down
//! otherwise → none
//! reasons = [summary] + per-metric reasons
//! ```
//!
//! The `Controller` is the cycle entry point: it classifies the trigger,
//! builds a fresh `DecisionEngine`, records the decision, hands it to an
//! optional actuator, and converts any failure into a 500-style response.

pub mod controller;
pub mod engine;
pub mod evaluator;

pub use controller::{
    ActuatorFn, ActuatorFuture, Controller, CycleResponse, EXECUTION_FAILURE_METRIC,
    EXECUTION_SUCCESS_METRIC, ScaleRequest, TriggerEvent,
};
pub use engine::{DecisionEngine, CORRELATION_THRESHOLD, SCALING_DECISION_METRIC};
pub use evaluator::{Evaluation, MetricEvaluator, Vote};
