//! Per-metric scaling rules.
//!
//! Each metric kind maps to exactly one evaluator variant. An evaluator
//! looks at a (signal-classified) verdict and casts at most one vote.

use scalesense_core::{MetricKind, SignalVerdict};

/// CPU utilization (percent) above which an increasing trend votes up.
pub const CPU_HIGH_PERCENT: f64 = 70.0;
/// CPU utilization (percent) below which a decreasing trend votes down.
pub const CPU_LOW_PERCENT: f64 = 30.0;
pub const MEMORY_HIGH_PERCENT: f64 = 80.0;
pub const MEMORY_LOW_PERCENT: f64 = 40.0;
/// API latency (ms) above which an increasing trend votes up and escalates.
pub const LATENCY_HIGH_MS: f64 = 5000.0;
pub const INFERENCE_HIGH_MS: f64 = 3000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Vote {
    Up,
    Down,
    Abstain,
}

/// Outcome of one evaluator over one verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub vote: Vote,
    /// Present whenever a vote is cast.
    pub reason: Option<String>,
    /// The vote demands immediate (reactive) handling.
    pub escalate: bool,
}

impl Evaluation {
    fn abstain() -> Self {
        Self {
            vote: Vote::Abstain,
            reason: None,
            escalate: false,
        }
    }

    fn up(reason: String) -> Self {
        Self {
            vote: Vote::Up,
            reason: Some(reason),
            escalate: false,
        }
    }

    fn down(reason: String) -> Self {
        Self {
            vote: Vote::Down,
            reason: Some(reason),
            escalate: false,
        }
    }

    fn escalated(mut self) -> Self {
        self.escalate = true;
        self
    }
}

/// Closed set of metric rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricEvaluator {
    Cpu,
    Memory,
    Latency,
    Inference,
}

impl MetricEvaluator {
    pub fn for_kind(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Cpu => MetricEvaluator::Cpu,
            MetricKind::Memory => MetricEvaluator::Memory,
            MetricKind::Latency => MetricEvaluator::Latency,
            MetricKind::Inference => MetricEvaluator::Inference,
        }
    }

    /// Apply this metric's thresholds. Thresholds are strict.
    pub fn evaluate(&self, verdict: &SignalVerdict) -> Evaluation {
        let current = verdict.current;
        let rising = verdict.trend.is_increasing();
        let falling = verdict.trend.is_decreasing();

        match self {
            MetricEvaluator::Cpu => {
                if current > CPU_HIGH_PERCENT && rising {
                    Evaluation::up(format!(
                        "CPU: high utilization ({current}%) with increasing trend"
                    ))
                } else if current < CPU_LOW_PERCENT && falling {
                    Evaluation::down(format!(
                        "CPU: low utilization ({current}%) with decreasing trend"
                    ))
                } else {
                    Evaluation::abstain()
                }
            }
            MetricEvaluator::Memory => {
                if current > MEMORY_HIGH_PERCENT && rising {
                    Evaluation::up(format!(
                        "Memory: high utilization ({current}%) with increasing trend"
                    ))
                } else if current < MEMORY_LOW_PERCENT && falling {
                    Evaluation::down(format!(
                        "Memory: low utilization ({current}%) with decreasing trend"
                    ))
                } else {
                    Evaluation::abstain()
                }
            }
            MetricEvaluator::Latency => {
                if current > LATENCY_HIGH_MS && rising {
                    Evaluation::up(format!(
                        "API latency: sustained high latency ({current}ms) with increasing trend"
                    ))
                    .escalated()
                } else {
                    Evaluation::abstain()
                }
            }
            // No down rule: a fast inference call alone never shrinks capacity.
            MetricEvaluator::Inference => {
                if current > INFERENCE_HIGH_MS && rising {
                    Evaluation::up(format!(
                        "Inference: duration ({current}ms) increasing, likely due to concurrency limits"
                    ))
                } else {
                    Evaluation::abstain()
                }
            }
        }
    }
}
