//! Observation type and the sink collaborator.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use scalesense_core::Dimension;

/// Result type alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    #[error("observation rejected: {0}")]
    Rejected(String),
}

/// Unit attached to an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Unit {
    #[default]
    None,
    Count,
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Unit::None => write!(f, "None"),
            Unit::Count => write!(f, "Count"),
        }
    }
}

/// One named value published to a sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub namespace: String,
    pub name: String,
    pub value: f64,
    pub unit: Unit,
    pub timestamp: DateTime<Utc>,
    pub dimensions: Vec<Dimension>,
}

impl Observation {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        value: f64,
        unit: Unit,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            value,
            unit,
            timestamp: Utc::now(),
            dimensions: Vec::new(),
        }
    }

    pub fn with_dimensions(mut self, dimensions: Vec<Dimension>) -> Self {
        self.dimensions = dimensions;
        self
    }
}

/// Destination for observations. Fire-and-forget from the caller's view.
#[async_trait]
pub trait ObservabilitySink: Send + Sync {
    async fn publish(&self, observation: &Observation) -> SinkResult<()>;
}

/// Emits each observation as a structured tracing event.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

#[async_trait]
impl ObservabilitySink for LogSink {
    async fn publish(&self, observation: &Observation) -> SinkResult<()> {
        let dimensions = observation
            .dimensions
            .iter()
            .map(|d| format!("{}={}", d.name, d.value))
            .collect::<Vec<_>>()
            .join(",");
        info!(
            namespace = %observation.namespace,
            name = %observation.name,
            value = observation.value,
            unit = %observation.unit,
            %dimensions,
            "observation"
        );
        Ok(())
    }
}

/// Publishes to every inner sink, even after one fails.
///
/// Returns the first error seen, if any.
#[derive(Clone, Default)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn ObservabilitySink>>,
}

impl FanoutSink {
    pub fn new(sinks: Vec<Arc<dyn ObservabilitySink>>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl ObservabilitySink for FanoutSink {
    async fn publish(&self, observation: &Observation) -> SinkResult<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.publish(observation).await
                && first_error.is_none()
            {
                first_error = Some(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
