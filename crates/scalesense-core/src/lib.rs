//! scalesense-core — shared types for the Scalesense decision engine.
//!
//! Holds the per-cycle data model (metric verdicts, trend results, the
//! final `Decision` record) and the `ScalerConfig` loaded from defaults,
//! an optional TOML file, and environment variables.

pub mod config;
pub mod error;
pub mod types;

pub use config::ScalerConfig;
pub use error::{ConfigError, ConfigResult};
pub use types::*;
