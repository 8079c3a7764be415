//! scalesensed — the Scalesense daemon.
//!
//! Assembles the controller from configuration and runs it either once
//! (`evaluate`) or as a long-lived service (`serve`) with the REST API,
//! Prometheus exposition and a proactive evaluation loop.
//!
//! # Usage
//!
//! ```text
//! scalesensed evaluate --fixture telemetry.json --event alarm.json
//! scalesensed serve --port 8080 --interval-secs 60 --config scalesense.toml
//! ```

mod oneshot;
mod server;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use scalesense_core::ScalerConfig;
use scalesense_engine::{ActuatorFn, ActuatorFuture, ScaleRequest};

#[derive(Parser)]
#[command(name = "scalesensed", about = "Scalesense autoscaling daemon")]
struct Cli {
    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a single evaluation cycle and print its result.
    Evaluate {
        /// TOML configuration file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,

        /// JSON trigger event. Defaults to a scheduled trigger.
        #[arg(long)]
        event: Option<PathBuf>,

        /// JSON telemetry fixture to evaluate against.
        #[arg(long)]
        fixture: Option<PathBuf>,
    },
    /// Serve the API and run proactive evaluations on an interval.
    Serve {
        /// Port to listen on.
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Seconds between proactive evaluations.
        #[arg(long, default_value = "60")]
        interval_secs: u64,

        /// TOML configuration file. Environment variables override it.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    match cli.command {
        Command::Evaluate {
            config,
            event,
            fixture,
        } => {
            let config = load_config(config.as_deref())?;
            oneshot::run(config, event.as_deref(), fixture.as_deref()).await
        }
        Command::Serve {
            port,
            interval_secs,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            server::run(config, port, interval_secs).await
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("info,scalesense=debug,scalesensed=debug")
        });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// File (if given) first, then the process environment on top.
fn load_config(path: Option<&Path>) -> anyhow::Result<ScalerConfig> {
    let mut config = match path {
        Some(path) => ScalerConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ScalerConfig::default(),
    };
    config
        .apply_env(|var| std::env::var(var).ok())
        .context("invalid environment override")?;

    info!(
        cluster = %config.cluster_name,
        namespace = %config.namespace,
        deployment = %config.deployment_name,
        "configuration loaded"
    );
    Ok(config)
}

/// Actuator that records the request instead of mutating the workload.
fn logging_actuator() -> ActuatorFn {
    Arc::new(|request: ScaleRequest| -> ActuatorFuture {
        Box::pin(async move {
            info!(
                cluster = %request.cluster_name,
                namespace = %request.namespace,
                deployment = %request.deployment_name,
                action = %request.action,
                mode = %request.mode,
                min_replicas = request.min_replicas,
                max_replicas = request.max_replicas,
                "scale request"
            );
            Ok(())
        })
    })
}
