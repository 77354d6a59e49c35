//! poserelay standalone node
//!
//! Relays pose telemetry for a dynamically growing set of simulated
//! agents. Reads one JSON-encoded snapshot per stdin line, writes one
//! JSON-encoded output record per stdout line (logs go to stderr).
//!
//! Two stages mirror the upstream pipeline:
//! - `ground-truth`: consolidate raw producer snapshots (filter by
//!   prefix, rename, sort) and republish per-agent poses
//! - `noisy`: perturb already-canonical snapshots with uniform noise and
//!   republish per-agent pose+covariance plus a bounded recent path

use anyhow::Result;
use clap::{Parser, ValueEnum};
use poserelay_core::{NoiseModel, NoiseStrategy, RelayConfig, RelayScheduler};
use poserelay_env::{JsonLineTransport, RelayContext, TokioContext};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Which stage of the relay pipeline this process runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Stage {
    /// Consolidate raw snapshots, republish ground-truth poses
    GroundTruth,
    /// Inject noise, republish pose+covariance and bounded paths
    Noisy,
}

/// Pose telemetry relay for simulated multi-agent environments
#[derive(Parser, Debug)]
#[command(name = "poserelay-node")]
#[command(about = "Relay per-agent pose streams from consolidated snapshots", long_about = None)]
struct Args {
    /// Pipeline stage to run
    #[arg(short, long, value_enum, default_value = "ground-truth")]
    stage: Stage,

    /// Producer-side name prefix selecting agents of interest
    /// (ground-truth stage only; the noisy stage consumes canonical names)
    #[arg(short, long, default_value = "sim_")]
    prefix: String,

    /// Publish tick rate in Hz
    #[arg(long, default_value = "30")]
    publish_rate: u32,

    /// History tick rate in Hz
    #[arg(long, default_value = "10")]
    history_rate: u32,

    /// Bounded path history capacity per agent
    #[arg(long, default_value = "400")]
    history_capacity: usize,

    /// Uniform noise band width in meters (noisy stage)
    #[arg(long, default_value = "1.0")]
    noise_offset: f64,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging on stderr - stdout carries the output records
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let tag = "agent".to_string();
    let config = RelayConfig {
        prefix: match args.stage {
            Stage::GroundTruth => args.prefix.clone(),
            // Prefix == tag makes consolidation a pass-through filter.
            Stage::Noisy => tag.clone(),
        },
        tag,
        publish_rate_hz: args.publish_rate,
        history_rate_hz: args.history_rate,
        history_capacity: args.history_capacity,
        noise_offset: args.noise_offset,
    };

    info!(stage = ?args.stage, prefix = %config.prefix, "poserelay node starting");

    let context = TokioContext::shared();
    let transport = Arc::new(JsonLineTransport::new());

    let scheduler = match args.stage {
        Stage::GroundTruth => Arc::new(RelayScheduler::new(context.clone(), transport, config)),
        Stage::Noisy => {
            let noise = NoiseModel::new(NoiseStrategy::Uniform {
                offset: config.noise_offset,
            });
            Arc::new(RelayScheduler::with_noise(
                context.clone(),
                transport,
                config,
                noise,
            ))
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    context.spawn("shutdown-signal", async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    scheduler.run(shutdown_rx).await;
    Ok(())
}
