//! Azure Monitor agent
//!
//! Runs the receiver on a fixed interval and writes every collected
//! measurement to stdout as one JSON object per line.

use anyhow::{Context, Result};
use azmon_receiver::{
    api::{self, AppState},
    client::ReplayClientFactory,
    collector::{AccumulatorEvent, ChannelAccumulator, GatherLoopBuilder},
    health::HealthRegistry,
    AzureMonitorReceiver, ReceiverMetrics,
};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

/// Collect Azure Monitor metrics and emit them as JSON lines
#[derive(Parser)]
#[command(name = "azmon-agent")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; `AZMON_` environment variables override it
    #[arg(long, short, env = "AZMON_CONFIG")]
    config: Option<PathBuf>,

    /// Replay snapshot serving resource metadata and metric values
    #[arg(long, env = "AZMON_FIXTURE")]
    fixture: PathBuf,

    /// Run a single gather cycle and exit
    #[arg(long)]
    once: bool,

    /// Print the final resource targets and exit
    #[arg(long, conflicts_with = "once")]
    print_targets: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logs go to stderr so stdout carries only measurements
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = config::AgentConfig::load(args.config.as_deref())?;
    info!(
        subscription_id = %config.receiver.subscription_id,
        interval_secs = config.interval_secs,
        "Agent configured"
    );

    let health_registry = HealthRegistry::new();
    let metrics = ReceiverMetrics::new();

    let factory = ReplayClientFactory::from_path(&args.fixture)
        .with_context(|| format!("Failed to load replay snapshot {}", args.fixture.display()))?;

    let receiver = AzureMonitorReceiver::init_with_health(
        &config.receiver,
        &factory,
        Some(health_registry.clone()),
    )
    .await
    .context("Failed to initialize Azure Monitor receiver")?;

    if args.print_targets {
        let stdout = std::io::stdout();
        let mut out = stdout.lock();
        for target in receiver.targets() {
            writeln!(out, "{}", serde_json::to_string(target)?)?;
        }
        return Ok(());
    }

    let (accumulator, events) = ChannelAccumulator::new();
    let writer = tokio::spawn(write_events(events));

    if args.once {
        let report = receiver.gather(Arc::new(accumulator)).await;
        writer.await?;
        info!(
            collected = report.collected,
            failed_targets = report.failed_targets(),
            "Single gather cycle finished"
        );
        return Ok(());
    }

    let app_state = Arc::new(AppState::new(health_registry.clone(), metrics));
    let api_port = config.api_port;
    tokio::spawn(async move {
        if let Err(e) = api::serve(api_port, app_state).await {
            error!(error = %e, "Health and metrics server stopped");
        }
    });
    health_registry.set_ready(true).await;

    let receiver = Arc::new(receiver);
    let gather_loop = GatherLoopBuilder::new()
        .gatherer(receiver.clone())
        .accumulator(Arc::new(accumulator))
        .interval(config.interval())
        .jitter(config.jitter())
        .build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let loop_handle = tokio::spawn(gather_loop.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    receiver.log_shutdown("SIGINT received");
    health_registry.set_ready(false).await;
    let _ = shutdown_tx.send(());

    loop_handle.await?;
    writer.await?;
    info!("Shutdown complete");

    Ok(())
}

/// Drain accumulator events: measurements to stdout, errors to the log
async fn write_events(mut events: mpsc::UnboundedReceiver<AccumulatorEvent>) {
    let stdout = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            AccumulatorEvent::Metric(metric) => match serde_json::to_string(&metric) {
                Ok(line) => {
                    let mut out = stdout.lock();
                    if let Err(e) = writeln!(out, "{}", line) {
                        warn!(error = %e, "Failed to write measurement");
                    }
                }
                Err(e) => warn!(error = %e, measurement = %metric.name, "Failed to encode measurement"),
            },
            AccumulatorEvent::Error(message) => {
                warn!(error = %message, "Gather error");
            }
        }
    }
}
