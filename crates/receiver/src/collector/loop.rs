//! Periodic gather loop
//!
//! Runs one gather cycle per interval (plus jitter) until shutdown is
//! signalled.

use super::{Accumulator, Gather};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

/// Configuration for the gather loop
#[derive(Debug, Clone)]
pub struct GatherLoopConfig {
    /// Base gather interval (default: 60 seconds)
    pub interval: Duration,
    /// Maximum jitter added to the interval (default: 5 seconds)
    pub jitter: Duration,
}

impl Default for GatherLoopConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            jitter: Duration::from_secs(5),
        }
    }
}

/// Drives a [`Gather`] implementation on a fixed cadence
pub struct GatherLoop {
    gatherer: Arc<dyn Gather>,
    accumulator: Arc<dyn Accumulator>,
    config: GatherLoopConfig,
}

impl GatherLoop {
    pub fn new(
        gatherer: Arc<dyn Gather>,
        accumulator: Arc<dyn Accumulator>,
        config: GatherLoopConfig,
    ) -> Self {
        Self {
            gatherer,
            accumulator,
            config,
        }
    }

    /// Run until a shutdown message arrives; returns the number of cycles run
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting gather loop"
        );

        let mut ticker = interval(self.next_interval());
        let mut cycles = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.gatherer.gather(Arc::clone(&self.accumulator)).await;
                    cycles += 1;

                    if report.errors.is_empty() {
                        debug!(
                            cycle = cycles,
                            collected = report.collected,
                            elapsed_ms = report.elapsed.as_millis() as u64,
                            "Gather cycle complete"
                        );
                    } else {
                        warn!(
                            cycle = cycles,
                            collected = report.collected,
                            failed_targets = report.failed_targets(),
                            "Gather cycle completed with errors"
                        );
                    }

                    if report.elapsed > self.config.interval {
                        warn!(
                            elapsed_ms = report.elapsed.as_millis() as u64,
                            interval_secs = self.config.interval.as_secs(),
                            "Gather cycle took longer than the interval"
                        );
                    }

                    ticker = interval(self.next_interval());
                    // interval() fires immediately; consume that tick
                    ticker.tick().await;
                }
                _ = shutdown.recv() => {
                    info!(cycles, "Shutting down gather loop");
                    break;
                }
            }
        }

        cycles
    }

    fn next_interval(&self) -> Duration {
        let jitter_ms = rand_jitter(self.config.jitter.as_millis() as u64);
        // tokio::time::interval panics on a zero period
        (self.config.interval + Duration::from_millis(jitter_ms)).max(Duration::from_millis(1))
    }
}

/// Pseudo-random jitter in `0..max_ms`
fn rand_jitter(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }

    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    now % max_ms
}

/// Builder for [`GatherLoop`]
pub struct GatherLoopBuilder {
    gatherer: Option<Arc<dyn Gather>>,
    accumulator: Option<Arc<dyn Accumulator>>,
    config: GatherLoopConfig,
}

impl GatherLoopBuilder {
    pub fn new() -> Self {
        Self {
            gatherer: None,
            accumulator: None,
            config: GatherLoopConfig::default(),
        }
    }

    pub fn gatherer(mut self, gatherer: Arc<dyn Gather>) -> Self {
        self.gatherer = Some(gatherer);
        self
    }

    pub fn accumulator(mut self, accumulator: Arc<dyn Accumulator>) -> Self {
        self.accumulator = Some(accumulator);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> Result<GatherLoop> {
        let gatherer = self
            .gatherer
            .ok_or_else(|| anyhow::anyhow!("Gatherer is required"))?;
        let accumulator = self
            .accumulator
            .ok_or_else(|| anyhow::anyhow!("Accumulator is required"))?;

        Ok(GatherLoop::new(gatherer, accumulator, self.config))
    }
}

impl Default for GatherLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
