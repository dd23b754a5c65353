//! Output sinks for collected measurements

use crate::error::CallError;
use crate::models::CollectedMetric;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::warn;

/// Destination for measurements and gather errors.
///
/// Every collection task writes through the same accumulator at the same
/// time, so implementations must be safe for concurrent use.
pub trait Accumulator: Send + Sync {
    fn add_fields(
        &self,
        measurement: &str,
        fields: BTreeMap<String, f64>,
        tags: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
    );

    fn add_error(&self, error: &CallError);
}

/// Accumulator that keeps everything in memory
#[derive(Debug, Default)]
pub struct MemoryAccumulator {
    metrics: Mutex<Vec<CollectedMetric>>,
    errors: Mutex<Vec<String>>,
}

impl MemoryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metrics(&self) -> Vec<CollectedMetric> {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Accumulator for MemoryAccumulator {
    fn add_fields(
        &self,
        measurement: &str,
        fields: BTreeMap<String, f64>,
        tags: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
    ) {
        self.metrics
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(CollectedMetric {
                name: measurement.to_string(),
                fields,
                tags,
                timestamp,
            });
    }

    fn add_error(&self, error: &CallError) {
        self.errors
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(error.to_string());
    }
}

/// Item forwarded by [`ChannelAccumulator`]
#[derive(Debug, Clone)]
pub enum AccumulatorEvent {
    Metric(CollectedMetric),
    Error(String),
}

/// Accumulator that forwards everything to a channel consumer
#[derive(Debug, Clone)]
pub struct ChannelAccumulator {
    tx: mpsc::UnboundedSender<AccumulatorEvent>,
}

impl ChannelAccumulator {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AccumulatorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: AccumulatorEvent) {
        if self.tx.send(event).is_err() {
            warn!("Accumulator receiver dropped, discarding event");
        }
    }
}

impl Accumulator for ChannelAccumulator {
    fn add_fields(
        &self,
        measurement: &str,
        fields: BTreeMap<String, f64>,
        tags: BTreeMap<String, String>,
        timestamp: DateTime<Utc>,
    ) {
        self.send(AccumulatorEvent::Metric(CollectedMetric {
            name: measurement.to_string(),
            fields,
            tags,
            timestamp,
        }));
    }

    fn add_error(&self, error: &CallError) {
        self.send(AccumulatorEvent::Error(error.to_string()));
    }
}
