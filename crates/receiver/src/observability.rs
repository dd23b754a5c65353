//! Self-metrics and lifecycle logging for the receiver
//!
//! Provides:
//! - Prometheus metrics (gather latency, target count, collection outcomes)
//! - Structured JSON lifecycle events through tracing

use crate::collector::GatherReport;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for gather latency (in seconds)
const GATHER_LATENCY_BUCKETS: &[f64] = &[
    0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0,
];

static GLOBAL_METRICS: OnceLock<ReceiverMetricsInner> = OnceLock::new();

struct ReceiverMetricsInner {
    gather_latency_seconds: Histogram,
    gather_cycles: IntCounter,
    targets: IntGauge,
    metrics_collected: IntCounter,
    metrics_not_collected: IntCounter,
    call_errors: IntCounterVec,
}

impl ReceiverMetricsInner {
    fn new() -> Self {
        Self {
            gather_latency_seconds: register_histogram!(
                "azmon_receiver_gather_latency_seconds",
                "Wall time of one gather cycle across all targets",
                GATHER_LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register gather_latency_seconds"),

            gather_cycles: register_int_counter!(
                "azmon_receiver_gather_cycles_total",
                "Number of gather cycles run"
            )
            .expect("Failed to register gather_cycles_total"),

            targets: register_int_gauge!(
                "azmon_receiver_targets",
                "Number of final resource targets collected each cycle"
            )
            .expect("Failed to register targets"),

            metrics_collected: register_int_counter!(
                "azmon_receiver_metrics_collected_total",
                "Measurements handed to the accumulator"
            )
            .expect("Failed to register metrics_collected_total"),

            metrics_not_collected: register_int_counter!(
                "azmon_receiver_metrics_not_collected_total",
                "Requested metrics for which the API returned no value"
            )
            .expect("Failed to register metrics_not_collected_total"),

            call_errors: register_int_counter_vec!(
                "azmon_receiver_call_errors_total",
                "Failed metrics queries by failure kind",
                &["kind"]
            )
            .expect("Failed to register call_errors_total"),
        }
    }
}

/// Handle to the process-wide receiver metrics
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct ReceiverMetrics {
    inner: &'static ReceiverMetricsInner,
}

impl Default for ReceiverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceiverMetrics {
    pub fn new() -> Self {
        Self {
            inner: GLOBAL_METRICS.get_or_init(ReceiverMetricsInner::new),
        }
    }

    pub fn set_targets(&self, count: usize) {
        self.inner.targets.set(count as i64);
    }

    /// Fold one gather cycle into the counters
    pub fn record_gather(&self, report: &GatherReport) {
        self.inner
            .gather_latency_seconds
            .observe(report.elapsed.as_secs_f64());
        self.inner.gather_cycles.inc();
        self.inner.metrics_collected.inc_by(report.collected as u64);
        self.inner
            .metrics_not_collected
            .inc_by(report.not_collected.len() as u64);

        for error in &report.errors {
            let kind = match error {
                crate::error::CallError::Client { .. } => "client",
                crate::error::CallError::Timeout { .. } => "timeout",
                crate::error::CallError::TaskFailed { .. } => "task",
            };
            self.inner.call_errors.with_label_values(&[kind]).inc();
        }
    }

    /// Render every registered collector in the Prometheus text format
    pub fn encode(&self) -> Result<Vec<u8>, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&prometheus::gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Structured logger for receiver lifecycle events
#[derive(Clone)]
pub struct StructuredLogger {
    subscription_id: String,
}

impl StructuredLogger {
    pub fn new(subscription_id: impl Into<String>) -> Self {
        Self {
            subscription_id: subscription_id.into(),
        }
    }

    pub fn log_startup(&self, version: &str, credentials: &str) {
        info!(
            event = "receiver_started",
            subscription_id = %self.subscription_id,
            receiver_version = %version,
            credentials = %credentials,
            "Azure Monitor receiver started"
        );
    }

    pub fn log_targets_built(&self, targets: usize, elapsed_ms: u64) {
        info!(
            event = "targets_built",
            subscription_id = %self.subscription_id,
            targets = targets,
            elapsed_ms = elapsed_ms,
            "Resource targets built"
        );
    }

    pub fn log_gather(&self, report: &GatherReport) {
        if report.errors.is_empty() {
            info!(
                event = "gather_completed",
                subscription_id = %self.subscription_id,
                targets = report.targets,
                collected = report.collected,
                not_collected = report.not_collected.len(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Gather cycle completed"
            );
        } else {
            warn!(
                event = "gather_completed",
                subscription_id = %self.subscription_id,
                targets = report.targets,
                collected = report.collected,
                not_collected = report.not_collected.len(),
                failed_targets = report.failed_targets(),
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Gather cycle completed with failed targets"
            );
        }
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "receiver_shutdown",
            subscription_id = %self.subscription_id,
            reason = %reason,
            "Azure Monitor receiver shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CallError, ClientError};
    use std::time::Duration;

    #[test]
    fn test_receiver_metrics_record_gather() {
        let metrics = ReceiverMetrics::new();
        let before = metrics.inner.metrics_collected.get();

        metrics.set_targets(3);
        metrics.record_gather(&GatherReport {
            targets: 3,
            collected: 4,
            not_collected: vec![],
            errors: vec![CallError::Client {
                resource_id: "r".to_string(),
                source: ClientError::Request("boom".to_string()),
            }],
            elapsed: Duration::from_millis(120),
        });

        assert!(metrics.inner.metrics_collected.get() >= before + 4);
        assert!(metrics.inner.call_errors.with_label_values(&["client"]).get() >= 1);

        let text = String::from_utf8(metrics.encode().unwrap()).unwrap();
        assert!(text.contains("azmon_receiver_gather_cycles_total"));
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("sub-1");
        assert_eq!(logger.subscription_id, "sub-1");
    }
}
