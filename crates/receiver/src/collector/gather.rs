//! Concurrent metric collection over the final target list
//!
//! One task per target, all against the same metrics client. A failing or
//! hanging target only costs its own measurements; the cycle ends once
//! every task has returned.

use super::Accumulator;
use crate::client::{MetricsClient, MetricsQuery};
use crate::error::CallError;
use crate::models::{MetricValue, ResourceTarget};
use crate::resource_id::ResourceId;
use crate::time_grain::TimeGrain;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

/// Collector settings
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound for a single metrics query (default: 30 seconds)
    pub request_timeout: Duration,
    /// Maximum queries in flight; `None` runs every target at once
    pub max_concurrent_requests: Option<usize>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_concurrent_requests: None,
        }
    }
}

/// A requested metric for which the API returned no data point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingMetric {
    pub resource_id: String,
    pub metric: String,
}

/// Outcome of one gather cycle
#[derive(Debug, Default)]
pub struct GatherReport {
    pub targets: usize,
    pub collected: usize,
    pub not_collected: Vec<MissingMetric>,
    pub errors: Vec<CallError>,
    pub elapsed: Duration,
}

impl GatherReport {
    pub fn failed_targets(&self) -> usize {
        self.errors.len()
    }
}

/// Result of one target's task
#[derive(Debug, Default)]
struct TargetOutcome {
    collected: usize,
    not_collected: Vec<MissingMetric>,
    error: Option<CallError>,
}

/// Runs one metrics query per target, concurrently
pub struct Collector {
    client: Arc<dyn MetricsClient>,
    config: CollectorConfig,
}

impl Collector {
    pub fn new(client: Arc<dyn MetricsClient>, config: CollectorConfig) -> Self {
        Self { client, config }
    }

    /// Collect every target once and wait for all of them.
    ///
    /// Measurements reach `acc` as soon as their target's query returns;
    /// call failures go to `acc.add_error` and into the report.
    pub async fn collect(
        &self,
        targets: Arc<[ResourceTarget]>,
        acc: Arc<dyn Accumulator>,
    ) -> GatherReport {
        let start = Instant::now();
        let now = Utc::now();
        let semaphore = self
            .config
            .max_concurrent_requests
            .map(|limit| Arc::new(Semaphore::new(limit.max(1))));

        let mut tasks = Vec::with_capacity(targets.len());
        for index in 0..targets.len() {
            let resource_id = targets[index].resource_id.clone();
            let task_targets = Arc::clone(&targets);
            let client = Arc::clone(&self.client);
            let acc = Arc::clone(&acc);
            let semaphore = semaphore.clone();
            let request_timeout = self.config.request_timeout;

            let task = tokio::spawn(async move {
                let _permit = match semaphore {
                    Some(semaphore) => semaphore.acquire_owned().await.ok(),
                    None => None,
                };
                let target = &task_targets[index];
                debug!(resource_id = %target.resource_id, "Collecting metrics for resource target");

                collect_target(client.as_ref(), target, request_timeout, now, acc.as_ref()).await
            });

            tasks.push((resource_id, task));
        }

        let mut report = GatherReport {
            targets: targets.len(),
            ..Default::default()
        };

        for (resource_id, task) in tasks {
            let outcome = match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    let error = CallError::TaskFailed {
                        resource_id,
                        message: e.to_string(),
                    };
                    acc.add_error(&error);
                    TargetOutcome {
                        error: Some(error),
                        ..Default::default()
                    }
                }
            };

            report.collected += outcome.collected;
            report.not_collected.extend(outcome.not_collected);
            report.errors.extend(outcome.error);
        }

        report.elapsed = start.elapsed();
        report
    }
}

/// Query one target and hand its measurements to the accumulator
async fn collect_target(
    client: &dyn MetricsClient,
    target: &ResourceTarget,
    request_timeout: Duration,
    now: DateTime<Utc>,
    acc: &dyn Accumulator,
) -> TargetOutcome {
    let query = MetricsQuery::latest(
        target.resource_id.clone(),
        target.metrics.clone(),
        target.aggregations.clone(),
        target.time_grain.unwrap_or(TimeGrain::ONE_MINUTE),
        now,
    );

    let values = match timeout(request_timeout, client.query(&query)).await {
        Ok(Ok(values)) => values,
        Ok(Err(source)) => {
            let error = CallError::Client {
                resource_id: target.resource_id.clone(),
                source,
            };
            warn!(error = %error, "Failed to collect metrics");
            acc.add_error(&error);
            return TargetOutcome {
                error: Some(error),
                ..Default::default()
            };
        }
        Err(_) => {
            let error = CallError::Timeout {
                resource_id: target.resource_id.clone(),
                after: request_timeout,
            };
            warn!(error = %error, "Metrics query timed out");
            acc.add_error(&error);
            return TargetOutcome {
                error: Some(error),
                ..Default::default()
            };
        }
    };

    let tags = resource_tags(&target.resource_id);
    let namespace = tags.get("namespace").cloned().unwrap_or_default();
    let mut outcome = TargetOutcome::default();

    for metric in &target.metrics {
        let fields = values
            .iter()
            .find(|v| v.name.eq_ignore_ascii_case(metric))
            .map(|v| (v, fields_for(v, target)))
            .filter(|(_, fields)| !fields.is_empty());

        match fields {
            Some((value, fields)) => {
                let mut tags = tags.clone();
                if let Some(unit) = &value.unit {
                    tags.insert("unit".to_string(), unit.clone());
                }
                acc.add_fields(
                    &measurement_name(&namespace, metric),
                    fields,
                    tags,
                    value.timestamp,
                );
                outcome.collected += 1;
            }
            None => {
                info!(
                    resource_id = %target.resource_id,
                    metric = %metric,
                    "Did not get any metric value from Azure Monitor API"
                );
                outcome.not_collected.push(MissingMetric {
                    resource_id: target.resource_id.clone(),
                    metric: metric.clone(),
                });
            }
        }
    }

    outcome
}

/// One field per requested aggregation that came back with a value
fn fields_for(value: &MetricValue, target: &ResourceTarget) -> BTreeMap<String, f64> {
    target
        .aggregations
        .iter()
        .filter_map(|agg| {
            value
                .values
                .get(agg)
                .map(|v| (agg.field_name().to_string(), *v))
        })
        .collect()
}

/// Tags identifying the resource a measurement belongs to
pub fn resource_tags(resource_id: &str) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("resource_id".to_string(), resource_id.to_string());

    if let Ok(id) = resource_id.parse::<ResourceId>() {
        tags.insert("subscription_id".to_string(), id.subscription_id().to_string());
        tags.insert("resource_group".to_string(), id.resource_group().to_string());
        tags.insert("resource_name".to_string(), id.resource_name().to_string());
        tags.insert("namespace".to_string(), id.resource_type().to_string());
    }

    tags
}

/// `azure_monitor_<resource type>_<metric>`, lowercased with separators folded
pub fn measurement_name(resource_type: &str, metric: &str) -> String {
    fn fold(part: &str) -> String {
        part.chars()
            .map(|c| match c {
                '/' | '.' | ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect()
    }

    if resource_type.is_empty() {
        format!("azure_monitor_{}", fold(metric))
    } else {
        format!("azure_monitor_{}_{}", fold(resource_type), fold(metric))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_measurement_name() {
        assert_eq!(
            measurement_name("Microsoft.Compute/virtualMachines", "Percentage CPU"),
            "azure_monitor_microsoft_compute_virtualmachines_percentage_cpu"
        );
        assert_eq!(
            measurement_name("Microsoft.Web/sites", "Http5xx"),
            "azure_monitor_microsoft_web_sites_http5xx"
        );
        assert_eq!(measurement_name("", "Requests"), "azure_monitor_requests");
    }

    #[test]
    fn test_resource_tags() {
        let tags = resource_tags(
            "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm-01",
        );

        assert_eq!(tags["subscription_id"], "sub-1");
        assert_eq!(tags["resource_group"], "rg-app");
        assert_eq!(tags["resource_name"], "vm-01");
        assert_eq!(tags["namespace"], "Microsoft.Compute/virtualMachines");

        let tags = resource_tags("not-an-arm-id");
        assert_eq!(tags.len(), 1);
        assert_eq!(tags["resource_id"], "not-an-arm-id");
    }
}
