//! Receiver facade: one-time setup plus repeatable gather cycles

use crate::client::{AzureClients, ClientFactory};
use crate::collector::{Accumulator, Collector, CollectorConfig, Gather, GatherReport};
use crate::config::ReceiverConfig;
use crate::error::SetupError;
use crate::health::{components, HealthRegistry};
use crate::models::ResourceTarget;
use crate::observability::{ReceiverMetrics, StructuredLogger};
use crate::targets::TargetPipeline;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Azure Monitor metrics receiver
///
/// [`AzureMonitorReceiver::init`] validates configuration, creates clients
/// and builds the final target list. The list is immutable afterwards;
/// [`AzureMonitorReceiver::gather`] can be called any number of times.
pub struct AzureMonitorReceiver {
    subscription_id: String,
    targets: Arc<[ResourceTarget]>,
    collector: Collector,
    metrics: ReceiverMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl AzureMonitorReceiver {
    /// Run every setup step; any failure aborts initialization
    pub async fn init(
        config: &ReceiverConfig,
        factory: &dyn ClientFactory,
    ) -> Result<Self, SetupError> {
        Self::init_with_health(config, factory, None).await
    }

    /// Like [`init`](Self::init), reporting progress into a health registry
    pub async fn init_with_health(
        config: &ReceiverConfig,
        factory: &dyn ClientFactory,
        health: Option<HealthRegistry>,
    ) -> Result<Self, SetupError> {
        let (clients, targets) = Self::setup(config, factory, health.as_ref()).await?;

        let metrics = ReceiverMetrics::new();
        metrics.set_targets(targets.len());
        if let Some(health) = &health {
            health.register(components::COLLECTOR).await;
        }

        Ok(Self {
            subscription_id: config.subscription_id.clone(),
            targets: Arc::from(targets),
            collector: Collector::new(
                clients.metrics,
                CollectorConfig {
                    request_timeout: config.request_timeout(),
                    max_concurrent_requests: config.max_concurrent_requests,
                },
            ),
            metrics,
            logger: StructuredLogger::new(&config.subscription_id),
            health,
        })
    }

    async fn setup(
        config: &ReceiverConfig,
        factory: &dyn ClientFactory,
        health: Option<&HealthRegistry>,
    ) -> Result<(AzureClients, Vec<ResourceTarget>), SetupError> {
        config.validate()?;
        let credentials = config.credentials()?;
        let targets = config.targets()?;

        let logger = StructuredLogger::new(&config.subscription_id);
        logger.log_startup(env!("CARGO_PKG_VERSION"), credentials.kind());

        let clients = match factory
            .create_clients(&config.subscription_id, &credentials)
            .await
        {
            Ok(clients) => clients,
            Err(e) => {
                if let Some(health) = health {
                    health
                        .set_unhealthy(components::CLIENTS, e.to_string())
                        .await;
                }
                return Err(SetupError::ClientCreation(e));
            }
        };
        if let Some(health) = health {
            health.register(components::CLIENTS).await;
        }

        let start = Instant::now();
        let built = TargetPipeline::new(Arc::clone(&clients.metadata))
            .strict_metrics(config.strict_metrics)
            .build(targets)
            .await;

        let built = match built {
            Ok(built) => built,
            Err(e) => {
                if let Some(health) = health {
                    health
                        .set_unhealthy(components::TARGETS, e.to_string())
                        .await;
                }
                return Err(e);
            }
        };
        if let Some(health) = health {
            health.register(components::TARGETS).await;
        }

        logger.log_targets_built(built.len(), start.elapsed().as_millis() as u64);
        for target in &built {
            debug!(
                resource_id = %target.resource_id,
                metrics = ?target.metrics,
                aggregations = ?target.aggregations,
                time_grain = ?target.time_grain.map(|g| g.to_string()),
                "Resource target"
            );
        }

        Ok((clients, built))
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    /// The final, collection-ready targets
    pub fn targets(&self) -> &[ResourceTarget] {
        &self.targets
    }

    /// Run one gather cycle over every target
    pub async fn gather(&self, acc: Arc<dyn Accumulator>) -> GatherReport {
        info!(targets = self.targets.len(), "Starting gather cycle");
        let report = self
            .collector
            .collect(Arc::clone(&self.targets), acc)
            .await;

        self.metrics.record_gather(&report);
        self.logger.log_gather(&report);
        if let Some(health) = &self.health {
            health
                .record_gather(report.targets, report.failed_targets())
                .await;
        }

        report
    }

    pub fn log_shutdown(&self, reason: &str) {
        self.logger.log_shutdown(reason);
    }
}

#[async_trait]
impl Gather for AzureMonitorReceiver {
    async fn gather(&self, acc: Arc<dyn Accumulator>) -> GatherReport {
        AzureMonitorReceiver::gather(self, acc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{async_trait, Credentials, ReplayClientFactory, Snapshot};
    use crate::collector::MemoryAccumulator;
    use crate::config::ResourceConfig;
    use crate::error::{ClientError, ConfigError};
    use crate::health::ComponentStatus;
    use crate::models::{Aggregation, MetricDefinition, MetricValue, ResourceInfo};
    use crate::time_grain::TimeGrain;
    use chrono::Utc;

    const VM_TYPE: &str = "Microsoft.Compute/virtualMachines";

    fn vm(name: &str) -> ResourceInfo {
        ResourceInfo {
            id: format!(
                "/subscriptions/sub-1/resourceGroups/rg-a/providers/{}/{}",
                VM_TYPE, name
            ),
            name: name.to_string(),
            resource_type: VM_TYPE.to_string(),
            resource_group: "rg-a".to_string(),
            location: None,
        }
    }

    fn snapshot() -> Snapshot {
        let cpu = MetricValue {
            name: "Percentage CPU".to_string(),
            unit: Some("Percent".to_string()),
            timestamp: Utc::now(),
            values: [(Aggregation::Average, 7.5)].into_iter().collect(),
        };

        Snapshot::default()
            .with_resource(vm("vm-1"))
            .with_resource(vm("vm-2"))
            .with_definitions(
                VM_TYPE,
                vec![MetricDefinition {
                    name: "Percentage CPU".to_string(),
                    primary_aggregation: Aggregation::Average,
                    supported_aggregations: Aggregation::ALL.to_vec(),
                    time_grains: vec![TimeGrain::ONE_MINUTE],
                }],
            )
            .with_values(vm("vm-1").id, vec![cpu.clone()])
            .with_values(vm("vm-2").id, vec![cpu])
    }

    fn config() -> ReceiverConfig {
        ReceiverConfig {
            subscription_id: "sub-1".to_string(),
            subscription_targets: vec![ResourceConfig {
                resource_type: VM_TYPE.to_string(),
                metrics: vec!["Percentage CPU".to_string()],
                aggregations: vec![],
            }],
            ..Default::default()
        }
    }

    struct RejectingFactory;

    #[async_trait]
    impl ClientFactory for RejectingFactory {
        async fn create_clients(
            &self,
            _subscription_id: &str,
            _credentials: &Credentials,
        ) -> Result<AzureClients, ClientError> {
            Err(ClientError::Auth("token request rejected".to_string()))
        }
    }

    #[tokio::test]
    async fn test_init_and_gather() {
        let factory = ReplayClientFactory::new(snapshot());
        let receiver = AzureMonitorReceiver::init(&config(), &factory).await.unwrap();

        assert_eq!(receiver.targets().len(), 2);
        assert_eq!(receiver.subscription_id(), "sub-1");

        let acc = Arc::new(MemoryAccumulator::new());
        let report = receiver.gather(acc.clone()).await;
        assert_eq!(report.collected, 2);
        assert!(report.errors.is_empty());
        assert!(acc
            .metrics()
            .iter()
            .all(|m| m.fields.get("average") == Some(&7.5)));

        // the target list is reused across cycles
        let report = receiver.gather(acc.clone()).await;
        assert_eq!(report.collected, 2);
        assert_eq!(acc.metrics().len(), 4);
    }

    #[tokio::test]
    async fn test_init_rejects_invalid_config_before_any_call() {
        let mut config = config();
        config.subscription_id.clear();

        let err = AzureMonitorReceiver::init(&config, &RejectingFactory)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, SetupError::Config(ConfigError::MissingSubscription)));
    }

    #[tokio::test]
    async fn test_client_creation_failure_marks_clients_unhealthy() {
        let health = HealthRegistry::new();
        let err = AzureMonitorReceiver::init_with_health(
            &config(),
            &RejectingFactory,
            Some(health.clone()),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, SetupError::ClientCreation(ClientError::Auth(_))));
        assert!(err.to_string().starts_with("error creating Azure clients"));
        let status = health.health().await;
        assert_eq!(status.components[components::CLIENTS].status, ComponentStatus::Unhealthy);
        assert!(!status.components.contains_key(components::TARGETS));
    }

    #[tokio::test]
    async fn test_target_failure_marks_targets_unhealthy() {
        let factory = ReplayClientFactory::new(snapshot());
        let mut config = config();
        config.subscription_targets[0].metrics = vec!["Bogus".to_string()];

        let health = HealthRegistry::new();
        let err = AzureMonitorReceiver::init_with_health(&config, &factory, Some(health.clone()))
            .await
            .err()
            .unwrap();

        assert!(matches!(err, SetupError::NoTargets));
        let status = health.health().await;
        assert_eq!(status.components[components::TARGETS].status, ComponentStatus::Unhealthy);
        assert_eq!(status.components[components::CLIENTS].status, ComponentStatus::Healthy);
    }

    #[tokio::test]
    async fn test_gather_updates_collector_health() {
        let factory = ReplayClientFactory::new(snapshot().with_failure(vm("vm-2").id, "boom"));
        let health = HealthRegistry::new();
        let receiver =
            AzureMonitorReceiver::init_with_health(&config(), &factory, Some(health.clone()))
                .await
                .unwrap();

        let report = receiver.gather(Arc::new(MemoryAccumulator::new())).await;
        assert_eq!(report.failed_targets(), 1);
        assert_eq!(
            health.health().await.components[components::COLLECTOR].status,
            ComponentStatus::Degraded
        );
    }
}
