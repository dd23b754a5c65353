//! Per-run cache of metric definitions keyed by resource type

use super::MetadataClient;
use crate::error::ClientError;
use crate::models::MetricDefinition;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Metric definitions shared by every resource of the same type
///
/// Resource types are case-insensitive in ARM, so keys are lowercased.
pub struct DefinitionCache {
    metadata: Arc<dyn MetadataClient>,
    entries: DashMap<String, Arc<[MetricDefinition]>>,
}

impl DefinitionCache {
    pub fn new(metadata: Arc<dyn MetadataClient>) -> Self {
        Self {
            metadata,
            entries: DashMap::new(),
        }
    }

    /// Definitions for `resource_type`, fetched at most once per type
    pub async fn definitions(
        &self,
        resource_type: &str,
    ) -> Result<Arc<[MetricDefinition]>, ClientError> {
        let key = resource_type.to_ascii_lowercase();
        if let Some(entry) = self.entries.get(&key) {
            return Ok(Arc::clone(entry.value()));
        }

        let definitions: Arc<[MetricDefinition]> =
            Arc::from(self.metadata.metric_definitions(resource_type).await?);
        debug!(
            resource_type = %resource_type,
            count = definitions.len(),
            "Fetched metric definitions"
        );

        self.entries.insert(key, Arc::clone(&definitions));
        Ok(definitions)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::async_trait;
    use crate::models::{Aggregation, ResourceInfo, ResourceScope};
    use crate::time_grain::TimeGrain;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingMetadata {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl MetadataClient for CountingMetadata {
        async fn list_resources(
            &self,
            _scope: &ResourceScope,
            _resource_type: &str,
        ) -> Result<Vec<ResourceInfo>, ClientError> {
            Ok(vec![])
        }

        async fn metric_definitions(
            &self,
            _resource_type: &str,
        ) -> Result<Vec<MetricDefinition>, ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![MetricDefinition {
                name: "Percentage CPU".to_string(),
                primary_aggregation: Aggregation::Average,
                supported_aggregations: vec![Aggregation::Average],
                time_grains: vec![TimeGrain::ONE_MINUTE],
            }])
        }
    }

    #[tokio::test]
    async fn test_definitions_fetched_once_per_type() {
        let metadata = Arc::new(CountingMetadata {
            calls: AtomicUsize::new(0),
        });
        let cache = DefinitionCache::new(metadata.clone());

        cache.definitions("Microsoft.Compute/virtualMachines").await.unwrap();
        cache.definitions("microsoft.compute/virtualmachines").await.unwrap();
        let defs = cache.definitions("Microsoft.Compute/virtualMachines").await.unwrap();

        assert_eq!(defs.len(), 1);
        assert_eq!(metadata.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }
}
