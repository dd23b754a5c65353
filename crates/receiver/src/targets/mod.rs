//! Target pipeline
//!
//! Turns the configured [`Targets`] into the flat list of jobs the collector
//! runs: resolve groups and subscriptions, validate metrics, assign default
//! aggregations, drop duplicates, then split by time grain and by the
//! per-call metric limit.

mod aggregations;
mod dedupe;
mod resolver;
mod split;
mod validator;


pub use aggregations::assign;
pub use dedupe::dedupe;
pub use resolver::{resolve_resource_group_targets, resolve_subscription_targets};
pub use split::{split_by_limit, split_by_max_metrics, split_by_time_grain};
pub use validator::{validate, Validated};

use crate::client::{DefinitionCache, MetadataClient};
use crate::error::{SetupError, ValidationError};
use crate::models::{MetricDefinition, ResourceTarget, Targets, MAX_METRICS_PER_REQUEST};
use crate::resource_id::ResourceId;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builds the final job list from configured targets
pub struct TargetPipeline {
    metadata: Arc<dyn MetadataClient>,
    definitions: DefinitionCache,
    strict_metrics: bool,
    max_metrics_per_request: usize,
}

impl TargetPipeline {
    pub fn new(metadata: Arc<dyn MetadataClient>) -> Self {
        Self {
            definitions: DefinitionCache::new(Arc::clone(&metadata)),
            metadata,
            strict_metrics: false,
            max_metrics_per_request: MAX_METRICS_PER_REQUEST,
        }
    }

    /// Fail instead of dropping targets left without valid metrics
    pub fn strict_metrics(mut self, strict: bool) -> Self {
        self.strict_metrics = strict;
        self
    }

    /// Override the per-call metric limit
    pub fn max_metrics_per_request(mut self, limit: usize) -> Self {
        self.max_metrics_per_request = limit.max(1);
        self
    }

    /// Run every stage and return the final, collection-ready targets
    pub async fn build(&self, targets: Targets) -> Result<Vec<ResourceTarget>, SetupError> {
        let resolved = self.resolve(targets).await?;
        debug!(count = resolved.len(), "Resolved resource targets");

        let mut checked = Vec::with_capacity(resolved.len());
        for target in resolved {
            if let Some(target) = self.check_metrics(target).await? {
                let definitions = self
                    .definitions_for(&target.resource_id)
                    .await
                    .map_err(SetupError::Validation)?;
                let resource_id = target.resource_id.clone();
                let assigned = assign(target, &definitions);
                if assigned.is_empty() {
                    warn!(
                        resource_id = %resource_id,
                        "Dropping resource target without supported aggregations"
                    );
                }
                checked.extend(assigned);
            }
        }

        let unique = dedupe(checked);

        let mut final_targets = Vec::with_capacity(unique.len());
        for target in &unique {
            let definitions = self
                .definitions_for(&target.resource_id)
                .await
                .map_err(SetupError::TimeGrainSplit)?;
            for by_grain in
                split_by_time_grain(target, &definitions).map_err(SetupError::TimeGrainSplit)?
            {
                final_targets.extend(split_by_limit(&by_grain, self.max_metrics_per_request));
            }
        }

        if final_targets.is_empty() {
            return Err(SetupError::NoTargets);
        }

        info!(
            targets = final_targets.len(),
            definition_types = self.definitions.len(),
            "Total resource targets"
        );
        Ok(final_targets)
    }

    /// Explicit targets first, then resource groups, then subscription-wide
    async fn resolve(&self, targets: Targets) -> Result<Vec<ResourceTarget>, SetupError> {
        let mut resolved = targets.resource_targets;

        resolved.extend(
            resolve_resource_group_targets(&targets.resource_group_targets, self.metadata.as_ref())
                .await
                .map_err(|source| SetupError::Resolution {
                    stage: "resource group targets",
                    source,
                })?,
        );

        resolved.extend(
            resolve_subscription_targets(&targets.subscription_targets, self.metadata.as_ref())
                .await
                .map_err(|source| SetupError::Resolution {
                    stage: "subscription targets",
                    source,
                })?,
        );

        Ok(resolved)
    }

    async fn definitions_for(
        &self,
        resource_id: &str,
    ) -> Result<Arc<[MetricDefinition]>, ValidationError> {
        let parsed: ResourceId =
            resource_id
                .parse()
                .map_err(|source| ValidationError::InvalidResourceId {
                    resource_id: resource_id.to_string(),
                    source,
                })?;

        self.definitions
            .definitions(parsed.resource_type())
            .await
            .map_err(|source| ValidationError::Definitions {
                resource_type: parsed.resource_type().to_string(),
                source,
            })
    }

    /// Validate one target; `None` means it was dropped
    async fn check_metrics(
        &self,
        target: ResourceTarget,
    ) -> Result<Option<ResourceTarget>, SetupError> {
        let definitions = self
            .definitions_for(&target.resource_id)
            .await
            .map_err(SetupError::Validation)?;

        match validate(target, &definitions) {
            Validated::Kept { target, invalid } => {
                if !invalid.is_empty() {
                    warn!(
                        resource_id = %target.resource_id,
                        invalid = ?invalid,
                        "Ignoring metrics not available for this resource type"
                    );
                }
                Ok(Some(target))
            }
            Validated::Dropped {
                resource_id,
                invalid,
            } => {
                let error = if invalid.is_empty() {
                    ValidationError::NoMetricsAvailable {
                        resource_type: resource_type_of(&resource_id),
                        resource_id,
                    }
                } else {
                    ValidationError::NoValidMetrics {
                        resource_id,
                        invalid,
                    }
                };

                if self.strict_metrics {
                    return Err(SetupError::Validation(error));
                }
                warn!(error = %error, "Dropping resource target without valid metrics");
                Ok(None)
            }
        }
    }
}

fn resource_type_of(resource_id: &str) -> String {
    resource_id
        .parse::<ResourceId>()
        .map(|id| id.resource_type().to_string())
        .unwrap_or_default()
}
