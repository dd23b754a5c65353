//! Expansion of resource-group and subscription targets
//!
//! Every template becomes one resource target per concrete resource of its
//! type found in scope. A type that matches nothing is a configuration
//! mistake and fails resolution.

use crate::client::MetadataClient;
use crate::error::ResolutionError;
use crate::models::{Resource, ResourceGroupTarget, ResourceInfo, ResourceScope, ResourceTarget};
use tracing::debug;

fn in_scope(resource: &ResourceInfo, scope: &ResourceScope, resource_type: &str) -> bool {
    let group_matches = match scope {
        ResourceScope::ResourceGroup(group) => resource.resource_group.eq_ignore_ascii_case(group),
        ResourceScope::Subscription => true,
    };

    group_matches
        && resource.resource_type.eq_ignore_ascii_case(resource_type)
        && !resource.id.trim().is_empty()
}

/// Expand one template within `scope`
async fn expand(
    scope: &ResourceScope,
    template: &Resource,
    metadata: &dyn MetadataClient,
) -> Result<Vec<ResourceTarget>, ResolutionError> {
    let resources = metadata
        .list_resources(scope, &template.resource_type)
        .await
        .map_err(|source| ResolutionError::Listing {
            scope: scope.to_string(),
            resource_type: template.resource_type.clone(),
            source,
        })?;

    let targets: Vec<ResourceTarget> = resources
        .iter()
        .filter(|r| in_scope(r, scope, &template.resource_type))
        .map(|r| template.target_for(r.id.trim()))
        .collect();

    if targets.is_empty() {
        return Err(ResolutionError::NoMatchingResources {
            scope: scope.to_string(),
            resource_type: template.resource_type.clone(),
        });
    }

    debug!(
        scope = %scope,
        resource_type = %template.resource_type,
        count = targets.len(),
        "Expanded resource template"
    );

    Ok(targets)
}

/// One resource target per (group, matching resource) pair
pub async fn resolve_resource_group_targets(
    group_targets: &[ResourceGroupTarget],
    metadata: &dyn MetadataClient,
) -> Result<Vec<ResourceTarget>, ResolutionError> {
    let mut targets = Vec::new();

    for group_target in group_targets {
        let scope = ResourceScope::ResourceGroup(group_target.resource_group.clone());
        for template in &group_target.resources {
            targets.extend(expand(&scope, template, metadata).await?);
        }
    }

    Ok(targets)
}

/// One resource target per matching resource anywhere in the subscription
pub async fn resolve_subscription_targets(
    subscription_targets: &[Resource],
    metadata: &dyn MetadataClient,
) -> Result<Vec<ResourceTarget>, ResolutionError> {
    let mut targets = Vec::new();

    for template in subscription_targets {
        targets.extend(expand(&ResourceScope::Subscription, template, metadata).await?);
    }

    Ok(targets)
}
