//! Receiver configuration
//!
//! Mirrors the collector plugin surface: credentials plus three kinds of
//! targets. [`ReceiverConfig::validate`] rejects everything that can be
//! caught without calling Azure.

use crate::client::Credentials;
use crate::error::ConfigError;
use crate::models::{Aggregation, Resource, ResourceGroupTarget, ResourceTarget, Targets};
use crate::resource_id::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Explicit resource to collect from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTargetConfig {
    pub resource_id: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<String>,
}

/// Resource template, used inside a group or subscription-wide
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub resource_type: String,
    #[serde(default)]
    pub metrics: Vec<String>,
    #[serde(default)]
    pub aggregations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceGroupTargetConfig {
    pub resource_group: String,
    #[serde(default, rename = "resource")]
    pub resources: Vec<ResourceConfig>,
}

/// Receiver configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ReceiverConfig {
    #[serde(default)]
    pub subscription_id: String,

    /// Service principal or user-assigned identity client id
    #[serde(default)]
    pub client_id: Option<String>,

    /// When set, the client-secret credential is used instead of managed identity
    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub tenant_id: Option<String>,

    #[serde(default, rename = "resource_target")]
    pub resource_targets: Vec<ResourceTargetConfig>,

    #[serde(default, rename = "resource_group_target")]
    pub resource_group_targets: Vec<ResourceGroupTargetConfig>,

    #[serde(default, rename = "subscription_target")]
    pub subscription_targets: Vec<ResourceConfig>,

    /// Fail setup instead of dropping a target whose metrics are all invalid
    #[serde(default)]
    pub strict_metrics: bool,

    /// Per-call timeout for metric queries
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Upper bound on in-flight metric queries; unbounded when unset
    #[serde(default)]
    pub max_concurrent_requests: Option<usize>,
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            subscription_id: String::new(),
            client_id: None,
            client_secret: None,
            tenant_id: None,
            resource_targets: Vec::new(),
            resource_group_targets: Vec::new(),
            subscription_targets: Vec::new(),
            strict_metrics: false,
            request_timeout_secs: default_request_timeout(),
            max_concurrent_requests: None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_aggregations(names: &[String]) -> Result<Vec<Aggregation>, String> {
    let mut aggregations = Vec::with_capacity(names.len());
    for name in names {
        let aggregation: Aggregation = name.parse().map_err(|e| format!("{}", e))?;
        if !aggregations.contains(&aggregation) {
            aggregations.push(aggregation);
        }
    }
    Ok(aggregations)
}

fn check_metrics(metrics: &[String]) -> Result<(), String> {
    if metrics.iter().any(|m| m.trim().is_empty()) {
        return Err("metric names must not be empty".to_string());
    }
    Ok(())
}

fn resource_template(config: &ResourceConfig) -> Result<Resource, String> {
    if config.resource_type.trim().is_empty() {
        return Err("resource_type is required".to_string());
    }
    if !config.resource_type.contains('/') {
        return Err(format!(
            "resource_type '{}' must include the provider namespace, e.g. Microsoft.Compute/virtualMachines",
            config.resource_type
        ));
    }
    check_metrics(&config.metrics)?;

    Ok(Resource::new(
        config.resource_type.trim(),
        config.metrics.clone(),
        parse_aggregations(&config.aggregations)?,
    ))
}

impl ReceiverConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Select the credential variant
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        match non_empty(&self.client_secret) {
            Some(secret) => {
                let (Some(client_id), Some(tenant_id)) =
                    (non_empty(&self.client_id), non_empty(&self.tenant_id))
                else {
                    return Err(ConfigError::IncompleteClientSecret);
                };
                Ok(Credentials::ClientSecret {
                    tenant_id: tenant_id.to_string(),
                    client_id: client_id.to_string(),
                    client_secret: secret.to_string(),
                })
            }
            None => Ok(Credentials::ManagedIdentity {
                client_id: non_empty(&self.client_id).map(str::to_string),
            }),
        }
    }

    /// Normalize configured targets into the target model
    pub fn targets(&self) -> Result<Targets, ConfigError> {
        let mut resource_targets = Vec::with_capacity(self.resource_targets.len());
        for (index, target) in self.resource_targets.iter().enumerate() {
            let invalid = |reason: String| ConfigError::ResourceTarget { index, reason };

            let resource_id = target.resource_id.trim();
            if resource_id.is_empty() {
                return Err(invalid("resource_id is required".to_string()));
            }
            resource_id
                .parse::<ResourceId>()
                .map_err(|e| invalid(e.to_string()))?;
            check_metrics(&target.metrics).map_err(invalid)?;
            let aggregations = parse_aggregations(&target.aggregations).map_err(invalid)?;

            resource_targets.push(ResourceTarget::new(
                resource_id,
                target.metrics.clone(),
                aggregations,
            ));
        }

        let mut resource_group_targets = Vec::with_capacity(self.resource_group_targets.len());
        for (index, target) in self.resource_group_targets.iter().enumerate() {
            let invalid = |reason: String| ConfigError::ResourceGroupTarget { index, reason };

            if target.resource_group.trim().is_empty() {
                return Err(invalid("resource_group is required".to_string()));
            }
            if target.resources.is_empty() {
                return Err(invalid("at least one resource is required".to_string()));
            }

            let resources = target
                .resources
                .iter()
                .map(resource_template)
                .collect::<Result<Vec<_>, _>>()
                .map_err(invalid)?;
            resource_group_targets.push(ResourceGroupTarget::new(
                target.resource_group.trim(),
                resources,
            ));
        }

        let mut subscription_targets = Vec::with_capacity(self.subscription_targets.len());
        for (index, target) in self.subscription_targets.iter().enumerate() {
            let template = resource_template(target)
                .map_err(|reason| ConfigError::SubscriptionTarget { index, reason })?;
            subscription_targets.push(template);
        }

        let targets = Targets::new(resource_targets, resource_group_targets, subscription_targets);
        if targets.is_empty() {
            return Err(ConfigError::NoTargets);
        }
        Ok(targets)
    }

    /// Check the whole configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.subscription_id.trim().is_empty() {
            return Err(ConfigError::MissingSubscription);
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        self.credentials()?;
        self.targets()?;
        Ok(())
    }
}

impl fmt::Debug for ReceiverConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReceiverConfig")
            .field("subscription_id", &self.subscription_id)
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &self.client_secret.as_ref().map(|_| "<redacted>"),
            )
            .field("tenant_id", &self.tenant_id)
            .field("resource_targets", &self.resource_targets)
            .field("resource_group_targets", &self.resource_group_targets)
            .field("subscription_targets", &self.subscription_targets)
            .field("strict_metrics", &self.strict_metrics)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("max_concurrent_requests", &self.max_concurrent_requests)
            .finish()
    }
}
