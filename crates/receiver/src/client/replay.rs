//! Replay clients backed by a recorded JSON snapshot
//!
//! Lets the receiver run end to end without reaching Azure: resource
//! listings, metric definitions, and metric values all come from one
//! [`Snapshot`]. Resource ids and types are compared case-insensitively.

use super::{AzureClients, ClientFactory, Credentials, MetadataClient, MetricsClient, MetricsQuery};
use crate::client::async_trait;
use crate::error::ClientError;
use crate::models::{MetricDefinition, MetricValue, ResourceInfo, ResourceScope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Recorded state of one subscription
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub resources: Vec<ResourceInfo>,
    /// Resource type -> metric definitions
    #[serde(default)]
    pub definitions: BTreeMap<String, Vec<MetricDefinition>>,
    /// Resource id -> latest values per metric
    #[serde(default)]
    pub values: BTreeMap<String, Vec<MetricValue>>,
    /// Resource id -> error message returned for every query
    #[serde(default)]
    pub failures: BTreeMap<String, String>,
}

impl Snapshot {
    /// Load a snapshot from a JSON file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ClientError::Fixture(format!("reading {}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| ClientError::Fixture(format!("parsing {}: {}", path.display(), e)))
    }

    pub fn with_resource(mut self, resource: ResourceInfo) -> Self {
        self.resources.push(resource);
        self
    }

    pub fn with_definitions(
        mut self,
        resource_type: impl Into<String>,
        definitions: Vec<MetricDefinition>,
    ) -> Self {
        self.definitions.insert(resource_type.into(), definitions);
        self
    }

    pub fn with_values(mut self, resource_id: impl Into<String>, values: Vec<MetricValue>) -> Self {
        self.values.insert(resource_id.into(), values);
        self
    }

    pub fn with_failure(mut self, resource_id: impl Into<String>, message: impl Into<String>) -> Self {
        self.failures.insert(resource_id.into(), message.into());
        self
    }
}

fn lookup<'a, V>(map: &'a BTreeMap<String, V>, key: &str) -> Option<&'a V> {
    map.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// Snapshot-backed implementation of both client traits
#[derive(Debug, Clone)]
pub struct ReplayClients {
    snapshot: Arc<Snapshot>,
}

impl ReplayClients {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
        }
    }

    pub fn into_clients(self) -> AzureClients {
        let shared = Arc::new(self);
        AzureClients::new(shared.clone(), shared)
    }
}

#[async_trait]
impl MetadataClient for ReplayClients {
    async fn list_resources(
        &self,
        scope: &ResourceScope,
        resource_type: &str,
    ) -> Result<Vec<ResourceInfo>, ClientError> {
        Ok(self
            .snapshot
            .resources
            .iter()
            .filter(|r| r.resource_type.eq_ignore_ascii_case(resource_type))
            .filter(|r| match scope {
                ResourceScope::ResourceGroup(group) => r.resource_group.eq_ignore_ascii_case(group),
                ResourceScope::Subscription => true,
            })
            .cloned()
            .collect())
    }

    async fn metric_definitions(
        &self,
        resource_type: &str,
    ) -> Result<Vec<MetricDefinition>, ClientError> {
        lookup(&self.snapshot.definitions, resource_type)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("resource type {}", resource_type)))
    }
}

#[async_trait]
impl MetricsClient for ReplayClients {
    async fn query(&self, query: &MetricsQuery) -> Result<Vec<MetricValue>, ClientError> {
        if let Some(message) = lookup(&self.snapshot.failures, &query.resource_id) {
            return Err(ClientError::Request(message.clone()));
        }

        let Some(values) = lookup(&self.snapshot.values, &query.resource_id) else {
            return Ok(Vec::new());
        };

        Ok(values
            .iter()
            .filter(|v| query.metric_names.iter().any(|m| m.eq_ignore_ascii_case(&v.name)))
            .map(|v| {
                let mut value = v.clone();
                value.values.retain(|agg, _| query.aggregations.contains(agg));
                value
            })
            .collect())
    }
}

/// Factory handing out [`ReplayClients`] for any subscription
pub struct ReplayClientFactory {
    snapshot: Snapshot,
}

impl ReplayClientFactory {
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ClientError> {
        Snapshot::from_path(path).map(Self::new)
    }
}

#[async_trait]
impl ClientFactory for ReplayClientFactory {
    async fn create_clients(
        &self,
        subscription_id: &str,
        credentials: &Credentials,
    ) -> Result<AzureClients, ClientError> {
        if let Credentials::ClientSecret { client_secret, .. } = credentials {
            if client_secret.is_empty() {
                return Err(ClientError::Auth("empty client secret".to_string()));
            }
        }

        tracing::debug!(
            subscription_id = %subscription_id,
            credentials = credentials.kind(),
            resources = self.snapshot.resources.len(),
            "Creating replay clients"
        );

        Ok(ReplayClients::new(self.snapshot.clone()).into_clients())
    }
}
