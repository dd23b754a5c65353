//! Client seams towards Azure Resource Manager and Azure Monitor
//!
//! The receiver never talks HTTP itself. It depends on two small traits,
//! [`MetadataClient`] for resource listing and metric definitions and
//! [`MetricsClient`] for metric queries, handed out by a [`ClientFactory`]
//! once credentials are known.

mod cache;
mod replay;

pub use cache::DefinitionCache;
pub use replay::{ReplayClientFactory, ReplayClients, Snapshot};

use crate::error::ClientError;
use crate::models::{Aggregation, MetricDefinition, MetricValue, ResourceInfo, ResourceScope};
use crate::time_grain::TimeGrain;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

pub use async_trait::async_trait;

/// Read-only resource and metric metadata
#[async_trait]
pub trait MetadataClient: Send + Sync {
    /// List concrete resources of `resource_type` within `scope`
    async fn list_resources(
        &self,
        scope: &ResourceScope,
        resource_type: &str,
    ) -> Result<Vec<ResourceInfo>, ClientError>;

    /// Metric definitions the provider reports for a resource type
    async fn metric_definitions(
        &self,
        resource_type: &str,
    ) -> Result<Vec<MetricDefinition>, ClientError>;
}

/// One metrics query against a single resource
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsQuery {
    pub resource_id: String,
    pub metric_names: Vec<String>,
    pub aggregations: Vec<Aggregation>,
    pub time_grain: TimeGrain,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl MetricsQuery {
    /// Query covering the last two grains up to `end`.
    ///
    /// Grains too large to represent start the window at the earliest
    /// representable instant.
    pub fn latest(
        resource_id: impl Into<String>,
        metric_names: Vec<String>,
        aggregations: Vec<Aggregation>,
        time_grain: TimeGrain,
        end: DateTime<Utc>,
    ) -> Self {
        let start = time_grain
            .as_secs()
            .checked_mul(2)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(chrono::Duration::try_seconds)
            .and_then(|window| end.checked_sub_signed(window))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);

        Self {
            resource_id: resource_id.into(),
            metric_names,
            aggregations,
            time_grain,
            start,
            end,
        }
    }
}

/// Metric query API
#[async_trait]
pub trait MetricsClient: Send + Sync {
    /// Return aggregated values for the requested metrics. Metrics without
    /// data in the window are simply absent from the result.
    async fn query(&self, query: &MetricsQuery) -> Result<Vec<MetricValue>, ClientError>;
}

/// Authenticated client handles for one subscription
#[derive(Clone)]
pub struct AzureClients {
    pub metadata: Arc<dyn MetadataClient>,
    pub metrics: Arc<dyn MetricsClient>,
}

impl AzureClients {
    pub fn new(metadata: Arc<dyn MetadataClient>, metrics: Arc<dyn MetricsClient>) -> Self {
        Self { metadata, metrics }
    }
}

impl fmt::Debug for AzureClients {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AzureClients").finish_non_exhaustive()
    }
}

/// How the receiver authenticates; chosen once from configuration
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service principal with an explicit client secret
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
    /// Ambient managed identity; `client_id` selects a user-assigned identity
    ManagedIdentity { client_id: Option<String> },
}

impl Credentials {
    pub fn kind(&self) -> &'static str {
        match self {
            Credentials::ClientSecret { .. } => "client_secret",
            Credentials::ManagedIdentity { .. } => "managed_identity",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .field("client_secret", &"<redacted>")
                .finish(),
            Credentials::ManagedIdentity { client_id } => f
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
        }
    }
}

/// Creates authenticated clients for a subscription
#[async_trait]
pub trait ClientFactory: Send + Sync {
    async fn create_clients(
        &self,
        subscription_id: &str,
        credentials: &Credentials,
    ) -> Result<AzureClients, ClientError>;
}
