//! Error types for setup, client, and gather-phase failures

use std::time::Duration;

/// Errors reported by the external client collaborators.
///
/// # Examples
///
/// ```rust
/// use azmon_receiver::error::ClientError;
///
/// let err = ClientError::Throttled { retry_after: None };
/// assert!(err.to_string().contains("throttled"));
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Credentials were rejected or could not be obtained.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The API call failed at the transport or HTTP level.
    #[error("request failed: {0}")]
    Request(String),

    /// The requested resource, group, or resource type does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The provider throttled the call.
    #[error("request throttled by the monitoring API")]
    Throttled { retry_after: Option<Duration> },

    /// A replay snapshot could not be read or parsed.
    #[error("replay snapshot error: {0}")]
    Fixture(String),
}

/// Invalid receiver configuration, detected before any API call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("subscription_id is required")]
    MissingSubscription,

    #[error("client_id and tenant_id are required when client_secret is set")]
    IncompleteClientSecret,

    #[error("no targets configured: set resource_target, resource_group_target or subscription_target")]
    NoTargets,

    #[error("resource_target #{index}: {reason}")]
    ResourceTarget { index: usize, reason: String },

    #[error("resource_group_target #{index}: {reason}")]
    ResourceGroupTarget { index: usize, reason: String },

    #[error("subscription_target #{index}: {reason}")]
    SubscriptionTarget { index: usize, reason: String },

    #[error("request_timeout_secs must be greater than zero")]
    ZeroTimeout,
}

/// Failure expanding resource-group or subscription targets.
#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    #[error("listing resources of type {resource_type} in {scope}: {source}")]
    Listing {
        scope: String,
        resource_type: String,
        #[source]
        source: ClientError,
    },

    #[error("no resources of type {resource_type} found in {scope}")]
    NoMatchingResources { scope: String, resource_type: String },
}

/// Failure validating a target's metrics against provider metadata.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{resource_id}: {source}")]
    InvalidResourceId {
        resource_id: String,
        #[source]
        source: crate::resource_id::ResourceIdError,
    },

    #[error("fetching metric definitions for {resource_type}: {source}")]
    Definitions {
        resource_type: String,
        #[source]
        source: ClientError,
    },

    #[error("{resource_id}: none of the requested metrics are valid ({})", .invalid.join(", "))]
    NoValidMetrics {
        resource_id: String,
        invalid: Vec<String>,
    },

    #[error("{resource_id}: resource type {resource_type} reports no metrics")]
    NoMetricsAvailable {
        resource_id: String,
        resource_type: String,
    },

    #[error("{resource_id}: metric {metric} declares no time grains")]
    MissingTimeGrain { resource_id: String, metric: String },
}

/// Fatal errors during receiver initialization; no gather cycle runs.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("error creating Azure clients: {0}")]
    ClientCreation(#[source] ClientError),

    #[error("error creating resource targets from {stage}: {source}")]
    Resolution {
        stage: &'static str,
        #[source]
        source: ResolutionError,
    },

    #[error("error checking resource targets metrics validation: {0}")]
    Validation(#[source] ValidationError),

    #[error("error splitting resource targets metrics by min time grain: {0}")]
    TimeGrainSplit(#[source] ValidationError),

    #[error("no resource targets left to collect after validation")]
    NoTargets,
}

/// A single target's metrics query failed during a gather cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CallError {
    #[error("collecting metrics for {resource_id}: {source}")]
    Client {
        resource_id: String,
        #[source]
        source: ClientError,
    },

    #[error("collecting metrics for {resource_id}: timed out after {after:?}")]
    Timeout { resource_id: String, after: Duration },

    #[error("collecting metrics for {resource_id}: task failed: {message}")]
    TaskFailed { resource_id: String, message: String },
}

impl CallError {
    pub fn resource_id(&self) -> &str {
        match self {
            CallError::Client { resource_id, .. }
            | CallError::Timeout { resource_id, .. }
            | CallError::TaskFailed { resource_id, .. } => resource_id,
        }
    }
}

/// Convenience alias for setup-phase results.
pub type Result<T> = std::result::Result<T, SetupError>;
