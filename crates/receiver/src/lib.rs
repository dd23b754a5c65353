//! Azure Monitor metrics receiver
//!
//! This crate provides:
//! - Configuration and credential selection
//! - Target resolution, metric validation and request splitting
//! - Concurrent metric collection into an accumulator
//! - Health checks, self-metrics and the HTTP endpoints serving them

pub mod api;
pub mod client;
pub mod collector;
pub mod config;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod receiver;
pub mod resource_id;
pub mod targets;
pub mod time_grain;

pub use client::{ClientFactory, Credentials, MetadataClient, MetricsClient};
pub use collector::{Accumulator, GatherReport};
pub use config::ReceiverConfig;
pub use error::{CallError, ClientError, ConfigError, SetupError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ReceiverMetrics, StructuredLogger};
pub use receiver::AzureMonitorReceiver;
pub use time_grain::TimeGrain;
