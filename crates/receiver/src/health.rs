//! Component health for the receiver process
//!
//! Tracks whether clients were created, targets were built and the last
//! gather cycle succeeded, and answers liveness and readiness probes.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Health status of a component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is functioning normally
    Healthy,
    /// Component is experiencing issues but still operational
    Degraded,
    /// Component has failed
    Unhealthy,
}

/// Information about a component's health
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

impl ComponentHealth {
    pub fn healthy() -> Self {
        Self {
            status: ComponentStatus::Healthy,
            message: None,
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn degraded(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Degraded,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: ComponentStatus::Unhealthy,
            message: Some(message.into()),
            last_check_timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// Overall health response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub components: HashMap<String, ComponentHealth>,
}

impl HealthResponse {
    /// Compute overall status from component statuses
    pub fn compute_status(components: &HashMap<String, ComponentHealth>) -> ComponentStatus {
        let mut has_degraded = false;

        for health in components.values() {
            match health.status {
                ComponentStatus::Unhealthy => return ComponentStatus::Unhealthy,
                ComponentStatus::Degraded => has_degraded = true,
                ComponentStatus::Healthy => {}
            }
        }

        if has_degraded {
            ComponentStatus::Degraded
        } else {
            ComponentStatus::Healthy
        }
    }
}

/// Readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Component names for health tracking
pub mod components {
    /// Azure client creation
    pub const CLIENTS: &str = "clients";
    /// Target resolution, validation and splitting
    pub const TARGETS: &str = "targets";
    /// Gather cycles
    pub const COLLECTOR: &str = "collector";
}

/// Health registry for tracking component health
#[derive(Debug, Clone)]
pub struct HealthRegistry {
    components: Arc<RwLock<HashMap<String, ComponentHealth>>>,
    ready: Arc<RwLock<bool>>,
}

impl Default for HealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthRegistry {
    pub fn new() -> Self {
        Self {
            components: Arc::new(RwLock::new(HashMap::new())),
            ready: Arc::new(RwLock::new(false)),
        }
    }

    /// Register a component with initial healthy status
    pub async fn register(&self, name: &str) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), ComponentHealth::healthy());
    }

    /// Record the outcome of a gather cycle against the collector component.
    ///
    /// Partial failures degrade the collector; a cycle in which every
    /// target failed marks it unhealthy.
    pub async fn record_gather(&self, targets: usize, failed: usize) {
        if failed == 0 {
            self.set_healthy(components::COLLECTOR).await;
        } else if failed >= targets {
            self.set_unhealthy(
                components::COLLECTOR,
                format!("all {} targets failed in the last gather cycle", targets),
            )
            .await;
        } else {
            self.set_degraded(
                components::COLLECTOR,
                format!("{} of {} targets failed in the last gather cycle", failed, targets),
            )
            .await;
        }
    }

    async fn update(&self, name: &str, health: ComponentHealth) {
        let mut components = self.components.write().await;
        components.insert(name.to_string(), health);
    }

    /// Mark component as healthy
    pub async fn set_healthy(&self, name: &str) {
        self.update(name, ComponentHealth::healthy()).await;
    }

    /// Mark component as degraded
    pub async fn set_degraded(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::degraded(message)).await;
    }

    /// Mark component as unhealthy
    pub async fn set_unhealthy(&self, name: &str, message: impl Into<String>) {
        self.update(name, ComponentHealth::unhealthy(message)).await;
    }

    /// Set readiness status
    pub async fn set_ready(&self, ready: bool) {
        let mut r = self.ready.write().await;
        *r = ready;
    }

    /// Get health response
    pub async fn health(&self) -> HealthResponse {
        let components = self.components.read().await.clone();
        let status = HealthResponse::compute_status(&components);
        HealthResponse { status, components }
    }

    /// Get readiness response
    pub async fn readiness(&self) -> ReadinessResponse {
        let ready = *self.ready.read().await;
        let health = self.health().await;

        let mut unhealthy: Vec<&str> = health
            .components
            .iter()
            .filter(|(_, h)| h.status == ComponentStatus::Unhealthy)
            .map(|(name, _)| name.as_str())
            .collect();
        unhealthy.sort_unstable();

        if !ready {
            ReadinessResponse {
                ready: false,
                reason: Some("Receiver not yet initialized".to_string()),
            }
        } else if !unhealthy.is_empty() {
            ReadinessResponse {
                ready: false,
                reason: Some(format!("Unhealthy components: {}", unhealthy.join(", "))),
            }
        } else {
            ReadinessResponse {
                ready: true,
                reason: None,
            }
        }
    }
}
