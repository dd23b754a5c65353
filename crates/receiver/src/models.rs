//! Core data models for the receiver

use crate::time_grain::TimeGrain;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Maximum number of metrics Azure Monitor accepts in one metrics query
pub const MAX_METRICS_PER_REQUEST: usize = 20;

/// Statistical reduction applied to raw samples within a time grain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Average,
    Count,
    Maximum,
    Minimum,
    Total,
}

impl Aggregation {
    pub const ALL: [Aggregation; 5] = [
        Aggregation::Average,
        Aggregation::Count,
        Aggregation::Maximum,
        Aggregation::Minimum,
        Aggregation::Total,
    ];

    /// Field key used in collected records
    pub fn field_name(&self) -> &'static str {
        match self {
            Aggregation::Average => "average",
            Aggregation::Count => "count",
            Aggregation::Maximum => "maximum",
            Aggregation::Minimum => "minimum",
            Aggregation::Total => "total",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Error returned when an aggregation name is not one of the known kinds
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown aggregation '{0}', expected one of average, count, maximum, minimum, total")]
pub struct UnknownAggregation(pub String);

impl FromStr for Aggregation {
    type Err = UnknownAggregation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aggregation::ALL
            .into_iter()
            .find(|a| a.field_name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownAggregation(s.to_string()))
    }
}

/// A unit of metric collection scoped to one concrete resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceTarget {
    pub resource_id: String,
    pub metrics: Vec<String>,
    /// Target-wide aggregation set; empty until the assigner fills defaults
    pub aggregations: Vec<Aggregation>,
    /// Collection interval, set by the time-grain splitter
    pub time_grain: Option<TimeGrain>,
}

impl ResourceTarget {
    pub fn new(
        resource_id: impl Into<String>,
        metrics: Vec<String>,
        aggregations: Vec<Aggregation>,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            metrics,
            aggregations,
            time_grain: None,
        }
    }

    /// Copy of this target carrying a different metric list
    pub fn with_metrics(&self, metrics: Vec<String>) -> Self {
        Self {
            metrics,
            ..self.clone()
        }
    }
}

/// Resource template expanded against every matching concrete resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub resource_type: String,
    pub metrics: Vec<String>,
    pub aggregations: Vec<Aggregation>,
}

impl Resource {
    pub fn new(
        resource_type: impl Into<String>,
        metrics: Vec<String>,
        aggregations: Vec<Aggregation>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            metrics,
            aggregations,
        }
    }

    /// Instantiate the template for one concrete resource
    pub fn target_for(&self, resource_id: impl Into<String>) -> ResourceTarget {
        ResourceTarget::new(resource_id, self.metrics.clone(), self.aggregations.clone())
    }
}

/// Resource templates scoped to one resource group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupTarget {
    pub resource_group: String,
    pub resources: Vec<Resource>,
}

impl ResourceGroupTarget {
    pub fn new(resource_group: impl Into<String>, resources: Vec<Resource>) -> Self {
        Self {
            resource_group: resource_group.into(),
            resources,
        }
    }
}

/// All targets of one configured run
///
/// Built from configuration, then consumed by the target pipeline which
/// produces the final, flat list of resource targets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Targets {
    pub resource_targets: Vec<ResourceTarget>,
    pub resource_group_targets: Vec<ResourceGroupTarget>,
    pub subscription_targets: Vec<Resource>,
}

impl Targets {
    pub fn new(
        resource_targets: Vec<ResourceTarget>,
        resource_group_targets: Vec<ResourceGroupTarget>,
        subscription_targets: Vec<Resource>,
    ) -> Self {
        Self {
            resource_targets,
            resource_group_targets,
            subscription_targets,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.resource_targets.is_empty()
            && self.resource_group_targets.is_empty()
            && self.subscription_targets.is_empty()
    }
}

/// Where a resource listing looks
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceScope {
    ResourceGroup(String),
    Subscription,
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceScope::ResourceGroup(group) => write!(f, "resource group {}", group),
            ResourceScope::Subscription => f.write_str("subscription"),
        }
    }
}

/// Concrete resource returned by resource listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceInfo {
    pub id: String,
    pub name: String,
    pub resource_type: String,
    pub resource_group: String,
    #[serde(default)]
    pub location: Option<String>,
}

/// Provider-declared properties of one metric of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    pub name: String,
    pub primary_aggregation: Aggregation,
    #[serde(default)]
    pub supported_aggregations: Vec<Aggregation>,
    /// Supported time grains; the smallest one is used for collection
    pub time_grains: Vec<TimeGrain>,
}

impl MetricDefinition {
    pub fn min_time_grain(&self) -> Option<TimeGrain> {
        self.time_grains.iter().min().copied()
    }

    /// The primary aggregation is always supported, even when the provider
    /// leaves the supported list empty
    pub fn supports(&self, aggregation: Aggregation) -> bool {
        aggregation == self.primary_aggregation
            || self.supported_aggregations.contains(&aggregation)
    }
}

/// Aggregated values returned by the metrics API for one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub name: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub values: BTreeMap<Aggregation, f64>,
}

/// One measurement produced by a successful metrics query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectedMetric {
    pub name: String,
    pub fields: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_parse_is_case_insensitive() {
        assert_eq!("Average".parse::<Aggregation>(), Ok(Aggregation::Average));
        assert_eq!("TOTAL".parse::<Aggregation>(), Ok(Aggregation::Total));
        assert_eq!(" count ".parse::<Aggregation>(), Ok(Aggregation::Count));
        assert!("median".parse::<Aggregation>().is_err());
    }

    #[test]
    fn test_min_time_grain() {
        let def = MetricDefinition {
            name: "Percentage CPU".to_string(),
            primary_aggregation: Aggregation::Average,
            supported_aggregations: vec![],
            time_grains: vec![
                "PT1H".parse().unwrap(),
                "PT1M".parse().unwrap(),
                "PT5M".parse().unwrap(),
            ],
        };

        assert_eq!(def.min_time_grain(), Some("PT1M".parse().unwrap()));
    }

    #[test]
    fn test_template_expands_to_target() {
        let template = Resource::new(
            "Microsoft.Compute/virtualMachines",
            vec!["Percentage CPU".to_string()],
            vec![Aggregation::Maximum],
        );

        let target = template.target_for("/subscriptions/s/resourceGroups/g/providers/Microsoft.Compute/virtualMachines/vm1");
        assert_eq!(target.metrics, vec!["Percentage CPU"]);
        assert_eq!(target.aggregations, vec![Aggregation::Maximum]);
        assert!(target.time_grain.is_none());
    }
}
