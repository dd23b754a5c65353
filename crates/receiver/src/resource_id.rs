//! Azure Resource Manager identifiers
//!
//! `/subscriptions/{sub}/resourceGroups/{group}/providers/{namespace}/{type}/{name}`
//! with optional nested `/{child type}/{child name}` pairs. Segment keys are
//! matched case-insensitively, as ARM does.

use std::fmt;
use std::str::FromStr;

/// Parsed form of an ARM resource id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    raw: String,
    subscription_id: String,
    resource_group: String,
    resource_type: String,
    resource_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid resource id '{id}': {reason}")]
pub struct ResourceIdError {
    id: String,
    reason: &'static str,
}

impl ResourceId {
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn resource_group(&self) -> &str {
        &self.resource_group
    }

    /// Full type including provider namespace, e.g. `Microsoft.Compute/virtualMachines`
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Name of the innermost resource
    pub fn resource_name(&self) -> &str {
        &self.resource_name
    }
}

impl FromStr for ResourceId {
    type Err = ResourceIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| ResourceIdError {
            id: s.to_string(),
            reason,
        };

        let segments: Vec<&str> = s.trim_matches('/').split('/').collect();
        if segments.iter().any(|segment| segment.is_empty()) {
            return Err(err("empty path segment"));
        }

        match segments.as_slice() {
            [subscriptions, subscription_id, resource_groups, resource_group, providers, namespace, rest @ ..]
                if subscriptions.eq_ignore_ascii_case("subscriptions")
                    && resource_groups.eq_ignore_ascii_case("resourceGroups")
                    && providers.eq_ignore_ascii_case("providers") =>
            {
                if rest.is_empty() || rest.len() % 2 != 0 {
                    return Err(err("expected type/name pairs after the provider namespace"));
                }

                let type_path: Vec<&str> = rest.iter().step_by(2).copied().collect();
                let resource_type = format!("{}/{}", namespace, type_path.join("/"));
                let resource_name = rest[rest.len() - 1].to_string();

                Ok(ResourceId {
                    raw: s.to_string(),
                    subscription_id: subscription_id.to_string(),
                    resource_group: resource_group.to_string(),
                    resource_type,
                    resource_name,
                })
            }
            _ => Err(err(
                "expected /subscriptions/{id}/resourceGroups/{group}/providers/{namespace}/...",
            )),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_top_level_resource() {
        let id: ResourceId = "/subscriptions/sub-1/resourceGroups/rg-app/providers/Microsoft.Compute/virtualMachines/vm-01"
            .parse()
            .unwrap();

        assert_eq!(id.subscription_id(), "sub-1");
        assert_eq!(id.resource_group(), "rg-app");
        assert_eq!(id.resource_type(), "Microsoft.Compute/virtualMachines");
        assert_eq!(id.resource_name(), "vm-01");
    }

    #[test]
    fn test_parse_nested_resource() {
        let id: ResourceId = "/subscriptions/sub-1/resourcegroups/rg-data/providers/Microsoft.Sql/servers/sql-1/databases/orders"
            .parse()
            .unwrap();

        assert_eq!(id.resource_group(), "rg-data");
        assert_eq!(id.resource_type(), "Microsoft.Sql/servers/databases");
        assert_eq!(id.resource_name(), "orders");
    }

    #[test]
    fn test_parse_rejects_malformed_ids() {
        for input in [
            "",
            "vm-01",
            "/subscriptions/sub-1/resourceGroups/rg",
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Compute",
            "/subscriptions/sub-1/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines",
            "/subscriptions//resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm",
            "/tenants/t/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm",
        ] {
            assert!(input.parse::<ResourceId>().is_err(), "{} should not parse", input);
        }
    }
}
