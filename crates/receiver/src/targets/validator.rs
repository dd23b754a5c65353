//! Metric validation against provider-reported definitions

use crate::models::{MetricDefinition, ResourceTarget};

/// Outcome of validating one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validated {
    /// At least one metric is valid; `invalid` lists the names that were removed
    Kept {
        target: ResourceTarget,
        invalid: Vec<String>,
    },
    /// Nothing left to collect
    Dropped {
        resource_id: String,
        invalid: Vec<String>,
    },
}

pub(crate) fn find_definition<'a>(
    definitions: &'a [MetricDefinition],
    metric: &str,
) -> Option<&'a MetricDefinition> {
    definitions
        .iter()
        .find(|d| d.name == metric)
        .or_else(|| definitions.iter().find(|d| d.name.eq_ignore_ascii_case(metric)))
}

/// Intersect the requested metrics with the valid ones.
///
/// Names are rewritten to the provider's spelling and repeated names are
/// collapsed, so validating an already valid target returns it unchanged.
/// An empty metric list selects every metric the provider reports.
pub fn validate(mut target: ResourceTarget, definitions: &[MetricDefinition]) -> Validated {
    let requested = if target.metrics.is_empty() {
        definitions.iter().map(|d| d.name.clone()).collect()
    } else {
        std::mem::take(&mut target.metrics)
    };

    let mut valid: Vec<String> = Vec::with_capacity(requested.len());
    let mut invalid = Vec::new();

    for metric in requested {
        match find_definition(definitions, &metric) {
            Some(definition) => {
                if !valid.contains(&definition.name) {
                    valid.push(definition.name.clone());
                }
            }
            None => invalid.push(metric),
        }
    }

    if valid.is_empty() {
        return Validated::Dropped {
            resource_id: target.resource_id,
            invalid,
        };
    }

    target.metrics = valid;
    Validated::Kept { target, invalid }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Aggregation;
    use crate::time_grain::TimeGrain;

    const VM_ID: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1";

    fn definition(name: &str) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            primary_aggregation: Aggregation::Average,
            supported_aggregations: vec![Aggregation::Average],
            time_grains: vec![TimeGrain::ONE_MINUTE],
        }
    }

    fn vm_definitions() -> Vec<MetricDefinition> {
        vec![
            definition("Percentage CPU"),
            definition("Available Memory Bytes"),
            definition("Disk Read Bytes"),
        ]
    }

    fn target(metrics: &[&str]) -> ResourceTarget {
        ResourceTarget::new(
            VM_ID,
            metrics.iter().map(|m| m.to_string()).collect(),
            vec![],
        )
    }

    #[test]
    fn test_invalid_metric_reported_and_excluded() {
        let result = validate(
            target(&["Percentage CPU", "Bogus Metric", "Disk Read Bytes"]),
            &vm_definitions(),
        );

        let Validated::Kept { target, invalid } = result else {
            panic!("target should be kept");
        };
        assert_eq!(target.metrics, vec!["Percentage CPU", "Disk Read Bytes"]);
        assert_eq!(invalid, vec!["Bogus Metric"]);
    }

    #[test]
    fn test_names_are_canonicalized_and_deduplicated() {
        let result = validate(
            target(&["percentage cpu", "Percentage CPU"]),
            &vm_definitions(),
        );

        let Validated::Kept { target, invalid } = result else {
            panic!("target should be kept");
        };
        assert_eq!(target.metrics, vec!["Percentage CPU"]);
        assert!(invalid.is_empty());
    }

    #[test]
    fn test_validation_is_idempotent() {
        let defs = vm_definitions();
        let Validated::Kept { target: once, .. } =
            validate(target(&["disk read bytes", "Percentage CPU", "Nope"]), &defs)
        else {
            panic!("target should be kept");
        };

        let twice = validate(once.clone(), &defs);
        assert_eq!(
            twice,
            Validated::Kept {
                target: once,
                invalid: vec![]
            }
        );
    }

    #[test]
    fn test_empty_intersection_drops_target() {
        let result = validate(target(&["Nope", "Also Nope"]), &vm_definitions());

        assert_eq!(
            result,
            Validated::Dropped {
                resource_id: VM_ID.to_string(),
                invalid: vec!["Nope".to_string(), "Also Nope".to_string()],
            }
        );
    }

    #[test]
    fn test_empty_metric_list_selects_all_metrics() {
        let Validated::Kept { target, invalid } = validate(target(&[]), &vm_definitions()) else {
            panic!("target should be kept");
        };

        assert_eq!(target.metrics.len(), 3);
        assert!(invalid.is_empty());

        let result = validate(self::target(&[]), &[]);
        assert!(matches!(result, Validated::Dropped { ref invalid, .. } if invalid.is_empty()));
    }
}
