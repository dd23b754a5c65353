//! Per-metric aggregation assignment

use super::validator::find_definition;
use crate::models::{Aggregation, MetricDefinition, ResourceTarget};
use tracing::warn;

/// Work out the aggregations of every metric in `target`.
///
/// A metric without explicit aggregations gets its primary aggregation.
/// Explicit aggregations the metric does not support are removed, and a
/// metric left with none is removed too. A target carries one aggregation
/// list, so metrics are grouped by their resulting set: one target per
/// distinct set, in first-seen order, metric order preserved.
pub fn assign(target: ResourceTarget, definitions: &[MetricDefinition]) -> Vec<ResourceTarget> {
    let mut groups: Vec<ResourceTarget> = Vec::new();

    for metric in &target.metrics {
        let definition = find_definition(definitions, metric);
        let aggregations = match definition {
            Some(definition) if target.aggregations.is_empty() => {
                vec![definition.primary_aggregation]
            }
            Some(definition) => supported(&target, metric, definition),
            // Azure's own default when nothing is known about the metric
            None if target.aggregations.is_empty() => vec![Aggregation::Average],
            None => target.aggregations.clone(),
        };

        if aggregations.is_empty() {
            warn!(
                resource_id = %target.resource_id,
                metric = %metric,
                requested = ?target.aggregations,
                "Ignoring metric without a supported aggregation"
            );
            continue;
        }

        match groups.iter_mut().find(|g| g.aggregations == aggregations) {
            Some(group) => group.metrics.push(metric.clone()),
            None => groups.push(ResourceTarget {
                resource_id: target.resource_id.clone(),
                metrics: vec![metric.clone()],
                aggregations,
                time_grain: target.time_grain,
            }),
        }
    }

    groups
}

/// Explicit aggregations of `target` that `definition` supports, sorted
fn supported(
    target: &ResourceTarget,
    metric: &str,
    definition: &MetricDefinition,
) -> Vec<Aggregation> {
    let (mut kept, dropped): (Vec<Aggregation>, Vec<Aggregation>) = target
        .aggregations
        .iter()
        .copied()
        .partition(|a| definition.supports(*a));

    if !dropped.is_empty() {
        warn!(
            resource_id = %target.resource_id,
            metric = %metric,
            unsupported = ?dropped,
            "Ignoring aggregations not supported by this metric"
        );
    }

    kept.sort();
    kept.dedup();
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time_grain::TimeGrain;

    const APP_ID: &str = "/subscriptions/s/resourceGroups/g/providers/Microsoft.Web/sites/app";

    fn definition(name: &str, primary: Aggregation, supported: &[Aggregation]) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            primary_aggregation: primary,
            supported_aggregations: supported.to_vec(),
            time_grains: vec![TimeGrain::ONE_MINUTE],
        }
    }

    fn target(metrics: &[&str], aggregations: &[Aggregation]) -> ResourceTarget {
        ResourceTarget::new(
            APP_ID,
            metrics.iter().map(|m| m.to_string()).collect(),
            aggregations.to_vec(),
        )
    }

    #[test]
    fn test_each_metric_gets_its_own_primary_aggregation() {
        let defs = vec![
            definition("Requests", Aggregation::Total, &[Aggregation::Total]),
            definition("Response Time", Aggregation::Average, &[Aggregation::Average]),
            definition("Http5xx", Aggregation::Total, &[Aggregation::Total]),
        ];

        let assigned = assign(target(&["Requests", "Response Time", "Http5xx"], &[]), &defs);

        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].metrics, vec!["Requests", "Http5xx"]);
        assert_eq!(assigned[0].aggregations, vec![Aggregation::Total]);
        assert_eq!(assigned[1].metrics, vec!["Response Time"]);
        assert_eq!(assigned[1].aggregations, vec![Aggregation::Average]);
    }

    #[test]
    fn test_explicit_aggregations_kept_when_supported() {
        let defs = vec![definition(
            "Requests",
            Aggregation::Total,
            &[Aggregation::Total, Aggregation::Count, Aggregation::Maximum],
        )];
        let input = target(&["Requests"], &[Aggregation::Maximum, Aggregation::Count]);

        let assigned = assign(input, &defs);
        assert_eq!(assigned.len(), 1);
        assert_eq!(
            assigned[0].aggregations,
            vec![Aggregation::Count, Aggregation::Maximum]
        );
    }

    #[test]
    fn test_unsupported_explicit_aggregations_are_removed() {
        let defs = vec![
            definition("Requests", Aggregation::Total, &[Aggregation::Total, Aggregation::Count]),
            definition("Response Time", Aggregation::Average, &[Aggregation::Average]),
        ];
        let input = target(
            &["Requests", "Response Time"],
            &[Aggregation::Total, Aggregation::Average],
        );

        let assigned = assign(input, &defs);

        assert_eq!(assigned.len(), 2);
        assert_eq!(assigned[0].metrics, vec!["Requests"]);
        assert_eq!(assigned[0].aggregations, vec![Aggregation::Total]);
        assert_eq!(assigned[1].metrics, vec!["Response Time"]);
        assert_eq!(assigned[1].aggregations, vec![Aggregation::Average]);
    }

    #[test]
    fn test_metric_without_supported_aggregation_is_removed() {
        let defs = vec![
            definition("Requests", Aggregation::Total, &[Aggregation::Total]),
            definition("Response Time", Aggregation::Average, &[Aggregation::Average]),
        ];

        let assigned = assign(target(&["Requests", "Response Time"], &[Aggregation::Total]), &defs);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].metrics, vec!["Requests"]);

        let assigned = assign(target(&["Response Time"], &[Aggregation::Count]), &defs);
        assert!(assigned.is_empty());
    }

    #[test]
    fn test_empty_supported_list_allows_primary_only() {
        let defs = vec![definition("Requests", Aggregation::Total, &[])];

        let assigned = assign(target(&["Requests"], &[Aggregation::Total, Aggregation::Count]), &defs);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].aggregations, vec![Aggregation::Total]);
    }
}
