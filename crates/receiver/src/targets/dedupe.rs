//! Removal of duplicate (resource, metric, aggregation) requests
//!
//! The same resource can be reached through an explicit resource target, a
//! resource group, and the subscription at once. Collecting it twice would
//! double both the API usage and the emitted measurements.

use crate::models::{Aggregation, ResourceTarget};
use std::collections::HashMap;
use tracing::debug;

/// Merge targets so each (resource, metric, aggregation) tuple appears once.
///
/// The first target that claims a tuple keeps it. Metrics of one resource
/// that end up with the same aggregation set share one target, in
/// first-seen order.
pub fn dedupe(targets: Vec<ResourceTarget>) -> Vec<ResourceTarget> {
    let mut claimed: HashMap<(String, String), Vec<Aggregation>> = HashMap::new();
    let mut slots: HashMap<(String, Vec<Aggregation>), usize> = HashMap::new();
    let mut merged: Vec<ResourceTarget> = Vec::new();

    for target in targets {
        let resource_key = target.resource_id.to_ascii_lowercase();

        for metric in &target.metrics {
            let taken = claimed
                .entry((resource_key.clone(), metric.to_ascii_lowercase()))
                .or_default();

            let mut fresh: Vec<Aggregation> = target
                .aggregations
                .iter()
                .filter(|a| !taken.contains(a))
                .copied()
                .collect();
            fresh.sort();
            fresh.dedup();

            if fresh.is_empty() {
                debug!(
                    resource_id = %target.resource_id,
                    metric = %metric,
                    "Skipping metric already requested by another target"
                );
                continue;
            }
            taken.extend(fresh.iter().copied());

            let slot = *slots
                .entry((resource_key.clone(), fresh.clone()))
                .or_insert_with(|| {
                    merged.push(ResourceTarget {
                        resource_id: target.resource_id.clone(),
                        metrics: Vec::new(),
                        aggregations: fresh,
                        time_grain: target.time_grain,
                    });
                    merged.len() - 1
                });
            merged[slot].metrics.push(metric.clone());
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const VM_ID: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1";

    fn target(id: &str, metrics: &[&str], aggregations: &[Aggregation]) -> ResourceTarget {
        ResourceTarget::new(
            id,
            metrics.iter().map(|m| m.to_string()).collect(),
            aggregations.to_vec(),
        )
    }

    fn tuples(targets: &[ResourceTarget]) -> Vec<(String, String, Aggregation)> {
        targets
            .iter()
            .flat_map(|t| {
                t.metrics.iter().flat_map(move |m| {
                    t.aggregations
                        .iter()
                        .map(move |a| (t.resource_id.to_ascii_lowercase(), m.clone(), *a))
                })
            })
            .collect()
    }

    #[test]
    fn test_identical_targets_collapse() {
        let merged = dedupe(vec![
            target(VM_ID, &["Percentage CPU"], &[Aggregation::Average]),
            target(&VM_ID.to_uppercase(), &["Percentage CPU"], &[Aggregation::Average]),
        ]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].resource_id, VM_ID);
    }

    #[test]
    fn test_partial_overlap_keeps_only_new_aggregations() {
        let merged = dedupe(vec![
            target(VM_ID, &["Percentage CPU", "Disk Read Bytes"], &[Aggregation::Average]),
            target(
                VM_ID,
                &["Percentage CPU"],
                &[Aggregation::Maximum, Aggregation::Average],
            ),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].metrics, vec!["Percentage CPU", "Disk Read Bytes"]);
        assert_eq!(merged[1].metrics, vec!["Percentage CPU"]);
        assert_eq!(merged[1].aggregations, vec![Aggregation::Maximum]);
    }

    #[test]
    fn test_no_tuple_appears_twice() {
        let merged = dedupe(vec![
            target(VM_ID, &["A", "B"], &[Aggregation::Total, Aggregation::Count]),
            target(VM_ID, &["B", "C"], &[Aggregation::Count, Aggregation::Total]),
            target(VM_ID, &["A"], &[Aggregation::Minimum]),
            target(VM_ID, &["C", "A"], &[Aggregation::Total]),
        ]);

        let all = tuples(&merged);
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), unique.len());
        // A: total,count,min; B: total,count; C: count,total
        assert_eq!(unique.len(), 7);
    }

    #[test]
    fn test_distinct_resources_untouched() {
        let other = VM_ID.replace("vm-1", "vm-2");
        let input = vec![
            target(VM_ID, &["Percentage CPU"], &[Aggregation::Average]),
            target(&other, &["Percentage CPU"], &[Aggregation::Average]),
        ];

        assert_eq!(dedupe(input.clone()), input);
    }
}
