//! Target splitting by time grain and by per-call metric limit

use super::validator::find_definition;
use crate::error::ValidationError;
use crate::models::{MetricDefinition, ResourceTarget, MAX_METRICS_PER_REQUEST};
use crate::time_grain::TimeGrain;
use std::collections::BTreeMap;

/// Split a target so that every output shares one minimum time grain.
///
/// A query carries a single interval, so mixing a 1-minute metric with a
/// 5-minute one would coarsen the former. Outputs are ordered by ascending
/// grain; metrics keep their relative order.
pub fn split_by_time_grain(
    target: &ResourceTarget,
    definitions: &[MetricDefinition],
) -> Result<Vec<ResourceTarget>, ValidationError> {
    let mut groups: BTreeMap<TimeGrain, Vec<String>> = BTreeMap::new();

    for metric in &target.metrics {
        let grain = find_definition(definitions, metric)
            .and_then(MetricDefinition::min_time_grain)
            .ok_or_else(|| ValidationError::MissingTimeGrain {
                resource_id: target.resource_id.clone(),
                metric: metric.clone(),
            })?;
        groups.entry(grain).or_default().push(metric.clone());
    }

    Ok(groups
        .into_iter()
        .map(|(grain, metrics)| {
            let mut split = target.with_metrics(metrics);
            split.time_grain = Some(grain);
            split
        })
        .collect())
}

/// Split a target into chunks of at most [`MAX_METRICS_PER_REQUEST`] metrics
pub fn split_by_max_metrics(target: &ResourceTarget) -> Vec<ResourceTarget> {
    split_by_limit(target, MAX_METRICS_PER_REQUEST)
}

/// Split a target into consecutive chunks of at most `limit` metrics
pub fn split_by_limit(target: &ResourceTarget, limit: usize) -> Vec<ResourceTarget> {
    let limit = limit.max(1);
    if target.metrics.len() <= limit {
        return if target.metrics.is_empty() {
            Vec::new()
        } else {
            vec![target.clone()]
        };
    }

    target
        .metrics
        .chunks(limit)
        .map(|chunk| target.with_metrics(chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Aggregation;

    const VM_ID: &str =
        "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Compute/virtualMachines/vm-1";

    fn definition(name: &str, grains: &[TimeGrain]) -> MetricDefinition {
        MetricDefinition {
            name: name.to_string(),
            primary_aggregation: Aggregation::Average,
            supported_aggregations: vec![Aggregation::Average],
            time_grains: grains.to_vec(),
        }
    }

    fn target_with(count: usize) -> ResourceTarget {
        ResourceTarget::new(
            VM_ID,
            (0..count).map(|i| format!("metric-{}", i)).collect(),
            vec![Aggregation::Total],
        )
    }

    #[test]
    fn test_time_grain_split_groups_by_min_grain() {
        let defs = vec![
            definition("CPU", &[TimeGrain::ONE_HOUR, TimeGrain::ONE_MINUTE]),
            definition("Disk", &[TimeGrain::FIVE_MINUTES, TimeGrain::ONE_HOUR]),
            definition("Mem", &[TimeGrain::ONE_MINUTE]),
        ];
        let target = ResourceTarget::new(
            VM_ID,
            vec!["CPU".to_string(), "Disk".to_string(), "Mem".to_string()],
            vec![Aggregation::Average],
        );

        let split = split_by_time_grain(&target, &defs).unwrap();

        assert_eq!(split.len(), 2);
        assert_eq!(split[0].metrics, vec!["CPU", "Mem"]);
        assert_eq!(split[0].time_grain, Some(TimeGrain::ONE_MINUTE));
        assert_eq!(split[1].metrics, vec!["Disk"]);
        assert_eq!(split[1].time_grain, Some(TimeGrain::FIVE_MINUTES));

        // union of outputs equals the input exactly
        let mut union: Vec<String> = split.iter().flat_map(|t| t.metrics.clone()).collect();
        let mut input = target.metrics.clone();
        union.sort();
        input.sort();
        assert_eq!(union, input);
        assert!(split.iter().all(|t| t.aggregations == target.aggregations));
    }

    #[test]
    fn test_single_grain_passes_through() {
        let defs = vec![
            definition("CPU", &[TimeGrain::ONE_MINUTE]),
            definition("Mem", &[TimeGrain::ONE_MINUTE, TimeGrain::ONE_DAY]),
        ];
        let target = ResourceTarget::new(
            VM_ID,
            vec!["Mem".to_string(), "CPU".to_string()],
            vec![Aggregation::Average],
        );

        let split = split_by_time_grain(&target, &defs).unwrap();
        assert_eq!(split.len(), 1);
        assert_eq!(split[0].metrics, target.metrics);
        assert_eq!(split[0].time_grain, Some(TimeGrain::ONE_MINUTE));
    }

    #[test]
    fn test_time_grain_split_requires_grains() {
        let defs = vec![definition("CPU", &[])];
        let target = ResourceTarget::new(VM_ID, vec!["CPU".to_string()], vec![]);

        let err = split_by_time_grain(&target, &defs).unwrap_err();
        assert!(matches!(err, ValidationError::MissingTimeGrain { ref metric, .. } if metric == "CPU"));
    }

    #[test]
    fn test_batch_split_counts_and_order() {
        for (count, limit) in [(1, 20), (20, 20), (21, 20), (45, 20), (5, 2), (7, 3)] {
            let target = target_with(count);
            let split = split_by_limit(&target, limit);

            assert_eq!(split.len(), count.div_ceil(limit), "{} metrics, limit {}", count, limit);
            assert!(split.iter().all(|t| t.metrics.len() <= limit));
            assert!(split.iter().all(|t| t.resource_id == target.resource_id
                && t.aggregations == target.aggregations
                && t.time_grain == target.time_grain));

            let rebuilt: Vec<String> = split.into_iter().flat_map(|t| t.metrics).collect();
            assert_eq!(rebuilt, target.metrics);
        }
    }

    #[test]
    fn test_batch_split_uses_provider_limit() {
        let split = split_by_max_metrics(&target_with(41));
        let sizes: Vec<usize> = split.iter().map(|t| t.metrics.len()).collect();
        assert_eq!(sizes, vec![20, 20, 1]);
    }

    #[test]
    fn test_batch_split_is_deterministic() {
        let target = target_with(33);
        assert_eq!(split_by_max_metrics(&target), split_by_max_metrics(&target));
    }
}
