//! Metric collection
//!
//! This module runs the per-target metrics queries for a gather cycle and
//! hands the results to an [`Accumulator`]. [`GatherLoop`] repeats the cycle
//! on a fixed interval.

mod accumulator;
mod gather;
mod r#loop;


pub use accumulator::{Accumulator, AccumulatorEvent, ChannelAccumulator, MemoryAccumulator};
pub use gather::{
    measurement_name, resource_tags, Collector, CollectorConfig, GatherReport, MissingMetric,
};
pub use r#loop::{GatherLoop, GatherLoopBuilder, GatherLoopConfig};

use std::sync::Arc;

pub use async_trait::async_trait;

/// Something that can run one gather cycle
#[async_trait]
pub trait Gather: Send + Sync {
    /// Collect every target once, writing results to `acc`
    async fn gather(&self, acc: Arc<dyn Accumulator>) -> GatherReport;
}
