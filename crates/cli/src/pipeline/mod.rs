//! Survey pipeline module.

mod orchestrator;
mod stats;

pub use orchestrator::{BatterySelection, Pipeline, PipelineConfig};
pub use stats::PipelineStats;
