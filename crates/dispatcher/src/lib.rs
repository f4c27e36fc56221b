//! # Dispatcher
//!
//! 快照分发模块。
//!
//! 负责：
//! - 消费 `FusionSnapshot`
//! - Fan-out 到多个 sinks (日志 / 告警)
//! - 隔离慢 sink，不阻塞融合核心

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, FusionSnapshot};
pub use dispatcher::{create_dispatcher, DispatchCounts, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::{SinkHandle, SnapshotRoute};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{AlertCounts, AlertSink, LogSink};
