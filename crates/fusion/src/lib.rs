//! # Fusion
//!
//! 融合核心：共享状态存储 + 各采集/分析活动的调度。
//!
//! 职责：
//! - `StateStore`：按域加锁，写入整体替换，读取返回副本
//! - 每个活动 (scan / fix / accel / analysis / battery) 独立任务、独立节拍
//! - 单次迭代失败只记录日志，不终止活动
//! - 统一停止信号 + 有界超时关闭
//! - 启动标定
//!
//! ## 使用示例
//!
//! ```ignore
//! use fusion::{FusionSources, Orchestrator, StateStore};
//!
//! let store = Arc::new(StateStore::new(session_id, &blueprint.history));
//! let sources = FusionSources::new(scan, fix, accel).with_battery(battery);
//! let mut orchestrator = Orchestrator::new(&blueprint, store, sources).with_output(tx);
//!
//! orchestrator.calibrate().await?;
//! let handle = orchestrator.start()?;
//! // ...
//! handle.shutdown(blueprint.cadence.shutdown_timeout()).await?;
//! ```

mod activity;
mod analyze;
mod battery;
mod calibration;
mod error;
mod ingest;
mod orchestrator;
mod publisher;
mod store;

pub use activity::{Activity, ActivityState, ActivityStatus, LocalActivity};
pub use analyze::AnalysisActivity;
pub use battery::{BatteryTransition, BatteryWatchdog, LowBatteryLatch};
pub use calibration::Calibrator;
pub use error::{FusionError, Result};
pub use ingest::{AccelIngestion, FixIngestion, ScanIngestion};
pub use orchestrator::{FusionSources, NoBattery, Orchestrator, OrchestratorHandle};
pub use publisher::SnapshotPublisher;
pub use store::StateStore;
