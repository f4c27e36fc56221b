//! # Ingestion
//!
//! Acquisition adapters.
//!
//! Responsibilities:
//! - Decode device readings into `contracts` types (`ScanFrame`, `GpsFix`, `AccelSample`, `BatteryStatus`)
//! - Retry transient faults a bounded number of times, then report a missing reading
//! - Never propagate adapter errors into the core
//!
//! Bus transports (I2C, serial, NMEA grammar) stay outside; the
//! accelerometer adapter talks to a `RegisterBus` supplied by the integrator.
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::{Icm20948, SimulatedScanSource, SimulatedScanConfig};
//! use contracts::{AccelSource, ScanSource};
//!
//! let mut accel = Icm20948::new(my_i2c_bus);
//! accel.init().await?;
//! let sample = accel.next_sample().await; // None after 3 failed reads
//!
//! let mut scan = SimulatedScanSource::new(SimulatedScanConfig::default());
//! let frame = scan.next_frame().await;
//! ```

mod accel;
mod battery;
mod error;
mod metrics;
mod retry;
mod simulated;

// Re-exports
pub use accel::{decode_accel_z, registers, Icm20948, RegisterBus};
pub use battery::{estimate_runtime_minutes, SimulatedBattery, SysfsBattery, DEFAULT_SYSFS_PATH};
pub use error::{IngestionError, Result};
pub use metrics::{IngestionMetrics, MetricsSnapshot};
pub use retry::{Attempted, RetryPolicy};
pub use simulated::{
    ReplayScanSource, SimulatedAccelSource, SimulatedFixConfig, SimulatedFixSource,
    SimulatedScanConfig, SimulatedScanSource,
};
