//! Acquisition source traits
//!
//! The core only consumes already-decoded readings. Bus access, serial
//! framing and sentence parsing live behind these traits, in adapters.
//!
//! Adapters never return errors to the core: a transient fault becomes an
//! empty frame or `None` for that tick, and the adapter logs it.

use crate::{AccelSample, BatteryStatus, GpsFix, ScanFrame};

/// Ranging scanner
#[trait_variant::make(ScanSource: Send)]
pub trait LocalScanSource {
    /// Source name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Next scan, possibly empty. Must not block indefinitely.
    async fn next_frame(&mut self) -> ScanFrame;
}

/// Satellite positioning
#[trait_variant::make(FixSource: Send)]
pub trait LocalFixSource {
    fn name(&self) -> &str;

    /// `None` when no valid fix was decoded since the previous call.
    async fn next_fix(&mut self) -> Option<GpsFix>;
}

/// Single-axis accelerometer
#[trait_variant::make(AccelSource: Send)]
pub trait LocalAccelSource {
    fn name(&self) -> &str;

    /// `None` after the adapter's own retries are exhausted.
    async fn next_sample(&mut self) -> Option<AccelSample>;
}

/// Battery / power supply
#[trait_variant::make(BatterySource: Send)]
pub trait LocalBatterySource {
    fn name(&self) -> &str;

    /// Current status; adapters fall back to the last known reading.
    async fn status(&mut self) -> BatteryStatus;
}
