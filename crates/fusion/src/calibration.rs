//! Startup calibration.
//!
//! Samples the stationary vehicle for a bounded window and reduces the
//! readings to a `CalibrationBaseline`. Runs before the activities start,
//! so it has the sources to itself.

use std::time::Duration;

use chrono::Utc;
use contracts::{AccelSource, CalibrationBaseline, CalibrationConfig, ScanSource};
use tracing::{debug, info, instrument};

use crate::error::{FusionError, Result};

/// Headroom on top of the nominal sampling window
const CALIBRATION_SLACK: Duration = Duration::from_secs(2);

/// Stationary calibration procedure
#[derive(Debug, Clone)]
pub struct Calibrator {
    config: CalibrationConfig,
}

impl Calibrator {
    pub fn new(config: CalibrationConfig) -> Self {
        Self { config }
    }

    /// Nominal time spent sampling, before slack
    pub fn sampling_window(&self) -> Duration {
        let accel = Duration::from_millis(self.config.accel_interval_ms)
            .saturating_mul(u32::try_from(self.config.accel_samples).unwrap_or(u32::MAX));
        let scan = Duration::from_millis(self.config.scan_interval_ms)
            .saturating_mul(u32::try_from(self.config.scan_samples).unwrap_or(u32::MAX));
        accel.saturating_add(scan)
    }

    /// Run the procedure.
    ///
    /// Missing readings fall back to the configured defaults; only a source
    /// that keeps the procedure past its time bound is an error.
    #[instrument(
        name = "calibrate",
        skip(self, scan, accel),
        fields(scan = scan.name(), accel = accel.name())
    )]
    pub async fn calibrate<S, A>(&self, scan: &mut S, accel: &mut A) -> Result<CalibrationBaseline>
    where
        S: ScanSource,
        A: AccelSource,
    {
        let bound = self.sampling_window().saturating_add(CALIBRATION_SLACK);
        info!(
            accel_samples = self.config.accel_samples,
            scan_samples = self.config.scan_samples,
            bound_ms = bound.as_millis() as u64,
            "Calibrating, keep the vehicle stationary"
        );

        let (accel_samples, scans) = tokio::time::timeout(bound, async {
            let accel_samples = self.sample_accel(accel).await;
            let scans = self.sample_scans(scan).await;
            (accel_samples, scans)
        })
        .await
        .map_err(|_| {
            FusionError::calibration(format!(
                "sampling did not finish within {} ms",
                bound.as_millis()
            ))
        })?;

        let baseline = analysis::calibration::reduce(&accel_samples, &scans, &self.config, Utc::now());
        info!(
            accel_baseline_g = baseline.accel_baseline_g,
            ground_distance_mm = baseline.ground_distance_baseline_mm,
            orientation = %baseline.orientation,
            accel_used = accel_samples.len(),
            "Calibration complete"
        );
        Ok(baseline)
    }

    async fn sample_accel<A: AccelSource>(&self, accel: &mut A) -> Vec<contracts::AccelSample> {
        let interval = Duration::from_millis(self.config.accel_interval_ms);
        let mut samples = Vec::with_capacity(self.config.accel_samples);
        for i in 0..self.config.accel_samples {
            match accel.next_sample().await {
                Some(sample) => samples.push(sample),
                None => debug!(index = i, "Calibration accel sample missing"),
            }
            tokio::time::sleep(interval).await;
        }
        samples
    }

    async fn sample_scans<S: ScanSource>(&self, scan: &mut S) -> Vec<contracts::ScanFrame> {
        let interval = Duration::from_millis(self.config.scan_interval_ms);
        let mut scans = Vec::with_capacity(self.config.scan_samples);
        for i in 0..self.config.scan_samples {
            let frame = scan.next_frame().await;
            if frame.is_empty() {
                debug!(index = i, "Calibration scan empty");
            } else {
                scans.push(frame);
            }
            tokio::time::sleep(interval).await;
        }
        scans
    }
}

impl Default for Calibrator {
    fn default() -> Self {
        Self::new(CalibrationConfig::default())
    }
}
