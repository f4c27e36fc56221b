//! Motion compensation for ground-aimed range samples.
//!
//! First-order correction only: the vertical acceleration relative to the
//! calibrated gravity reading is treated as constant over one nominal
//! sample interval, giving `0.5 * a * dt^2`. There is no velocity
//! integration and no drift correction, so this is an estimate of the
//! platform's own bounce, not an inertial solution.

use contracts::{AccelSample, CalibrationBaseline, CompensationConfig, ScanFrame};
use tracing::trace;

/// Standard gravity, m/s^2 per g
pub const STANDARD_GRAVITY: f64 = 9.81;

/// Motion compensator
#[derive(Debug, Clone)]
pub struct MotionCompensator {
    config: CompensationConfig,
}

impl MotionCompensator {
    pub fn new(config: CompensationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CompensationConfig {
        &self.config
    }

    /// Vertical displacement in mm over one sample interval.
    ///
    /// `None` when there is nothing to compensate with.
    pub fn displacement_mm(
        &self,
        accel: Option<AccelSample>,
        baseline: Option<&CalibrationBaseline>,
    ) -> Option<f64> {
        let (accel, baseline) = (accel?, baseline?);
        let relative_g = accel.z_g - baseline.accel_baseline_g;
        if !relative_g.is_finite() {
            return None;
        }
        let accel_ms2 = relative_g * STANDARD_GRAVITY;
        let dt = self.config.sample_interval_s;
        Some(0.5 * accel_ms2 * dt * dt * 1000.0)
    }

    /// Whether a normalized angle lies in the near-perpendicular band.
    pub fn in_band(&self, angle_deg: f64) -> bool {
        contracts::signed_angle(angle_deg).abs() <= self.config.band_half_width_deg
    }

    /// Compensate a frame.
    ///
    /// Fails open: with compensation disabled, or without an accel sample
    /// or a baseline, the frame comes back unchanged.
    pub fn compensate(
        &self,
        frame: &ScanFrame,
        accel: Option<AccelSample>,
        baseline: Option<&CalibrationBaseline>,
    ) -> ScanFrame {
        if !self.config.enabled {
            return frame.clone();
        }
        let Some(displacement) = self.displacement_mm(accel, baseline) else {
            trace!("No accel sample or baseline, frame passed through");
            return frame.clone();
        };

        frame
            .samples
            .iter()
            .map(|s| {
                let mut out = *s;
                if self.in_band(s.angle_deg) {
                    out.distance_mm -= displacement;
                }
                out
            })
            .collect()
    }
}

impl Default for MotionCompensator {
    fn default() -> Self {
        Self::new(CompensationConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use contracts::{Orientation, RangeSample};

    fn baseline(g: f64) -> CalibrationBaseline {
        CalibrationBaseline {
            accel_baseline_g: g,
            ground_distance_baseline_mm: 300.0,
            orientation: Orientation::Horizontal,
            captured_at: Utc::now(),
        }
    }

    fn frame() -> ScanFrame {
        [(0.0, 300.0), (8.0, 305.0), (352.0, 295.0), (45.0, 400.0)]
            .iter()
            .map(|&(a, d)| RangeSample::new(a, d))
            .collect()
    }

    #[test]
    fn test_zero_relative_accel_leaves_distances() {
        let c = MotionCompensator::default();
        let b = baseline(1.0);
        let out = c.compensate(&frame(), Some(AccelSample::new(1.0)), Some(&b));
        assert_eq!(out, frame());
    }

    #[test]
    fn test_fail_open_without_baseline_or_accel() {
        let c = MotionCompensator::default();
        let b = baseline(1.0);
        assert_eq!(c.compensate(&frame(), Some(AccelSample::new(1.5)), None), frame());
        assert_eq!(c.compensate(&frame(), None, Some(&b)), frame());
    }

    #[test]
    fn test_displacement_applied_in_band_only() {
        let c = MotionCompensator::default();
        let b = baseline(1.0);
        // 1 g extra: 0.5 * 9.81 * 0.01 * 1000 = 49.05 mm
        let out = c.compensate(&frame(), Some(AccelSample::new(2.0)), Some(&b));
        let expected = 49.05;
        assert!((out.samples[0].distance_mm - (300.0 - expected)).abs() < 1e-9);
        assert!((out.samples[1].distance_mm - (305.0 - expected)).abs() < 1e-9);
        assert!((out.samples[2].distance_mm - (295.0 - expected)).abs() < 1e-9);
        assert_eq!(out.samples[3].distance_mm, 400.0);
    }

    #[test]
    fn test_disabled_compensation() {
        let c = MotionCompensator::new(CompensationConfig {
            enabled: false,
            ..Default::default()
        });
        let b = baseline(1.0);
        assert_eq!(c.compensate(&frame(), Some(AccelSample::new(3.0)), Some(&b)), frame());
    }

    #[test]
    fn test_non_finite_accel_treated_as_missing() {
        let c = MotionCompensator::default();
        let b = baseline(1.0);
        assert_eq!(c.displacement_mm(Some(AccelSample::new(f64::NAN)), Some(&b)), None);
    }
}
