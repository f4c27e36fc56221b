//! Calibration reductions.
//!
//! Turns the stationary samples gathered at startup into a
//! `CalibrationBaseline`. Sampling itself (timing, sources) is the
//! caller's job.

use chrono::{DateTime, Utc};
use contracts::{AccelSample, CalibrationBaseline, CalibrationConfig, Orientation, ScanFrame};

use crate::ground::straight_down_distances;
use crate::stats::{mean, median};

/// Mean gravity reading and the orientation it implies.
///
/// With no usable samples, falls back to `default_g` and `Unknown`.
pub fn accel_baseline(samples: &[AccelSample], default_g: f64) -> (f64, Orientation) {
    let readings: Vec<f64> = samples
        .iter()
        .map(|s| s.z_g)
        .filter(|z| z.is_finite())
        .collect();
    match mean(&readings) {
        Some(g) => (g, Orientation::from_gravity(g)),
        None => (default_g, Orientation::Unknown),
    }
}

/// Median straight-down distance of one scan, if it had any.
pub fn scan_ground_median(frame: &ScanFrame, half_width_deg: f64) -> Option<f64> {
    median(&straight_down_distances(frame, half_width_deg))
}

/// Median of per-scan medians, or `default_mm` when no scan contributed.
pub fn ground_baseline(scan_medians: &[f64], default_mm: f64) -> f64 {
    median(scan_medians).unwrap_or(default_mm)
}

/// Build the baseline from everything gathered during calibration.
pub fn reduce(
    accel_samples: &[AccelSample],
    scans: &[ScanFrame],
    config: &CalibrationConfig,
    captured_at: DateTime<Utc>,
) -> CalibrationBaseline {
    let (accel_baseline_g, orientation) =
        accel_baseline(accel_samples, config.default_accel_baseline_g);
    let medians: Vec<f64> = scans
        .iter()
        .filter_map(|scan| scan_ground_median(scan, config.ground_band_half_width_deg))
        .collect();
    CalibrationBaseline {
        accel_baseline_g,
        ground_distance_baseline_mm: ground_baseline(&medians, config.default_ground_distance_mm),
        orientation,
        captured_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RangeSample;

    #[test]
    fn test_accel_baseline_mean_and_orientation() {
        let samples = [AccelSample::new(0.98), AccelSample::new(1.02)];
        let (g, o) = accel_baseline(&samples, 1.0);
        assert!((g - 1.0).abs() < 1e-9);
        assert_eq!(o, Orientation::Horizontal);
    }

    #[test]
    fn test_accel_baseline_without_samples() {
        let (g, o) = accel_baseline(&[], 1.0);
        assert_eq!(g, 1.0);
        assert_eq!(o, Orientation::Unknown);
    }

    #[test]
    fn test_ground_baseline_median_of_medians() {
        let scans = vec![
            ScanFrame::new(vec![
                RangeSample::new(0.0, 300.0),
                RangeSample::new(2.0, 310.0),
                RangeSample::new(358.0, 305.0),
                RangeSample::new(40.0, 900.0),
            ]),
            ScanFrame::new(vec![RangeSample::new(1.0, 320.0)]),
            ScanFrame::new(vec![RangeSample::new(1.0, 290.0)]),
            ScanFrame::empty(),
        ];
        let baseline = reduce(&[], &scans, &CalibrationConfig::default(), Utc::now());
        // medians 305, 320, 290 -> 305
        assert_eq!(baseline.ground_distance_baseline_mm, 305.0);
        assert_eq!(baseline.orientation, Orientation::Unknown);
    }

    #[test]
    fn test_ground_baseline_default() {
        let baseline = reduce(&[], &[ScanFrame::empty()], &CalibrationConfig::default(), Utc::now());
        assert_eq!(baseline.ground_distance_baseline_mm, 300.0);
        assert_eq!(baseline.accel_baseline_g, 1.0);
    }
}
