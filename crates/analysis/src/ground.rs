//! Ground-point extraction.
//!
//! The analyzer takes a wide swath of the road ahead; the detector takes a
//! tight beam straight down. Both share the distance window.

use contracts::{AnalyzerConfig, DetectorConfig, GroundWindow, RangeSample, ScanFrame};

/// Wide-band ground points for quality scoring, in frame order.
pub fn analyzer_ground_points(
    frame: &ScanFrame,
    analyzer: &AnalyzerConfig,
    window: &GroundWindow,
) -> Vec<RangeSample> {
    frame
        .samples
        .iter()
        .filter(|s| {
            let angle = s.signed_angle();
            angle >= analyzer.min_angle_deg
                && angle <= analyzer.max_angle_deg
                && window.contains(s.distance_mm)
        })
        .copied()
        .collect()
}

/// Narrow-band ground distances for anomaly detection, in frame order.
pub fn detector_ground_points(
    frame: &ScanFrame,
    detector: &DetectorConfig,
    window: &GroundWindow,
) -> Vec<f64> {
    frame
        .samples
        .iter()
        .filter(|s| detector.in_band(s.angle_deg) && window.contains(s.distance_mm))
        .map(|s| s.distance_mm)
        .collect()
}

/// Distances within `half_width_deg` of straight down, used for calibration.
pub fn straight_down_distances(frame: &ScanFrame, half_width_deg: f64) -> Vec<f64> {
    frame
        .samples
        .iter()
        .filter(|s| s.signed_angle().abs() <= half_width_deg && s.distance_mm.is_finite())
        .map(|s| s.distance_mm)
        .collect()
}
