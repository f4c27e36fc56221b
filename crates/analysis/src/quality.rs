//! Road Quality Analyzer
//!
//! Reduces a compensated scan into a roughness index and a quality class.
//!
//! ```text
//! roughness = population_variance(ground) / mean(ground) * 100
//! ```
//!
//! The class is the first band of the threshold ladder the roughness falls
//! below; anything at or above `poor` is `VeryPoor`.

use contracts::{
    AnalyzerConfig, GroundWindow, QualityThresholds, RoadQuality, RoadQualityMetrics, ScanFrame,
};
use tracing::{debug, error};

use crate::error::AnalysisError;
use crate::ground::analyzer_ground_points;
use crate::stats::mean_and_variance;

const STAGE: &str = "road_quality";

/// Road quality analyzer
#[derive(Debug, Clone)]
pub struct RoadQualityAnalyzer {
    config: AnalyzerConfig,
    window: GroundWindow,
}

impl RoadQualityAnalyzer {
    pub fn new(config: AnalyzerConfig, window: GroundWindow) -> Self {
        Self { config, window }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyze one frame.
    ///
    /// Never fails: too few ground points yields `Unknown`, an arithmetic
    /// fault yields `Error` with score 0 and is logged here.
    pub fn analyze(&self, frame: &ScanFrame) -> RoadQualityMetrics {
        match self.try_analyze(frame) {
            Ok(metrics) => {
                debug!(
                    quality = %metrics.quality,
                    score = metrics.quality_score,
                    roughness = metrics.roughness_index,
                    ground_points = metrics.ground_points,
                    "Road quality computed"
                );
                metrics
            }
            Err(e) => {
                let ground_points =
                    analyzer_ground_points(frame, &self.config, &self.window).len();
                error!(
                    error = %e,
                    frame_len = frame.len(),
                    ground_points,
                    "Road quality analysis fault"
                );
                RoadQualityMetrics::error(ground_points)
            }
        }
    }

    /// Analyze one frame, surfacing faults to the caller.
    pub fn try_analyze(&self, frame: &ScanFrame) -> Result<RoadQualityMetrics, AnalysisError> {
        let mut ground = analyzer_ground_points(frame, &self.config, &self.window);
        if ground.len() < self.config.min_valid_samples {
            return Ok(RoadQualityMetrics::unknown(ground.len()));
        }

        let distances: Vec<f64> = ground.iter().map(|s| s.distance_mm).collect();
        let (mean, variance) = mean_and_variance(STAGE, &distances)?;
        if mean <= 0.0 {
            return Err(AnalysisError::DegenerateMean { stage: STAGE, mean });
        }
        let roughness =
            AnalysisError::ensure_finite(STAGE, "roughness", variance / mean * 100.0)?;

        let quality = classify(roughness, &self.config.thresholds);

        ground.sort_by(|a, b| a.signed_angle().total_cmp(&b.signed_angle()));
        let profile_mm = ground.iter().map(|s| -(s.distance_mm - mean)).collect();

        Ok(RoadQualityMetrics {
            quality,
            quality_score: quality.score(),
            roughness_index: roughness,
            variance,
            mean_distance_mm: mean,
            ground_points: ground.len(),
            profile_mm,
        })
    }
}

impl Default for RoadQualityAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default(), GroundWindow::default())
    }
}

/// Map a roughness index onto the threshold ladder; first band wins.
pub fn classify(roughness_index: f64, thresholds: &QualityThresholds) -> RoadQuality {
    if roughness_index < thresholds.excellent {
        RoadQuality::Excellent
    } else if roughness_index < thresholds.good {
        RoadQuality::Good
    } else if roughness_index < thresholds.fair {
        RoadQuality::Fair
    } else if roughness_index < thresholds.poor {
        RoadQuality::Poor
    } else {
        RoadQuality::VeryPoor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::RangeSample;

    fn frame_from_distances(distances: &[f64]) -> ScanFrame {
        distances
            .iter()
            .enumerate()
            .map(|(i, &d)| RangeSample::new(i as f64, d))
            .collect()
    }

    fn analyzer_with_min(min_valid_samples: usize) -> RoadQualityAnalyzer {
        RoadQualityAnalyzer::new(
            AnalyzerConfig {
                min_valid_samples,
                ..Default::default()
            },
            GroundWindow::default(),
        )
    }

    #[test]
    fn test_reference_frame_is_very_poor() {
        let analyzer = analyzer_with_min(5);
        let m = analyzer.analyze(&frame_from_distances(&[100.0, 110.0, 105.0, 95.0, 100.0]));
        assert!((m.mean_distance_mm - 102.0).abs() < 1e-9);
        assert!((m.variance - 26.0).abs() < 1e-9);
        assert!((m.roughness_index - 25.490196).abs() < 1e-5);
        assert_eq!(m.quality, RoadQuality::VeryPoor);
        assert_eq!(m.quality_score, 10);
    }

    #[test]
    fn test_too_few_points_is_unknown() {
        let analyzer = RoadQualityAnalyzer::default();
        let m = analyzer.analyze(&frame_from_distances(&[100.0, 900.0, 55.0]));
        assert_eq!(m.quality, RoadQuality::Unknown);
        assert_eq!(m.quality_score, 50);
        assert_eq!(m.roughness_index, 0.0);
        assert_eq!(m.ground_points, 3);
    }

    #[test]
    fn test_flat_road_is_excellent() {
        let analyzer = RoadQualityAnalyzer::default();
        let m = analyzer.analyze(&frame_from_distances(&[300.0; 20]));
        assert_eq!(m.quality, RoadQuality::Excellent);
        assert_eq!(m.quality_score, 90);
        assert!(m.profile_mm.iter().all(|h| h.abs() < 1e-9));
    }

    #[test]
    fn test_out_of_band_points_ignored() {
        let analyzer = RoadQualityAnalyzer::default();
        let mut samples: Vec<RangeSample> =
            (0..12).map(|i| RangeSample::new(i as f64, 300.0)).collect();
        samples.push(RangeSample::new(90.0, 5.0));
        samples.push(RangeSample::new(200.0, 3000.0));
        let m = analyzer.analyze(&ScanFrame::new(samples));
        assert_eq!(m.ground_points, 12);
        assert_eq!(m.quality, RoadQuality::Excellent);
    }

    #[test]
    fn test_classify_boundaries() {
        let t = QualityThresholds::default();
        assert_eq!(classify(0.0, &t), RoadQuality::Excellent);
        assert_eq!(classify(0.999, &t), RoadQuality::Excellent);
        assert_eq!(classify(1.0, &t), RoadQuality::Good);
        assert_eq!(classify(3.0, &t), RoadQuality::Fair);
        assert_eq!(classify(7.0, &t), RoadQuality::Poor);
        assert_eq!(classify(15.0, &t), RoadQuality::VeryPoor);
        assert_eq!(classify(1e9, &t), RoadQuality::VeryPoor);
    }

    #[test]
    fn test_classification_is_monotonic() {
        let ladders = [
            QualityThresholds::default(),
            QualityThresholds {
                excellent: 0.5,
                good: 0.6,
                fair: 20.0,
                poor: 21.0,
            },
        ];
        for t in &ladders {
            let mut last = u8::MAX;
            for step in 0..3000 {
                let r = step as f64 * 0.01;
                let score = classify(r, t).score();
                assert!(score <= last, "score rose at roughness {r}");
                last = score;
            }
        }
    }

    #[test]
    fn test_profile_sorted_by_signed_angle() {
        let analyzer = analyzer_with_min(3);
        let frame = ScanFrame::new(vec![
            RangeSample::new(10.0, 290.0),
            RangeSample::new(350.0, 310.0),
            RangeSample::new(0.0, 300.0),
        ]);
        let m = analyzer.analyze(&frame);
        // -10 deg first, then 0, then +10; bumps (closer) are positive
        assert_eq!(m.profile_mm.len(), 3);
        assert!((m.profile_mm[0] + 10.0).abs() < 1e-9);
        assert!(m.profile_mm[1].abs() < 1e-9);
        assert!((m.profile_mm[2] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_arithmetic_fault_reports_error() {
        let analyzer = RoadQualityAnalyzer::new(
            AnalyzerConfig {
                min_valid_samples: 3,
                ..Default::default()
            },
            GroundWindow {
                min_distance_mm: 0.0,
                max_distance_mm: f64::MAX,
            },
        );
        let m = analyzer.analyze(&frame_from_distances(&[1e300, 1.6e300, 1e300]));
        assert_eq!(m.quality, RoadQuality::Error);
        assert_eq!(m.quality_score, 0);
        assert!(analyzer
            .try_analyze(&frame_from_distances(&[1e300, 1.6e300, 1e300]))
            .is_err());
    }
}
