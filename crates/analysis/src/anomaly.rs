//! Anomaly Detector
//!
//! Works on the narrow-band ground distances of one compensated frame:
//!
//! 1. Baseline is the median distance.
//! 2. Pothole candidates sit further than the baseline, bump candidates
//!    closer. Clusters of two or more adjacent candidates become events.
//! 3. Crack candidates are large first differences between consecutive
//!    distances. Any cluster of them, even a single one, is a crack.
//!
//! The detector holds configuration only; every call is independent.

use std::collections::BTreeSet;

use contracts::{
    AnomalyEvent, AnomalyKind, AnomalyReport, DetectorConfig, GroundWindow, ScanFrame, Severity,
};
use tracing::debug;

use crate::ground::detector_ground_points;
use crate::stats::median;

/// Pothole/bump clusters need at least this many members.
const MIN_SURFACE_CLUSTER: usize = 2;

/// Width estimate per clustered sample.
const CM_PER_SAMPLE: u32 = 2;

/// Anomaly detector
#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: DetectorConfig,
    window: GroundWindow,
}

impl AnomalyDetector {
    pub fn new(config: DetectorConfig, window: GroundWindow) -> Self {
        Self { config, window }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Detect hazards in one compensated frame.
    pub fn detect(&self, frame: &ScanFrame) -> AnomalyReport {
        let ground = detector_ground_points(frame, &self.config, &self.window);
        self.detect_in_distances(&ground)
    }

    /// Detect hazards in narrow-band ground distances, in frame order.
    pub fn detect_in_distances(&self, ground: &[f64]) -> AnomalyReport {
        if ground.len() < self.config.min_ground_points {
            return AnomalyReport::empty();
        }
        let Some(baseline) = median(ground) else {
            return AnomalyReport::empty();
        };

        let mut events = Vec::new();
        events.extend(self.surface_events(ground, baseline, AnomalyKind::Pothole));
        events.extend(self.surface_events(ground, baseline, AnomalyKind::Bump));
        events.extend(self.crack_events(ground));

        if !events.is_empty() {
            debug!(
                count = events.len(),
                baseline_mm = baseline,
                ground_points = ground.len(),
                "Anomalies detected"
            );
        }

        AnomalyReport::from_events(events, baseline)
    }

    /// Pothole or bump events.
    fn surface_events(&self, ground: &[f64], baseline: f64, kind: AnomalyKind) -> Vec<AnomalyEvent> {
        let (threshold, high) = match kind {
            AnomalyKind::Pothole => (
                self.config.pothole_threshold_mm,
                self.config.high_pothole_depth_mm,
            ),
            AnomalyKind::Bump => (
                self.config.bump_threshold_mm,
                self.config.high_bump_height_mm,
            ),
            AnomalyKind::Crack => return Vec::new(),
        };

        // positive deviation = further for potholes, closer for bumps
        let deviation = |d: f64| match kind {
            AnomalyKind::Pothole => d - baseline,
            _ => baseline - d,
        };

        let candidates: Vec<usize> = ground
            .iter()
            .enumerate()
            .filter(|(_, &d)| deviation(d) > threshold)
            .map(|(i, _)| i)
            .collect();

        cluster_indices(&candidates, self.config.max_gap)
            .into_iter()
            .filter(|cluster| cluster.len() >= MIN_SURFACE_CLUSTER)
            .map(|cluster| {
                let magnitude = cluster
                    .iter()
                    .map(|&i| deviation(ground[i]))
                    .fold(f64::NEG_INFINITY, f64::max);
                AnomalyEvent {
                    kind,
                    magnitude_mm: magnitude,
                    width_cm: width_cm(cluster.len()),
                    severity: if magnitude > high {
                        Severity::High
                    } else {
                        Severity::Medium
                    },
                    sample_indices: cluster.into_iter().collect(),
                }
            })
            .collect()
    }

    /// Crack events from first differences.
    fn crack_events(&self, ground: &[f64]) -> Vec<AnomalyEvent> {
        let diffs: Vec<f64> = ground.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
        let candidates: Vec<usize> = diffs
            .iter()
            .enumerate()
            .filter(|(_, &d)| d > self.config.crack_threshold_mm)
            .map(|(i, _)| i)
            .collect();

        cluster_indices(&candidates, self.config.max_gap)
            .into_iter()
            .map(|cluster| {
                let magnitude =
                    cluster.iter().map(|&i| diffs[i]).sum::<f64>() / cluster.len() as f64;
                AnomalyEvent {
                    kind: AnomalyKind::Crack,
                    magnitude_mm: magnitude,
                    width_cm: width_cm(cluster.len()),
                    severity: Severity::Medium,
                    sample_indices: cluster.into_iter().collect::<BTreeSet<_>>(),
                }
            })
            .collect()
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default(), GroundWindow::default())
    }
}

fn width_cm(cluster_len: usize) -> u32 {
    u32::try_from(cluster_len)
        .unwrap_or(u32::MAX)
        .saturating_mul(CM_PER_SAMPLE)
}

/// Group indices into maximal runs whose neighbouring gaps are `<= max_gap`.
///
/// Input order does not matter; duplicates collapse.
pub fn cluster_indices(indices: &[usize], max_gap: usize) -> Vec<Vec<usize>> {
    let sorted: BTreeSet<usize> = indices.iter().copied().collect();
    let mut clusters: Vec<Vec<usize>> = Vec::new();

    for idx in sorted {
        match clusters.last_mut() {
            Some(current) if current.last().is_some_and(|&last| idx - last <= max_gap) => {
                current.push(idx);
            }
            _ => clusters.push(vec![idx]),
        }
    }

    clusters
}
