//! Analysis activity (~2 Hz): compensate, score, detect, publish.

use std::sync::Arc;
use std::time::Instant;

use analysis::AnalysisSuite;
use contracts::{RoadQuality, Severity, SnapshotTrigger};
use observability::{record_analysis_latency_ms, record_snapshot_metrics};
use tracing::{debug, info, warn};

use crate::activity::Activity;
use crate::error::FusionError;
use crate::publisher::SnapshotPublisher;
use crate::store::StateStore;

pub struct AnalysisActivity {
    suite: AnalysisSuite,
    store: Arc<StateStore>,
    publisher: SnapshotPublisher,
    last_good_score: Option<u8>,
}

impl AnalysisActivity {
    pub fn new(suite: AnalysisSuite, store: Arc<StateStore>, publisher: SnapshotPublisher) -> Self {
        Self {
            suite,
            store,
            publisher,
            last_good_score: None,
        }
    }
}

impl Activity for AnalysisActivity {
    fn name(&self) -> &'static str {
        "analysis"
    }

    async fn iterate(&mut self, _iteration: u64) -> Result<(), FusionError> {
        // Copy inputs out; each read holds its domain lock only for the copy.
        let scan = self.store.scan();
        let accel = self.store.latest_accel();
        let baseline = self.store.calibration();

        let started = Instant::now();
        let outcome = self.suite.run(&scan, accel, baseline.as_ref());
        record_analysis_latency_ms(started.elapsed().as_secs_f64() * 1000.0);

        let metrics = outcome.metrics;
        let anomalies = outcome.report.anomalies;
        let quality = metrics.quality;
        let score = metrics.quality_score;
        let roughness = metrics.roughness_index;
        let ground_points = metrics.ground_points;
        let anomaly_count = anomalies.len();
        let high = anomalies
            .iter()
            .filter(|a| a.severity == Severity::High)
            .count();

        let tick = self.store.update_quality(metrics, anomalies);

        match quality {
            RoadQuality::Error => warn!(
                tick,
                points = scan.len(),
                last_good_score = ?self.last_good_score,
                "Analysis fault, quality reported as error"
            ),
            RoadQuality::Unknown => debug!(tick, ground_points, "Insufficient ground points"),
            _ => {
                self.last_good_score = Some(score);
                debug!(tick, quality = %quality, score, roughness, ground_points, "Road quality");
            }
        }
        if anomaly_count > 0 {
            info!(tick, anomalies = anomaly_count, high, "Anomalies detected");
        }

        let snapshot = self.store.snapshot(SnapshotTrigger::Analysis);
        record_snapshot_metrics(&snapshot);
        self.publisher.publish(snapshot)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{HistoryConfig, RangeSample, ScanFrame};
    use tokio::sync::mpsc;

    fn flat_road(distance: f64) -> ScanFrame {
        (-45..=45)
            .map(|a| RangeSample::new(f64::from(a), distance))
            .collect()
    }

    #[tokio::test]
    async fn test_publishes_metrics_per_tick() {
        let store = Arc::new(StateStore::new("s", &HistoryConfig::default()));
        let (tx, mut rx) = mpsc::channel(4);
        let mut activity =
            AnalysisActivity::new(AnalysisSuite::default(), Arc::clone(&store), SnapshotPublisher::new(tx));

        // nothing scanned yet
        activity.iterate(1).await.unwrap();
        let snap = rx.recv().await.unwrap();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.quality.quality, RoadQuality::Unknown);
        assert_eq!(snap.trigger, SnapshotTrigger::Analysis);

        store.update_lidar(flat_road(300.0));
        activity.iterate(2).await.unwrap();
        let snap = rx.recv().await.unwrap();
        assert_eq!(snap.tick, 2);
        assert_eq!(snap.quality.quality, RoadQuality::Excellent);
        assert!(snap.anomalies.is_empty());
        assert_eq!(snap.score_history, vec![50, 90]);
    }

    #[tokio::test]
    async fn test_pothole_lands_in_history() {
        let store = Arc::new(StateStore::new("s", &HistoryConfig::default()));
        let mut frame = flat_road(300.0);
        for sample in frame.samples.iter_mut() {
            let a = sample.signed_angle();
            if (1.0..=3.0).contains(&a) {
                sample.distance_mm = 360.0;
            }
        }
        store.update_lidar(frame);

        let mut activity = AnalysisActivity::new(
            AnalysisSuite::default(),
            Arc::clone(&store),
            SnapshotPublisher::disconnected(),
        );
        activity.iterate(1).await.unwrap();

        let history = store.anomaly_history();
        assert!(history
            .iter()
            .any(|r| r.event.kind == contracts::AnomalyKind::Pothole && r.tick == 1));
    }

    #[tokio::test]
    async fn test_closed_channel_surfaces_as_error() {
        let store = Arc::new(StateStore::new("s", &HistoryConfig::default()));
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut activity =
            AnalysisActivity::new(AnalysisSuite::default(), Arc::clone(&store), SnapshotPublisher::new(tx));
        assert!(activity.iterate(1).await.is_err());
        // the result was still stored before publishing failed
        assert_eq!(store.tick(), 1);
    }
}
