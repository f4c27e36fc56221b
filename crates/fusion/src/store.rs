//! Shared State Store
//!
//! One lock per domain (scan, accel, gps, calibration, quality, anomaly
//! history, battery). Writers replace a domain value wholesale and readers
//! copy it out, so no lock is held for longer than a clone and none is
//! ever held across an await.
//!
//! Histories are fixed-capacity ring buffers; the oldest entry is evicted
//! when a new one arrives on a full buffer.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use contracts::{
    AccelSample, AnomalyEvent, AnomalyRecord, BatteryStatus, CalibrationBaseline,
    FusionSnapshot, GpsFix, HistoryConfig, RoadQualityMetrics, ScanFrame, SnapshotTrigger,
};
use ringbuf::{traits::*, HeapRb};

/// Latest analysis result plus the score history
struct QualityDomain {
    metrics: RoadQualityMetrics,
    anomalies: Vec<AnomalyEvent>,
    scores: HeapRb<u8>,
}

#[derive(Clone, Copy, Default)]
struct BatteryDomain {
    status: BatteryStatus,
    low: bool,
}

/// Domain-partitioned holder of the latest readings and derived results
pub struct StateStore {
    session_id: String,
    tick: AtomicU64,
    scan: RwLock<ScanFrame>,
    accel: RwLock<HeapRb<AccelSample>>,
    gps: RwLock<Option<GpsFix>>,
    calibration: RwLock<Option<CalibrationBaseline>>,
    quality: RwLock<QualityDomain>,
    anomaly_history: RwLock<HeapRb<AnomalyRecord>>,
    battery: RwLock<BatteryDomain>,
}

impl fmt::Debug for StateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateStore")
            .field("session_id", &self.session_id)
            .field("tick", &self.tick())
            .field("accel_window", &read(&self.accel).occupied_len())
            .field("anomaly_history", &read(&self.anomaly_history).occupied_len())
            .finish()
    }
}

// Values are replaced wholesale, so a panicked writer cannot leave a torn
// record behind and the poisoned guard is safe to reuse.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn push_bounded<T>(rb: &mut HeapRb<T>, item: T) {
    if rb.is_full() {
        let _ = rb.try_pop();
    }
    let _ = rb.try_push(item);
}

impl StateStore {
    pub fn new(session_id: impl Into<String>, history: &HistoryConfig) -> Self {
        Self {
            session_id: session_id.into(),
            tick: AtomicU64::new(0),
            scan: RwLock::new(ScanFrame::empty()),
            accel: RwLock::new(HeapRb::new(history.accel_window.max(1))),
            gps: RwLock::new(None),
            calibration: RwLock::new(None),
            quality: RwLock::new(QualityDomain {
                metrics: RoadQualityMetrics::default(),
                anomalies: Vec::new(),
                scores: HeapRb::new(history.score_history.max(1)),
            }),
            anomaly_history: RwLock::new(HeapRb::new(history.anomaly_history.max(1))),
            battery: RwLock::new(BatteryDomain::default()),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Number of analysis results published so far
    pub fn tick(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    // ---- writers ----

    pub fn update_lidar(&self, frame: ScanFrame) {
        *write(&self.scan) = frame;
    }

    /// Append to the accelerometer window
    pub fn update_accel(&self, sample: AccelSample) {
        push_bounded(&mut write(&self.accel), sample);
    }

    pub fn update_gps(&self, fix: GpsFix) {
        *write(&self.gps) = Some(fix);
    }

    /// Install or replace the calibration baseline
    pub fn update_calibration(&self, baseline: CalibrationBaseline) {
        *write(&self.calibration) = Some(baseline);
    }

    /// Publish one analysis result and return its tick.
    ///
    /// Each anomaly is also appended to the anomaly history, stamped with
    /// the fix held at this moment.
    pub fn update_quality(&self, metrics: RoadQualityMetrics, anomalies: Vec<AnomalyEvent>) -> u64 {
        let tick = self.tick.fetch_add(1, Ordering::AcqRel) + 1;
        let fix = self.gps();
        let detected_at = Utc::now();

        let records: Vec<AnomalyRecord> = anomalies
            .iter()
            .map(|event| AnomalyRecord {
                event: event.clone(),
                fix,
                detected_at,
                tick,
            })
            .collect();

        {
            let mut quality = write(&self.quality);
            push_bounded(&mut quality.scores, metrics.quality_score);
            quality.metrics = metrics;
            quality.anomalies = anomalies;
        }

        if !records.is_empty() {
            let mut history = write(&self.anomaly_history);
            for record in records {
                push_bounded(&mut history, record);
            }
        }

        tick
    }

    pub fn update_battery(&self, status: BatteryStatus, low: bool) {
        *write(&self.battery) = BatteryDomain { status, low };
    }

    // ---- readers ----

    pub fn scan(&self) -> ScanFrame {
        read(&self.scan).clone()
    }

    pub fn latest_accel(&self) -> Option<AccelSample> {
        read(&self.accel).iter().last().copied()
    }

    /// Accelerometer window, oldest first
    pub fn accel_window(&self) -> Vec<AccelSample> {
        read(&self.accel).iter().copied().collect()
    }

    pub fn gps(&self) -> Option<GpsFix> {
        *read(&self.gps)
    }

    pub fn calibration(&self) -> Option<CalibrationBaseline> {
        *read(&self.calibration)
    }

    pub fn quality(&self) -> RoadQualityMetrics {
        read(&self.quality).metrics.clone()
    }

    pub fn anomalies(&self) -> Vec<AnomalyEvent> {
        read(&self.quality).anomalies.clone()
    }

    /// Quality scores, oldest first
    pub fn score_history(&self) -> Vec<u8> {
        read(&self.quality).scores.iter().copied().collect()
    }

    /// Anomaly records, oldest first
    pub fn anomaly_history(&self) -> Vec<AnomalyRecord> {
        read(&self.anomaly_history).iter().cloned().collect()
    }

    pub fn battery(&self) -> BatteryStatus {
        read(&self.battery).status
    }

    pub fn low_battery(&self) -> bool {
        read(&self.battery).low
    }

    /// Current values, tagged as an analysis read.
    pub fn get_snapshot(&self) -> FusionSnapshot {
        self.snapshot(SnapshotTrigger::Analysis)
    }

    /// Copy every domain into a snapshot.
    ///
    /// Each domain is read under its own lock, one after another; the
    /// result is consistent per domain, not across domains.
    pub fn snapshot(&self, trigger: SnapshotTrigger) -> FusionSnapshot {
        let (quality, anomalies, score_history) = {
            let q = read(&self.quality);
            (
                q.metrics.clone(),
                q.anomalies.clone(),
                q.scores.iter().copied().collect(),
            )
        };
        let battery = *read(&self.battery);

        FusionSnapshot {
            session_id: self.session_id.clone(),
            tick: self.tick(),
            captured_at: Utc::now(),
            trigger,
            scan: self.scan(),
            accel_window: self.accel_window(),
            gps: self.gps(),
            quality,
            anomalies,
            calibration: self.calibration(),
            battery: battery.status,
            low_battery: battery.low,
            score_history,
            anomaly_history: self.anomaly_history(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AnomalyKind, Orientation, RangeSample, RoadQuality, Severity};
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn history(capacity: usize) -> HistoryConfig {
        HistoryConfig {
            accel_window: capacity,
            score_history: capacity,
            anomaly_history: capacity,
            ..Default::default()
        }
    }

    fn fix(lat: f64) -> GpsFix {
        GpsFix {
            timestamp: Utc::now(),
            lat,
            lon: 5.0,
            alt: 1.0,
            sat_count: 8,
        }
    }

    fn pothole() -> AnomalyEvent {
        AnomalyEvent {
            kind: AnomalyKind::Pothole,
            magnitude_mm: 45.0,
            width_cm: 4,
            severity: Severity::Medium,
            sample_indices: BTreeSet::from([3, 4]),
        }
    }

    #[test]
    fn test_empty_store_snapshot() {
        let store = StateStore::new("s1", &HistoryConfig::default());
        let snap = store.get_snapshot();
        assert_eq!(snap.trigger, SnapshotTrigger::Analysis);
        assert_eq!(snap.session_id, "s1");
        assert_eq!(snap.tick, 0);
        assert!(snap.scan.is_empty());
        assert!(snap.gps.is_none());
        assert!(snap.calibration.is_none());
        assert_eq!(snap.quality.quality, RoadQuality::Unknown);
        assert_eq!(snap.quality.quality_score, 50);
    }

    #[test]
    fn test_accel_window_evicts_oldest() {
        let store = StateStore::new("s1", &history(3));
        for z in [1.0, 1.1, 1.2, 1.3] {
            store.update_accel(AccelSample::new(z));
        }
        let window: Vec<f64> = store.accel_window().iter().map(|s| s.z_g).collect();
        assert_eq!(window, vec![1.1, 1.2, 1.3]);
        assert_eq!(store.latest_accel(), Some(AccelSample::new(1.3)));
    }

    #[test]
    fn test_writers_replace_wholesale() {
        let store = StateStore::new("s1", &HistoryConfig::default());
        store.update_lidar(ScanFrame::new(vec![RangeSample::new(0.0, 300.0)]));
        store.update_lidar(ScanFrame::new(vec![RangeSample::new(1.0, 310.0)]));
        assert_eq!(store.scan().len(), 1);
        assert_eq!(store.scan().samples[0].angle_deg, 1.0);

        store.update_gps(fix(52.0));
        store.update_gps(fix(52.1));
        assert_eq!(store.gps().map(|f| f.lat), Some(52.1));
    }

    #[test]
    fn test_update_quality_ticks_and_stamps_anomalies() {
        let store = StateStore::new("s1", &history(2));
        store.update_gps(fix(52.5));

        let metrics = RoadQualityMetrics {
            quality: RoadQuality::Good,
            quality_score: 75,
            ..Default::default()
        };
        assert_eq!(store.update_quality(metrics.clone(), vec![pothole()]), 1);
        assert_eq!(store.update_quality(metrics.clone(), vec![]), 2);
        assert_eq!(store.update_quality(metrics, vec![pothole(), pothole()]), 3);

        // score history keeps the newest two
        assert_eq!(store.score_history(), vec![75, 75]);
        let history = store.anomaly_history();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|r| r.tick == 3));
        assert_eq!(history[0].fix.map(|f| f.lat), Some(52.5));
        assert_eq!(store.anomalies().len(), 2);
        assert_eq!(store.tick(), 3);
    }

    #[test]
    fn test_recalibration_replaces_baseline() {
        let store = StateStore::new("s1", &HistoryConfig::default());
        let mut baseline = CalibrationBaseline {
            accel_baseline_g: 1.0,
            ground_distance_baseline_mm: 300.0,
            orientation: Orientation::Horizontal,
            captured_at: Utc::now(),
        };
        store.update_calibration(baseline);
        baseline.ground_distance_baseline_mm = 280.0;
        store.update_calibration(baseline);
        assert_eq!(
            store.calibration().map(|b| b.ground_distance_baseline_mm),
            Some(280.0)
        );
    }

    #[test]
    fn test_battery_domain() {
        let store = StateStore::new("s1", &HistoryConfig::default());
        let status = BatteryStatus {
            percentage: 8.0,
            ..Default::default()
        };
        store.update_battery(status, true);
        let snap = store.snapshot(SnapshotTrigger::Track);
        assert_eq!(snap.battery.percentage, 8.0);
        assert!(snap.low_battery);
        assert_eq!(snap.trigger, SnapshotTrigger::Track);
    }

    #[test]
    fn test_poisoned_domain_still_readable() {
        let store = Arc::new(StateStore::new("s1", &HistoryConfig::default()));
        store.update_gps(fix(51.0));

        let poisoner = Arc::clone(&store);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.gps.write().unwrap();
            panic!("writer died");
        })
        .join();

        assert!(store.gps.is_poisoned());
        assert_eq!(store.gps().map(|f| f.lat), Some(51.0));
        store.update_gps(fix(51.5));
        assert_eq!(store.gps().map(|f| f.lat), Some(51.5));
    }

    #[test]
    fn test_concurrent_writers_and_readers() {
        let store = Arc::new(StateStore::new("s1", &history(10)));
        let writers: Vec<_> = (0..4)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for n in 0..100 {
                        store.update_accel(AccelSample::new(f64::from(i * 100 + n)));
                        let _ = store.snapshot(SnapshotTrigger::Analysis);
                    }
                })
            })
            .collect();
        for w in writers {
            w.join().unwrap();
        }
        assert_eq!(store.accel_window().len(), 10);
    }
}
