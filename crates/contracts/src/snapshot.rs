//! FusionSnapshot - Fusion Orchestrator output
//!
//! Point-in-time copy of the shared state handed to sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    AccelSample, AnomalyEvent, BatteryStatus, CalibrationBaseline, GpsFix, RoadQualityMetrics,
    ScanFrame,
};

/// Which activity produced the snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotTrigger {
    /// Quality/anomaly analysis tick
    #[default]
    Analysis,
    /// Periodic track point from fix ingestion (map/persist consumers)
    Track,
}

/// Anomaly event stamped with where and when it was seen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub event: AnomalyEvent,
    pub fix: Option<GpsFix>,
    pub detected_at: DateTime<Utc>,
    pub tick: u64,
}

/// Fusion snapshot
///
/// Each domain is internally consistent; domains may come from slightly
/// different ticks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FusionSnapshot {
    /// Run identifier
    pub session_id: String,

    /// Analysis tick counter (monotonically increasing)
    pub tick: u64,

    pub captured_at: DateTime<Utc>,

    pub trigger: SnapshotTrigger,

    /// Latest raw scan
    pub scan: ScanFrame,

    /// Recent accelerometer samples, oldest first
    pub accel_window: Vec<AccelSample>,

    pub gps: Option<GpsFix>,

    pub quality: RoadQualityMetrics,

    /// Anomalies from the latest analysis tick
    pub anomalies: Vec<AnomalyEvent>,

    pub calibration: Option<CalibrationBaseline>,

    pub battery: BatteryStatus,

    /// Low-battery latch
    #[serde(default)]
    pub low_battery: bool,

    /// Recent quality scores, oldest first
    #[serde(default)]
    pub score_history: Vec<u8>,

    /// Recent anomalies, oldest first
    #[serde(default)]
    pub anomaly_history: Vec<AnomalyRecord>,
}

impl FusionSnapshot {
    /// Latest accelerometer sample, if any
    pub fn latest_accel(&self) -> Option<AccelSample> {
        self.accel_window.last().copied()
    }

    pub fn has_anomaly(&self) -> bool {
        !self.anomalies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_accel() {
        let snapshot = FusionSnapshot {
            accel_window: vec![AccelSample::new(0.9), AccelSample::new(1.1)],
            ..Default::default()
        };
        assert_eq!(snapshot.latest_accel(), Some(AccelSample::new(1.1)));
        assert!(!snapshot.has_anomaly());
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let snapshot = FusionSnapshot {
            session_id: "s1".into(),
            tick: 7,
            trigger: SnapshotTrigger::Track,
            ..Default::default()
        };
        let json = serde_json::to_string(&snapshot).unwrap();
        let back: FusionSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.tick, 7);
        assert_eq!(back.trigger, SnapshotTrigger::Track);
    }
}
