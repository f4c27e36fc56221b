//! AlertSink - hazard and low-battery alerts
//!
//! High severity goes out at `warn`, medium at `info`, both on the
//! `road_quality::alert` target so a subscriber can route them to their own
//! channel. Only analysis snapshots carry fresh anomalies; track snapshots
//! repeat the last tick's list and are ignored here.

use std::collections::HashMap;

use contracts::{ContractError, DataSink, FusionSnapshot, Severity, SnapshotTrigger};
use tracing::{info, instrument, warn};

use crate::error::DispatcherError;

/// Alerts raised so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertCounts {
    pub high: u64,
    pub medium: u64,
    pub low_battery: u64,
}

/// Sink that turns anomalies and the low-battery latch into alerts
pub struct AlertSink {
    name: String,
    min_severity: Severity,
    low_battery: bool,
    counts: AlertCounts,
}

impl AlertSink {
    /// Create a new AlertSink that reports every severity
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            min_severity: Severity::Medium,
            low_battery: false,
            counts: AlertCounts::default(),
        }
    }

    /// Create from params map (`min_severity = "medium" | "high"`)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, DispatcherError> {
        let name = name.into();
        let min_severity = match params.get("min_severity").map(|s| s.to_ascii_lowercase()) {
            None => Severity::Medium,
            Some(s) if s == "medium" => Severity::Medium,
            Some(s) if s == "high" => Severity::High,
            Some(other) => {
                return Err(DispatcherError::sink_creation(
                    &name,
                    format!("unknown min_severity '{other}', expected medium|high"),
                ))
            }
        };
        Ok(Self {
            min_severity,
            ..Self::new(name)
        })
    }

    pub fn counts(&self) -> AlertCounts {
        self.counts
    }

    fn alert_anomalies(&mut self, snapshot: &FusionSnapshot) {
        let fix = snapshot.gps;
        for event in &snapshot.anomalies {
            if event.severity < self.min_severity {
                continue;
            }
            match event.severity {
                Severity::High => {
                    self.counts.high += 1;
                    warn!(
                        target: "road_quality::alert",
                        sink = %self.name,
                        tick = snapshot.tick,
                        kind = %event.kind,
                        magnitude_mm = event.magnitude_mm,
                        width_cm = event.width_cm,
                        lat = fix.map(|f| f.lat),
                        lon = fix.map(|f| f.lon),
                        "High severity road hazard"
                    );
                }
                Severity::Medium => {
                    self.counts.medium += 1;
                    info!(
                        target: "road_quality::alert",
                        sink = %self.name,
                        tick = snapshot.tick,
                        kind = %event.kind,
                        magnitude_mm = event.magnitude_mm,
                        width_cm = event.width_cm,
                        lat = fix.map(|f| f.lat),
                        lon = fix.map(|f| f.lon),
                        "Road hazard"
                    );
                }
            }
        }
    }

    fn alert_battery(&mut self, snapshot: &FusionSnapshot) {
        if snapshot.low_battery == self.low_battery {
            return;
        }
        self.low_battery = snapshot.low_battery;
        if snapshot.low_battery {
            self.counts.low_battery += 1;
            warn!(
                target: "road_quality::alert",
                sink = %self.name,
                percentage = snapshot.battery.percentage,
                runtime_min = snapshot.battery.estimated_runtime_minutes,
                "Battery low"
            );
        } else {
            info!(
                target: "road_quality::alert",
                sink = %self.name,
                percentage = snapshot.battery.percentage,
                "Battery recovered"
            );
        }
    }
}

impl DataSink for AlertSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "alert_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, tick = snapshot.tick)
    )]
    async fn write(&mut self, snapshot: &FusionSnapshot) -> Result<(), ContractError> {
        if snapshot.trigger == SnapshotTrigger::Analysis {
            self.alert_anomalies(snapshot);
        }
        self.alert_battery(snapshot);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    #[instrument(name = "alert_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            high = self.counts.high,
            medium = self.counts.medium,
            low_battery = self.counts.low_battery,
            "AlertSink closed"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AnomalyEvent, AnomalyKind};
    use std::collections::BTreeSet;

    fn event(kind: AnomalyKind, severity: Severity) -> AnomalyEvent {
        AnomalyEvent {
            kind,
            magnitude_mm: 55.0,
            width_cm: 4,
            severity,
            sample_indices: BTreeSet::from([1, 2]),
        }
    }

    fn analysis(anomalies: Vec<AnomalyEvent>) -> FusionSnapshot {
        FusionSnapshot {
            anomalies,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_severity_channels() {
        let mut sink = AlertSink::new("alerts");
        sink.write(&analysis(vec![
            event(AnomalyKind::Pothole, Severity::High),
            event(AnomalyKind::Crack, Severity::Medium),
            event(AnomalyKind::Bump, Severity::Medium),
        ]))
        .await
        .unwrap();
        assert_eq!(
            sink.counts(),
            AlertCounts {
                high: 1,
                medium: 2,
                low_battery: 0
            }
        );
    }

    #[tokio::test]
    async fn test_track_snapshots_do_not_repeat_alerts() {
        let mut sink = AlertSink::new("alerts");
        let mut snapshot = analysis(vec![event(AnomalyKind::Pothole, Severity::High)]);
        snapshot.trigger = SnapshotTrigger::Track;
        sink.write(&snapshot).await.unwrap();
        assert_eq!(sink.counts().high, 0);
    }

    #[tokio::test]
    async fn test_min_severity_high() {
        let params = HashMap::from([("min_severity".to_string(), "HIGH".to_string())]);
        let mut sink = AlertSink::from_params("alerts", &params).unwrap();
        sink.write(&analysis(vec![
            event(AnomalyKind::Pothole, Severity::High),
            event(AnomalyKind::Crack, Severity::Medium),
        ]))
        .await
        .unwrap();
        assert_eq!(sink.counts().high, 1);
        assert_eq!(sink.counts().medium, 0);
    }

    #[test]
    fn test_bad_min_severity() {
        let params = HashMap::from([("min_severity".to_string(), "low".to_string())]);
        let err = AlertSink::from_params("alerts", &params).err().unwrap();
        assert!(err.to_string().contains("unknown min_severity"));
    }

    #[tokio::test]
    async fn test_low_battery_alert_once_per_latch() {
        let mut sink = AlertSink::new("alerts");
        let low = FusionSnapshot {
            low_battery: true,
            ..Default::default()
        };
        sink.write(&low).await.unwrap();
        sink.write(&low).await.unwrap();
        sink.write(&FusionSnapshot::default()).await.unwrap();
        sink.write(&low).await.unwrap();
        assert_eq!(sink.counts().low_battery, 2);
    }
}
