//! Acquisition activities: pull one reading from a source and store it.
//!
//! The source call happens before any lock is taken; the store write is a
//! single wholesale replace.

use std::sync::Arc;
use std::time::Duration;

use contracts::{AccelSource, FixSource, ScanSource, SnapshotTrigger};
use observability::{record_sample_ingested, record_snapshot_metrics};
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::activity::Activity;
use crate::error::FusionError;
use crate::publisher::SnapshotPublisher;
use crate::store::StateStore;

/// Scan ingestion (~20 Hz)
pub struct ScanIngestion<S> {
    source: S,
    store: Arc<StateStore>,
}

impl<S: ScanSource> ScanIngestion<S> {
    pub fn new(source: S, store: Arc<StateStore>) -> Self {
        Self { source, store }
    }
}

impl<S: ScanSource + Send + 'static> Activity for ScanIngestion<S> {
    fn name(&self) -> &'static str {
        "scan"
    }

    async fn iterate(&mut self, iteration: u64) -> Result<(), FusionError> {
        let frame = self.source.next_frame().await;
        let present = !frame.is_empty();
        record_sample_ingested(self.source.name(), present);

        // an empty frame keeps the previous scan in place
        if present {
            trace!(tick = iteration, points = frame.len(), "Scan stored");
            self.store.update_lidar(frame);
        } else {
            debug!(source = self.source.name(), tick = iteration, "Empty scan");
        }
        Ok(())
    }
}

/// Accelerometer ingestion (~10 Hz)
pub struct AccelIngestion<A> {
    source: A,
    store: Arc<StateStore>,
}

impl<A: AccelSource> AccelIngestion<A> {
    pub fn new(source: A, store: Arc<StateStore>) -> Self {
        Self { source, store }
    }
}

impl<A: AccelSource + Send + 'static> Activity for AccelIngestion<A> {
    fn name(&self) -> &'static str {
        "accel"
    }

    async fn iterate(&mut self, iteration: u64) -> Result<(), FusionError> {
        match self.source.next_sample().await {
            Some(sample) => {
                record_sample_ingested(self.source.name(), true);
                self.store.update_accel(sample);
            }
            None => {
                record_sample_ingested(self.source.name(), false);
                debug!(
                    source = self.source.name(),
                    tick = iteration,
                    last_known = ?self.store.latest_accel().map(|s| s.z_g),
                    "Accelerometer sample missing"
                );
            }
        }
        Ok(())
    }
}

/// Fix ingestion (~5 Hz) with the slower track trigger
///
/// Once a valid fix is held, a `Track` snapshot goes out at most once per
/// `track_interval`.
pub struct FixIngestion<F> {
    source: F,
    store: Arc<StateStore>,
    publisher: SnapshotPublisher,
    track_interval: Duration,
    last_track: Option<Instant>,
}

impl<F: FixSource> FixIngestion<F> {
    pub fn new(
        source: F,
        store: Arc<StateStore>,
        publisher: SnapshotPublisher,
        track_interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            publisher,
            track_interval,
            last_track: None,
        }
    }

    fn track_due(&self, now: Instant) -> bool {
        match self.last_track {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.track_interval,
        }
    }
}

impl<F: FixSource + Send + 'static> Activity for FixIngestion<F> {
    fn name(&self) -> &'static str {
        "fix"
    }

    async fn iterate(&mut self, iteration: u64) -> Result<(), FusionError> {
        let fix = self.source.next_fix().await;
        record_sample_ingested(self.source.name(), fix.is_some());
        if let Some(fix) = fix {
            self.store.update_gps(fix);
        }

        let now = Instant::now();
        if self.store.gps().is_none() || !self.track_due(now) {
            return Ok(());
        }
        self.last_track = Some(now);

        let snapshot = self.store.snapshot(SnapshotTrigger::Track);
        debug!(
            tick = iteration,
            lat = snapshot.gps.map(|f| f.lat),
            lon = snapshot.gps.map(|f| f.lon),
            "Track point"
        );
        record_snapshot_metrics(&snapshot);
        self.publisher.publish(snapshot)?;
        Ok(())
    }
}
