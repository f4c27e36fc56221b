//! LogSink - logs snapshot summary via tracing

use contracts::{ContractError, DataSink, FusionSnapshot};
use tracing::{info, instrument};

/// Sink that logs snapshot summaries
pub struct LogSink {
    name: String,
    written: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            written: 0,
        }
    }

    fn log_snapshot_summary(&self, snapshot: &FusionSnapshot) {
        let quality = &snapshot.quality;
        info!(
            sink = %self.name,
            tick = snapshot.tick,
            trigger = ?snapshot.trigger,
            quality = %quality.quality,
            score = quality.quality_score,
            roughness = quality.roughness_index,
            ground_points = quality.ground_points,
            anomalies = snapshot.anomalies.len(),
            lat = snapshot.gps.map(|f| f.lat),
            lon = snapshot.gps.map(|f| f.lon),
            battery_pct = snapshot.battery.percentage,
            "FusionSnapshot received"
        );
    }
}

impl DataSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "log_sink_write",
        skip(self, snapshot),
        fields(sink = %self.name, tick = snapshot.tick)
    )]
    async fn write(&mut self, snapshot: &FusionSnapshot) -> Result<(), ContractError> {
        self.log_snapshot_summary(snapshot);
        self.written += 1;
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, snapshots = self.written, "LogSink closed");
        Ok(())
    }
}
