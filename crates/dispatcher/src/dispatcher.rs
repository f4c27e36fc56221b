//! 快照分发主循环。
//!
//! 从融合核心接收 `FusionSnapshot`，按每个 sink 的 `SnapshotRoute` 投递。
//! 低电量锁存状态发生变化的快照会投递给所有 sink，不受路由限制，
//! 保证只订阅 analysis 的告警 sink 也能看到 track 快照上的电量变化。

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use contracts::{FusionSnapshot, SinkConfig, SinkType, SnapshotTrigger};

use crate::error::DispatcherError;
use crate::handle::{SinkHandle, SnapshotRoute};
use crate::metrics::{MetricsSnapshot, SinkMetrics};
use crate::sinks::{AlertSink, LogSink};

/// Dispatcher configuration
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub sinks: Vec<SinkConfig>,
}

/// Builds a `Dispatcher` from sink configs
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    input_rx: mpsc::Receiver<FusionSnapshot>,
}

impl DispatcherBuilder {
    pub fn new(config: DispatcherConfig, input_rx: mpsc::Receiver<FusionSnapshot>) -> Self {
        Self { config, input_rx }
    }

    /// Spawn one worker per configured sink.
    ///
    /// Fails on the first sink whose params do not parse; workers already
    /// spawned for earlier sinks exit once their handles are dropped.
    #[instrument(
        name = "dispatcher_build",
        skip(self),
        fields(sink_count = self.config.sinks.len())
    )]
    pub async fn build(self) -> Result<Dispatcher, DispatcherError> {
        let handles = self
            .config
            .sinks
            .iter()
            .map(spawn_sink)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Dispatcher::with_handles(handles, self.input_rx))
    }
}

/// Log sinks see every snapshot; alert sinks default to analysis ticks,
/// where fresh anomalies are reported.
fn spawn_sink(config: &SinkConfig) -> Result<SinkHandle, DispatcherError> {
    let capacity = config.queue_capacity;
    let handle = match config.sink_type {
        SinkType::Log => {
            let route = SnapshotRoute::from_params(&config.name, &config.params, SnapshotRoute::ALL)?;
            SinkHandle::spawn_routed(LogSink::new(&config.name), capacity, route)
        }
        SinkType::Alert => {
            let route =
                SnapshotRoute::from_params(&config.name, &config.params, SnapshotRoute::ANALYSIS)?;
            let sink = AlertSink::from_params(&config.name, &config.params)?;
            SinkHandle::spawn_routed(sink, capacity, route)
        }
    };
    debug!(
        sink = %config.name,
        sink_type = ?config.sink_type,
        route = ?handle.route(),
        capacity = handle.capacity(),
        "Sink spawned"
    );
    Ok(handle)
}

/// Counts kept by the dispatch loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchCounts {
    pub analysis: u64,
    pub track: u64,
    pub latch_changes: u64,
}

impl DispatchCounts {
    pub fn total(&self) -> u64 {
        self.analysis + self.track
    }
}

/// Fans snapshots out to the sink workers
pub struct Dispatcher {
    handles: Vec<SinkHandle>,
    input_rx: mpsc::Receiver<FusionSnapshot>,
    low_battery: bool,
    counts: DispatchCounts,
}

impl Dispatcher {
    /// Dispatcher over already spawned sink handles
    pub fn with_handles(handles: Vec<SinkHandle>, input_rx: mpsc::Receiver<FusionSnapshot>) -> Self {
        Self {
            handles,
            input_rx,
            low_battery: false,
            counts: DispatchCounts::default(),
        }
    }

    pub fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    /// Shared per-sink counters, still readable after `spawn()`
    pub fn sink_metrics(&self) -> Vec<(String, Arc<SinkMetrics>)> {
        self.handles
            .iter()
            .map(|h| (h.name().to_string(), Arc::clone(h.metrics())))
            .collect()
    }

    /// Deliver snapshots until the input side closes, then drain every sink.
    #[instrument(name = "dispatcher_run", skip(self), fields(sinks = self.handles.len()))]
    pub async fn run(mut self) -> DispatchCounts {
        info!("Dispatcher started");

        while let Some(snapshot) = self.input_rx.recv().await {
            self.dispatch_snapshot(&snapshot);
            let total = self.counts.total();
            if total.is_multiple_of(100) {
                debug!(
                    snapshots = total,
                    analysis = self.counts.analysis,
                    track = self.counts.track,
                    "Dispatcher progress"
                );
            }
        }

        let counts = self.counts;
        for handle in self.handles {
            handle.shutdown().await;
        }
        info!(
            analysis = counts.analysis,
            track = counts.track,
            latch_changes = counts.latch_changes,
            "Dispatcher stopped"
        );
        counts
    }

    pub fn spawn(self) -> JoinHandle<DispatchCounts> {
        tokio::spawn(self.run())
    }

    fn dispatch_snapshot(&mut self, snapshot: &FusionSnapshot) {
        match snapshot.trigger {
            SnapshotTrigger::Analysis => self.counts.analysis += 1,
            SnapshotTrigger::Track => self.counts.track += 1,
        }

        let latch_changed = snapshot.low_battery != self.low_battery;
        if latch_changed {
            self.low_battery = snapshot.low_battery;
            self.counts.latch_changes += 1;
            warn!(
                tick = snapshot.tick,
                low_battery = snapshot.low_battery,
                percentage = snapshot.battery.percentage,
                "Battery latch changed, delivering to every sink"
            );
        }

        for handle in &self.handles {
            if latch_changed || handle.route().accepts(snapshot.trigger) {
                handle.try_send(snapshot.clone());
            }
        }
    }
}

/// Build a dispatcher straight from sink configs
pub async fn create_dispatcher(
    sink_configs: Vec<SinkConfig>,
    input_rx: mpsc::Receiver<FusionSnapshot>,
) -> Result<Dispatcher, DispatcherError> {
    DispatcherBuilder::new(DispatcherConfig { sinks: sink_configs }, input_rx)
        .build()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn snapshot(tick: u64, trigger: SnapshotTrigger) -> FusionSnapshot {
        FusionSnapshot {
            tick,
            trigger,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_every_sink_sees_every_snapshot_by_default() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let handles = vec![
            SinkHandle::spawn(LogSink::new("a"), 10),
            SinkHandle::spawn(LogSink::new("b"), 10),
        ];
        let dispatcher = Dispatcher::with_handles(handles, input_rx);
        let metrics = dispatcher.sink_metrics();
        let task = dispatcher.spawn();

        for tick in 0..3 {
            input_tx.send(snapshot(tick, SnapshotTrigger::Analysis)).await.unwrap();
        }
        input_tx.send(snapshot(3, SnapshotTrigger::Track)).await.unwrap();
        drop(input_tx);

        let counts = task.await.unwrap();
        assert_eq!(counts.analysis, 3);
        assert_eq!(counts.track, 1);
        for (_, m) in metrics {
            assert_eq!(m.write_count(), 4);
        }
    }

    #[tokio::test]
    async fn test_alert_sink_skips_track_but_sees_latch_change() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let configs = vec![
            SinkConfig::new("log", SinkType::Log),
            SinkConfig::new("alerts", SinkType::Alert),
        ];
        let dispatcher = create_dispatcher(configs, input_rx).await.unwrap();
        let metrics: HashMap<String, Arc<SinkMetrics>> =
            dispatcher.sink_metrics().into_iter().collect();
        let task = dispatcher.spawn();

        input_tx.send(snapshot(1, SnapshotTrigger::Analysis)).await.unwrap();
        input_tx.send(snapshot(1, SnapshotTrigger::Track)).await.unwrap();
        let mut low = snapshot(1, SnapshotTrigger::Track);
        low.low_battery = true;
        input_tx.send(low.clone()).await.unwrap();
        input_tx.send(low).await.unwrap();
        drop(input_tx);

        let counts = task.await.unwrap();
        assert_eq!(counts.latch_changes, 1);
        assert_eq!(metrics["log"].write_count(), 4);
        // analysis tick + the track snapshot that flipped the latch
        assert_eq!(metrics["alerts"].write_count(), 2);
    }

    #[tokio::test]
    async fn test_route_param_overrides_default() {
        let (input_tx, input_rx) = mpsc::channel(10);
        let mut gps_log = SinkConfig::new("gps", SinkType::Log);
        gps_log.params = HashMap::from([("snapshots".to_string(), "track".to_string())]);
        let dispatcher = create_dispatcher(vec![gps_log], input_rx).await.unwrap();
        let metrics = dispatcher.sink_metrics();
        let task = dispatcher.spawn();

        input_tx.send(snapshot(1, SnapshotTrigger::Analysis)).await.unwrap();
        input_tx.send(snapshot(1, SnapshotTrigger::Track)).await.unwrap();
        drop(input_tx);
        task.await.unwrap();

        assert_eq!(metrics[0].1.write_count(), 1);
    }

    #[tokio::test]
    async fn test_bad_alert_params_fail_creation() {
        let (_input_tx, input_rx) = mpsc::channel(10);
        let mut config = SinkConfig::new("alerts", SinkType::Alert);
        config.params = HashMap::from([("min_severity".to_string(), "extreme".to_string())]);

        let err = create_dispatcher(vec![config], input_rx).await.err().unwrap();
        assert!(matches!(err, DispatcherError::SinkCreation { .. }));
    }
}
