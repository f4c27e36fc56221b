//! 单个 sink 的队列与工作任务。
//!
//! 每个 sink 拥有独立的有界队列：队列满时只丢弃发往该 sink 的最新快照，
//! 其余 sink 与融合核心不受影响。`SnapshotRoute` 决定该 sink 接收
//! 哪类触发的快照 (analysis / track)。

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument, warn};

use contracts::{DataSink, FusionSnapshot, SnapshotTrigger};
use observability::{record_snapshot_dispatched, record_snapshot_dropped};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// Which snapshot triggers a sink subscribes to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotRoute {
    pub analysis: bool,
    pub track: bool,
}

impl SnapshotRoute {
    pub const ALL: Self = Self {
        analysis: true,
        track: true,
    };
    pub const ANALYSIS: Self = Self {
        analysis: true,
        track: false,
    };
    pub const TRACK: Self = Self {
        analysis: false,
        track: true,
    };

    /// Parse the `snapshots` sink param (`all` | `analysis` | `track`),
    /// falling back to `default` when absent.
    pub fn from_params(
        name: &str,
        params: &HashMap<String, String>,
        default: Self,
    ) -> Result<Self, DispatcherError> {
        match params.get("snapshots").map(|s| s.to_ascii_lowercase()) {
            None => Ok(default),
            Some(s) => match s.as_str() {
                "all" => Ok(Self::ALL),
                "analysis" => Ok(Self::ANALYSIS),
                "track" => Ok(Self::TRACK),
                other => Err(DispatcherError::sink_creation(
                    name,
                    format!("unknown snapshots route '{other}', expected all|analysis|track"),
                )),
            },
        }
    }

    pub fn accepts(&self, trigger: SnapshotTrigger) -> bool {
        match trigger {
            SnapshotTrigger::Analysis => self.analysis,
            SnapshotTrigger::Track => self.track,
        }
    }
}

impl Default for SnapshotRoute {
    fn default() -> Self {
        Self::ALL
    }
}

/// Running sink: bounded queue in front of a worker task
pub struct SinkHandle {
    name: String,
    route: SnapshotRoute,
    tx: mpsc::Sender<FusionSnapshot>,
    capacity: usize,
    metrics: Arc<SinkMetrics>,
    worker: JoinHandle<()>,
}

impl SinkHandle {
    /// Spawn a worker for `sink` that receives every snapshot.
    pub fn spawn<S: DataSink + Send + 'static>(sink: S, queue_capacity: usize) -> Self {
        Self::spawn_routed(sink, queue_capacity, SnapshotRoute::ALL)
    }

    /// Spawn a worker for `sink` that receives only snapshots `route` accepts.
    pub fn spawn_routed<S: DataSink + Send + 'static>(
        sink: S,
        queue_capacity: usize,
        route: SnapshotRoute,
    ) -> Self {
        let name = sink.name().to_string();
        let capacity = queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let metrics = Arc::new(SinkMetrics::new());

        let worker = tokio::spawn(drain_queue(sink, rx, Arc::clone(&metrics), name.clone()));

        Self {
            name,
            route,
            tx,
            capacity,
            metrics,
            worker,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> SnapshotRoute {
        self.route
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue `snapshot` without waiting.
    ///
    /// `false` when the queue is full (the snapshot is counted as dropped)
    /// or the worker is gone.
    pub fn try_send(&self, snapshot: FusionSnapshot) -> bool {
        match self.tx.try_send(snapshot) {
            Ok(()) => {
                self.metrics.set_queue_len(self.capacity - self.tx.capacity());
                true
            }
            Err(mpsc::error::TrySendError::Full(s)) => {
                self.metrics.inc_dropped_count();
                record_snapshot_dropped(&self.name);
                warn!(
                    sink = %self.name,
                    tick = s.tick,
                    trigger = ?s.trigger,
                    "Sink queue full, snapshot dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                error!(sink = %self.name, "Sink worker is gone");
                false
            }
        }
    }

    /// Close the queue and wait until the worker has written what is left.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        drop(self.tx);
        if let Err(e) = self.worker.await {
            error!(sink = %self.name, error = ?e, "Sink worker panicked");
        }
        debug!(sink = %self.name, metrics = %self.metrics.snapshot(), "Sink drained");
    }
}

/// Write queued snapshots until the sender side closes, then flush and close
/// the sink. A failed write is counted and the next snapshot is tried.
#[instrument(name = "sink_worker", skip(sink, rx, metrics), fields(sink = %name))]
async fn drain_queue<S: DataSink>(
    mut sink: S,
    mut rx: mpsc::Receiver<FusionSnapshot>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!("Sink worker started");

    while let Some(snapshot) = rx.recv().await {
        metrics.set_queue_len(rx.len());

        let ok = match sink.write(&snapshot).await {
            Ok(()) => {
                metrics.inc_write_count();
                true
            }
            Err(e) => {
                metrics.inc_failure_count();
                error!(tick = snapshot.tick, error = %e, "Sink write failed");
                false
            }
        };
        record_snapshot_dispatched(&name, ok);
    }

    if let Err(e) = sink.flush().await {
        error!(error = %e, "Sink flush failed");
    }
    if let Err(e) = sink.close().await {
        error!(error = %e, "Sink close failed");
    }
    debug!("Sink worker stopped");
}
