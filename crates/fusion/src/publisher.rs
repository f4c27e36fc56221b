//! Non-blocking snapshot hand-off to the dispatcher.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::FusionSnapshot;
use tokio::sync::mpsc;
use tracing::warn;

use crate::error::FusionError;

/// Cloneable sender side of the snapshot queue.
///
/// A full queue drops the snapshot instead of waiting, so a slow sink never
/// stalls an activity.
#[derive(Debug, Clone, Default)]
pub struct SnapshotPublisher {
    tx: Option<mpsc::Sender<FusionSnapshot>>,
    dropped: Arc<AtomicU64>,
}

impl SnapshotPublisher {
    pub fn new(tx: mpsc::Sender<FusionSnapshot>) -> Self {
        Self {
            tx: Some(tx),
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Publisher with no consumer; every snapshot is discarded silently.
    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns `Ok(false)` when the queue was full and the snapshot dropped.
    pub fn publish(&self, snapshot: FusionSnapshot) -> Result<bool, FusionError> {
        let Some(tx) = &self.tx else {
            return Ok(false);
        };
        match tx.try_send(snapshot) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(s)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                observability::record_snapshot_dropped("orchestrator");
                warn!(tick = s.tick, trigger = ?s.trigger, "Snapshot queue full, snapshot dropped");
                Ok(false)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(FusionError::SnapshotChannelClosed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_queue_drops() {
        let (tx, mut rx) = mpsc::channel(1);
        let publisher = SnapshotPublisher::new(tx);
        assert!(publisher.publish(FusionSnapshot::default()).unwrap());
        assert!(!publisher.publish(FusionSnapshot::default()).unwrap());
        assert_eq!(publisher.dropped(), 1);
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_closed_queue_is_an_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let publisher = SnapshotPublisher::new(tx);
        assert!(matches!(
            publisher.publish(FusionSnapshot::default()),
            Err(FusionError::SnapshotChannelClosed)
        ));
    }

    #[test]
    fn test_disconnected_discards() {
        let publisher = SnapshotPublisher::disconnected();
        assert!(!publisher.publish(FusionSnapshot::default()).unwrap());
        assert_eq!(publisher.dropped(), 0);
    }
}
