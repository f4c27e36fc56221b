//! Activity lifecycle and cadence loop.
//!
//! Every acquisition or analysis function runs as one `Activity` on its own
//! tokio task: `Idle → Running → Stopping → Stopped`. The loop waits for
//! either the next cadence tick or the shared stop signal, runs one
//! iteration, and logs any iteration error or panic without leaving the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, instrument};

use crate::error::FusionError;

/// Lifecycle of one activity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ActivityState {
    Idle = 0,
    Running = 1,
    Stopping = 2,
    Stopped = 3,
}

impl ActivityState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Running,
            2 => Self::Stopping,
            _ => Self::Stopped,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared view of one activity (state plus counters)
#[derive(Debug)]
pub struct ActivityStatus {
    name: &'static str,
    state: AtomicU8,
    iterations: AtomicU64,
    faults: AtomicU64,
}

impl ActivityStatus {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            state: AtomicU8::new(ActivityState::Idle as u8),
            iterations: AtomicU64::new(0),
            faults: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ActivityState {
        ActivityState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }

    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    pub(crate) fn set_state(&self, state: ActivityState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// `Running → Stopping`; any other state is left alone.
    pub(crate) fn begin_stopping(&self) {
        let _ = self.state.compare_exchange(
            ActivityState::Running as u8,
            ActivityState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }
}

/// Marks the activity `Stopped` when the loop future is dropped, whether it
/// returned or was aborted.
struct StoppedOnDrop<'a>(&'a ActivityStatus);

impl Drop for StoppedOnDrop<'_> {
    fn drop(&mut self) {
        self.0.set_state(ActivityState::Stopped);
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}

/// One periodic unit of work
#[trait_variant::make(Activity: Send)]
pub trait LocalActivity {
    /// Activity name (logs, metrics, shutdown report)
    fn name(&self) -> &'static str;

    /// Run one iteration. `iteration` starts at 1.
    async fn iterate(&mut self, iteration: u64) -> Result<(), FusionError>;
}

/// Drive `activity` at `period` until the stop signal is raised.
///
/// The signal is checked at the top of every iteration; an iteration in
/// progress always completes. A panicking iteration counts as a fault.
#[instrument(
    name = "activity_loop",
    skip(activity, status, stop),
    fields(activity = status.name())
)]
pub(crate) async fn run_activity<A>(
    mut activity: A,
    period: Duration,
    status: Arc<ActivityStatus>,
    mut stop: watch::Receiver<bool>,
) where
    A: Activity + Send + 'static,
{
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    status.set_state(ActivityState::Running);
    let _stopped = StoppedOnDrop(&status);
    debug!(period_ms = period.as_millis() as u64, "Activity started");

    let mut iteration = 0u64;
    loop {
        if *stop.borrow() {
            break;
        }
        tokio::select! {
            biased;
            // Err means every sender is gone, which is a stop too
            _ = stop.changed() => break,
            _ = ticker.tick() => {}
        }
        if *stop.borrow() {
            break;
        }

        iteration += 1;
        status.iterations.fetch_add(1, Ordering::Relaxed);
        let outcome = AssertUnwindSafe(activity.iterate(iteration))
            .catch_unwind()
            .await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                status.faults.fetch_add(1, Ordering::Relaxed);
                observability::record_activity_fault(activity.name());
                error!(
                    activity = activity.name(),
                    tick = iteration,
                    error = %e,
                    "Activity iteration failed"
                );
            }
            Err(payload) => {
                status.faults.fetch_add(1, Ordering::Relaxed);
                observability::record_activity_fault(activity.name());
                error!(
                    activity = activity.name(),
                    tick = iteration,
                    panic = panic_message(payload.as_ref()),
                    "Activity iteration panicked"
                );
            }
        }
    }

    debug!(iterations = iteration, "Activity stopped");
}
