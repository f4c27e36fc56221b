//! Fusion Orchestrator
//!
//! Owns the sources until `start()`, then hands each one to its own
//! activity task. The returned handle raises the shared stop signal and
//! waits for every activity with a bounded timeout.

use std::sync::Arc;
use std::time::Duration;

use analysis::AnalysisSuite;
use contracts::{
    AccelSource, BatteryConfig, BatterySource, BatteryStatus, CadenceConfig, CalibrationBaseline,
    CalibrationConfig, FixSource, FusionSnapshot, ScanSource, SurveyBlueprint,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use crate::activity::{run_activity, Activity, ActivityState, ActivityStatus};
use crate::analyze::AnalysisActivity;
use crate::battery::BatteryWatchdog;
use crate::calibration::Calibrator;
use crate::error::{FusionError, Result};
use crate::ingest::{AccelIngestion, FixIngestion, ScanIngestion};
use crate::publisher::SnapshotPublisher;
use crate::store::StateStore;

/// Battery source placeholder for rigs without one.
///
/// Uninhabited: `FusionSources::new` fills the battery slot with `None`.
pub enum NoBattery {}

impl BatterySource for NoBattery {
    fn name(&self) -> &str {
        match *self {}
    }

    async fn status(&mut self) -> BatteryStatus {
        match *self {}
    }
}

/// The acquisition sources one orchestrator consumes
pub struct FusionSources<S, F, A, B = NoBattery> {
    pub scan: S,
    pub fix: F,
    pub accel: A,
    pub battery: Option<B>,
}

impl<S, F, A> FusionSources<S, F, A, NoBattery> {
    pub fn new(scan: S, fix: F, accel: A) -> Self {
        Self {
            scan,
            fix,
            accel,
            battery: None,
        }
    }
}

impl<S, F, A, B> FusionSources<S, F, A, B> {
    pub fn with_battery<B2>(self, battery: B2) -> FusionSources<S, F, A, B2> {
        FusionSources {
            scan: self.scan,
            fix: self.fix,
            accel: self.accel,
            battery: Some(battery),
        }
    }
}

/// Single-use orchestrator
pub struct Orchestrator<S, F, A, B = NoBattery> {
    store: Arc<StateStore>,
    suite: AnalysisSuite,
    cadence: CadenceConfig,
    battery_config: BatteryConfig,
    calibration_config: CalibrationConfig,
    publisher: SnapshotPublisher,
    sources: Option<FusionSources<S, F, A, B>>,
}

impl<S, F, A, B> Orchestrator<S, F, A, B>
where
    S: ScanSource + Send + 'static,
    F: FixSource + Send + 'static,
    A: AccelSource + Send + 'static,
    B: BatterySource + Send + 'static,
{
    pub fn new(
        blueprint: &SurveyBlueprint,
        store: Arc<StateStore>,
        sources: FusionSources<S, F, A, B>,
    ) -> Self {
        Self {
            store,
            suite: AnalysisSuite::from_blueprint(blueprint),
            cadence: blueprint.cadence,
            battery_config: blueprint.battery,
            calibration_config: blueprint.calibration,
            publisher: SnapshotPublisher::disconnected(),
            sources: Some(sources),
        }
    }

    /// Send snapshots to `tx` (bounded; full queue drops)
    pub fn with_output(mut self, tx: mpsc::Sender<FusionSnapshot>) -> Self {
        self.publisher = SnapshotPublisher::new(tx);
        self
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Stationary calibration; installs the baseline in the store.
    ///
    /// Must run before `start()`. Calling it again recalibrates and
    /// replaces the baseline.
    pub async fn calibrate(&mut self) -> Result<CalibrationBaseline> {
        let sources = self.sources.as_mut().ok_or(FusionError::AlreadyStarted)?;
        let baseline = Calibrator::new(self.calibration_config)
            .calibrate(&mut sources.scan, &mut sources.accel)
            .await?;
        self.store.update_calibration(baseline);
        Ok(baseline)
    }

    /// Spawn every activity on the current tokio runtime.
    ///
    /// A second call fails with `AlreadyStarted`.
    #[instrument(name = "orchestrator_start", skip(self), fields(session = %self.store.session_id()))]
    pub fn start(&mut self) -> Result<OrchestratorHandle> {
        let sources = self.sources.take().ok_or(FusionError::AlreadyStarted)?;
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut activities = Vec::with_capacity(5);
        let store = &self.store;

        if store.calibration().is_none() {
            warn!("Starting without calibration, motion compensation disabled");
        }

        activities.push(spawn(
            ScanIngestion::new(sources.scan, Arc::clone(store)),
            self.cadence.scan(),
            &stop_rx,
        ));
        activities.push(spawn(
            FixIngestion::new(
                sources.fix,
                Arc::clone(store),
                self.publisher.clone(),
                self.cadence.track_interval(),
            ),
            self.cadence.fix(),
            &stop_rx,
        ));
        activities.push(spawn(
            AccelIngestion::new(sources.accel, Arc::clone(store)),
            self.cadence.accel(),
            &stop_rx,
        ));
        activities.push(spawn(
            AnalysisActivity::new(self.suite.clone(), Arc::clone(store), self.publisher.clone()),
            self.cadence.analysis(),
            &stop_rx,
        ));
        match sources.battery {
            Some(battery) => activities.push(spawn(
                BatteryWatchdog::new(battery, Arc::clone(store), &self.battery_config),
                self.cadence.battery(),
                &stop_rx,
            )),
            None => info!("No battery source, watchdog disabled"),
        }

        info!(
            activities = activities.len(),
            scan_ms = self.cadence.scan_ms,
            analysis_ms = self.cadence.analysis_ms,
            "Orchestrator started"
        );

        Ok(OrchestratorHandle {
            store: Arc::clone(store),
            publisher: self.publisher.clone(),
            stop_tx,
            activities,
        })
    }
}

struct RunningActivity {
    status: Arc<ActivityStatus>,
    task: JoinHandle<()>,
}

fn spawn<T>(activity: T, period: Duration, stop_rx: &watch::Receiver<bool>) -> RunningActivity
where
    T: Activity + Send + 'static,
{
    let status = Arc::new(ActivityStatus::new(activity.name()));
    let task = tokio::spawn(run_activity(
        activity,
        period,
        Arc::clone(&status),
        stop_rx.clone(),
    ));
    RunningActivity { status, task }
}

/// Handle to a started orchestrator
pub struct OrchestratorHandle {
    store: Arc<StateStore>,
    publisher: SnapshotPublisher,
    stop_tx: watch::Sender<bool>,
    activities: Vec<RunningActivity>,
}

impl OrchestratorHandle {
    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// Snapshots dropped because the output queue was full
    pub fn dropped_snapshots(&self) -> u64 {
        self.publisher.dropped()
    }

    /// Current state of every activity, in start order
    pub fn states(&self) -> Vec<(&'static str, ActivityState)> {
        self.activities
            .iter()
            .map(|a| (a.status.name(), a.status.state()))
            .collect()
    }

    /// Per-activity `(name, iterations, faults)`
    pub fn activity_counters(&self) -> Vec<(&'static str, u64, u64)> {
        self.activities
            .iter()
            .map(|a| (a.status.name(), a.status.iterations(), a.status.faults()))
            .collect()
    }

    /// Raise the stop signal and wait up to `timeout` for every activity.
    ///
    /// Activities still running at the deadline are aborted and reported
    /// in `FusionError::ShutdownTimeout`.
    #[instrument(name = "orchestrator_shutdown", skip(self), fields(timeout_ms = timeout.as_millis() as u64))]
    pub async fn shutdown(self, timeout: Duration) -> Result<()> {
        for activity in &self.activities {
            activity.status.begin_stopping();
        }
        // Err only when every loop already exited
        let _ = self.stop_tx.send(true);

        let deadline = tokio::time::Instant::now() + timeout;
        let mut still_running = Vec::new();
        for RunningActivity { status, mut task } in self.activities {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    status.set_state(ActivityState::Stopped);
                    error!(activity = status.name(), error = %e, "Activity task panicked");
                }
                Err(_) => {
                    task.abort();
                    still_running.push(status.name().to_string());
                }
            }
        }

        if still_running.is_empty() {
            info!(tick = self.store.tick(), "Orchestrator stopped");
            Ok(())
        } else {
            error!(activities = ?still_running, "Activities did not stop in time");
            Err(FusionError::ShutdownTimeout {
                timeout_ms: timeout.as_millis() as u64,
                activities: still_running,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{AccelSample, GpsFix, HistoryConfig, ScanFrame, SnapshotTrigger};
    use ingestion::{
        SimulatedAccelSource, SimulatedBattery, SimulatedFixSource, SimulatedScanConfig,
        SimulatedScanSource,
    };

    fn fast_blueprint() -> SurveyBlueprint {
        let mut bp = SurveyBlueprint::default();
        bp.cadence.scan_ms = 5;
        bp.cadence.fix_ms = 5;
        bp.cadence.accel_ms = 5;
        bp.cadence.analysis_ms = 10;
        bp.cadence.battery_ms = 10;
        bp.cadence.track_interval_ms = 20;
        bp.calibration.accel_samples = 3;
        bp.calibration.accel_interval_ms = 1;
        bp.calibration.scan_samples = 2;
        bp.calibration.scan_interval_ms = 1;
        bp
    }

    fn simulated() -> FusionSources<SimulatedScanSource, SimulatedFixSource, SimulatedAccelSource>
    {
        FusionSources::new(
            SimulatedScanSource::new(SimulatedScanConfig::default()),
            SimulatedFixSource::default(),
            SimulatedAccelSource::default(),
        )
    }

    fn store(bp: &SurveyBlueprint) -> Arc<StateStore> {
        Arc::new(StateStore::new("test", &bp.history))
    }

    #[tokio::test]
    async fn test_run_and_shutdown() {
        let bp = fast_blueprint();
        let (tx, mut rx) = mpsc::channel(256);
        let mut orchestrator = Orchestrator::new(&bp, store(&bp), simulated().with_battery(SimulatedBattery::new()))
            .with_output(tx);

        let baseline = orchestrator.calibrate().await.unwrap();
        assert!((baseline.ground_distance_baseline_mm - 300.0).abs() <= 1.0);

        let handle = orchestrator.start().unwrap();
        assert!(matches!(orchestrator.start(), Err(FusionError::AlreadyStarted)));
        assert!(matches!(orchestrator.calibrate().await, Err(FusionError::AlreadyStarted)));

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(handle.states().len(), 5);
        assert!(handle
            .states()
            .iter()
            .all(|(_, s)| *s == ActivityState::Running));

        let store = Arc::clone(handle.store());
        handle.shutdown(Duration::from_secs(1)).await.unwrap();

        assert!(store.tick() > 0);
        assert!(store.gps().is_some());
        assert!(store.calibration().is_some());

        let mut analysis = 0;
        let mut track = 0;
        while let Ok(snap) = rx.try_recv() {
            match snap.trigger {
                SnapshotTrigger::Analysis => analysis += 1,
                SnapshotTrigger::Track => track += 1,
            }
            assert_eq!(snap.session_id, "test");
        }
        assert!(analysis > 0);
        assert!(track > 0);
    }

    #[tokio::test]
    async fn test_no_battery_runs_four_activities() {
        let bp = fast_blueprint();
        let mut orchestrator = Orchestrator::new(&bp, store(&bp), simulated());
        let handle = orchestrator.start().unwrap();
        let names: Vec<_> = handle.states().iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["scan", "fix", "accel", "analysis"]);
        handle.shutdown(Duration::from_secs(1)).await.unwrap();
    }

    /// Scan source that never returns once asked
    struct Wedged;

    impl ScanSource for Wedged {
        fn name(&self) -> &str {
            "wedged"
        }

        async fn next_frame(&mut self) -> ScanFrame {
            std::future::pending().await
        }
    }

    struct NoFix;

    impl FixSource for NoFix {
        fn name(&self) -> &str {
            "nofix"
        }

        async fn next_fix(&mut self) -> Option<GpsFix> {
            None
        }
    }

    struct Flat;

    impl AccelSource for Flat {
        fn name(&self) -> &str {
            "flat"
        }

        async fn next_sample(&mut self) -> Option<AccelSample> {
            Some(AccelSample::new(1.0))
        }
    }

    #[tokio::test]
    async fn test_shutdown_timeout_names_wedged_activity() {
        let bp = fast_blueprint();
        let mut orchestrator = Orchestrator::new(
            &bp,
            Arc::new(StateStore::new("t", &HistoryConfig::default())),
            FusionSources::new(Wedged, NoFix, Flat),
        );
        let handle = orchestrator.start().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let err = handle
            .shutdown(Duration::from_millis(100))
            .await
            .unwrap_err();
        match err {
            FusionError::ShutdownTimeout { activities, .. } => {
                assert_eq!(activities, vec!["scan".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
