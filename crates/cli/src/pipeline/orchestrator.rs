//! Survey pipeline - wires sources, fusion core, statistics and sinks.
//!
//! Scan, fix and accelerometer are simulated; the battery is simulated,
//! read from sysfs, or absent.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chrono::Utc;
use config_loader::ConfigLoader;
use contracts::{BatterySource, BatteryStatus, FusionSnapshot, SurveyBlueprint};
use fusion::{FusionError, FusionSources, Orchestrator, StateStore};
use ingestion::{
    SimulatedAccelSource, SimulatedBattery, SimulatedFixSource, SimulatedScanConfig,
    SimulatedScanSource, SysfsBattery,
};
use observability::{record_snapshot_metrics, SurveyStatsAggregator};
use tokio::sync::mpsc;
use tracing::{info, instrument, warn};

use super::PipelineStats;
use crate::error::CliError;

/// Upper bound for draining statistics and sink queues after shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Where battery status comes from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BatterySelection {
    /// Linear drain model
    #[default]
    Simulated,
    /// `power_supply` directory, e.g. `/sys/class/power_supply/battery`
    Sysfs(PathBuf),
    /// No battery; the watchdog is not started
    None,
}

/// Battery source picked at startup
enum PipelineBattery {
    Simulated(SimulatedBattery),
    Sysfs(SysfsBattery),
}

impl PipelineBattery {
    async fn resolve(selection: &BatterySelection) -> Option<Self> {
        match selection {
            BatterySelection::Simulated => Some(Self::Simulated(SimulatedBattery::new())),
            BatterySelection::Sysfs(dir) => match SysfsBattery::detect(dir).await {
                Some(battery) => {
                    info!(path = %dir.display(), "Reading battery from sysfs");
                    Some(Self::Sysfs(battery))
                }
                None => {
                    warn!(path = %dir.display(), "No sysfs battery found, running without battery watchdog");
                    None
                }
            },
            BatterySelection::None => None,
        }
    }
}

impl BatterySource for PipelineBattery {
    fn name(&self) -> &str {
        match self {
            Self::Simulated(b) => b.name(),
            Self::Sysfs(b) => b.name(),
        }
    }

    async fn status(&mut self) -> BatteryStatus {
        match self {
            Self::Simulated(b) => b.status().await,
            Self::Sysfs(b) => b.status().await,
        }
    }
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// The survey blueprint, CLI overrides applied
    pub blueprint: SurveyBlueprint,

    /// Stop after this long (None = until the shutdown signal)
    pub duration: Option<Duration>,

    /// Seed for the simulated sources
    pub seed: u64,

    /// Inject a simulated pothole every N scans
    pub pothole_every: Option<u64>,

    /// Battery source
    pub battery: BatterySelection,
}

/// Main survey pipeline
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Calibrate, run until `shutdown` resolves or the duration elapses,
    /// then stop every activity within the configured timeout.
    #[instrument(name = "pipeline_run", skip(self, shutdown), fields(vehicle = %self.config.blueprint.vehicle.id))]
    pub async fn run<F>(self, shutdown: F) -> Result<PipelineStats>
    where
        F: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let blueprint = &self.config.blueprint;
        let session_id = format!(
            "{}-{}",
            blueprint.vehicle.id,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        let store = Arc::new(StateStore::new(session_id.clone(), &blueprint.history));

        // Setup Dispatcher
        let queue = blueprint.history.snapshot_queue;
        let (snapshot_tx, snapshot_rx) = mpsc::channel::<FusionSnapshot>(queue);
        let (dispatch_tx, dispatch_rx) = mpsc::channel::<FusionSnapshot>(queue);

        if blueprint.sinks.is_empty() {
            info!("No sinks configured, using default log and alert sinks");
        }
        let dispatcher = dispatcher::create_dispatcher(ConfigLoader::effective_sinks(blueprint), dispatch_rx)
            .await
            .context("Failed to create dispatcher")?;
        let sink_metrics = dispatcher.sink_metrics();
        let dispatcher_handle = dispatcher.spawn();
        let stats_task = tokio::spawn(aggregate(snapshot_rx, dispatch_tx));

        info!(sinks = sink_metrics.len(), "Dispatcher started");

        // Setup fusion core
        let battery = PipelineBattery::resolve(&self.config.battery).await;
        let sources = FusionSources {
            scan: SimulatedScanSource::new(SimulatedScanConfig {
                seed: self.config.seed,
                pothole_every: self.config.pothole_every,
                ..Default::default()
            }),
            fix: SimulatedFixSource::default(),
            accel: SimulatedAccelSource::new(self.config.seed.wrapping_add(1), 1.0, 0.02),
            battery,
        };

        let mut orchestrator =
            Orchestrator::new(blueprint, Arc::clone(&store), sources).with_output(snapshot_tx);

        info!("Calibrating, keep the vehicle stationary...");
        let calibration = orchestrator
            .calibrate()
            .await
            .map_err(|e| CliError::calibration(e.to_string()))?;

        let handle = orchestrator.start().context("Failed to start orchestrator")?;
        // The handle keeps its own output sender
        drop(orchestrator);

        info!(
            session = %session_id,
            duration_secs = self.config.duration.map(|d| d.as_secs()),
            pothole_every = self.config.pothole_every,
            "Survey running"
        );

        let until_elapsed = async {
            match self.config.duration {
                Some(duration) => tokio::time::sleep(duration).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = shutdown => {
                warn!("Received shutdown signal, stopping survey...");
            }
            _ = until_elapsed => {
                info!("Survey duration elapsed");
            }
        }

        // Shutdown
        let snapshots_dropped = handle.dropped_snapshots();
        let activities = handle.activity_counters();
        let stuck_activities = match handle.shutdown(blueprint.cadence.shutdown_timeout()).await {
            Ok(()) => Vec::new(),
            Err(FusionError::ShutdownTimeout { activities, .. }) => activities,
            Err(e) => return Err(e).context("Orchestrator shutdown failed"),
        };

        let survey = match tokio::time::timeout(DRAIN_TIMEOUT, stats_task).await {
            Ok(Ok(survey)) => survey,
            Ok(Err(e)) => {
                warn!(error = %e, "Statistics task failed");
                SurveyStatsAggregator::default()
            }
            Err(_) => {
                warn!("Statistics task did not drain in time");
                SurveyStatsAggregator::default()
            }
        };

        // Wait for dispatcher to flush
        if tokio::time::timeout(DRAIN_TIMEOUT, dispatcher_handle)
            .await
            .is_err()
        {
            warn!("Dispatcher did not drain in time");
        }

        let stats = PipelineStats {
            session_id,
            duration: start_time.elapsed(),
            calibration: Some(calibration),
            last_tick: store.tick(),
            snapshots_dropped,
            activities,
            sinks: sink_metrics
                .into_iter()
                .map(|(name, metrics)| (name, metrics.snapshot()))
                .collect(),
            stuck_activities,
            survey,
        };

        info!(
            duration_secs = stats.duration.as_secs_f64(),
            snapshots = stats.survey.total_snapshots,
            faults = stats.total_faults(),
            "Survey shutdown complete"
        );

        Ok(stats)
    }
}

/// Feed every snapshot into the statistics and Prometheus, then on to the
/// dispatcher. Ends when every fusion-side sender is gone.
async fn aggregate(
    mut rx: mpsc::Receiver<FusionSnapshot>,
    tx: mpsc::Sender<FusionSnapshot>,
) -> SurveyStatsAggregator {
    let mut survey = SurveyStatsAggregator::new();
    while let Some(snapshot) = rx.recv().await {
        record_snapshot_metrics(&snapshot);
        survey.update(&snapshot);
        if tx.send(snapshot).await.is_err() {
            warn!("Dispatcher channel closed");
            break;
        }
    }
    survey
}
