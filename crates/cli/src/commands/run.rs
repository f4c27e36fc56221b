//! `run` command implementation.

use anyhow::Result;
use std::time::Duration;
use tracing::{info, warn};

use super::load_blueprint;
use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_survey(args: &RunArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration");

    let mut blueprint = load_blueprint(args.config.as_deref())?;

    // Apply CLI overrides
    if let Some(ref vehicle_id) = args.vehicle_id {
        info!(vehicle_id = %vehicle_id, "Overriding vehicle id from CLI");
        blueprint.vehicle.id = vehicle_id.clone();
        config_loader::ConfigLoader::validate(&blueprint)
            .map_err(|e| CliError::config_validation(e.to_string()))?;
    }

    info!(
        vehicle = %blueprint.vehicle.id,
        analysis_ms = blueprint.cadence.analysis_ms,
        sinks = blueprint.sinks.len(),
        compensation = blueprint.compensation.enabled,
        battery = ?args.battery,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        blueprint,
        duration: (args.duration > 0).then(|| Duration::from_secs(args.duration)),
        seed: args.seed,
        pothole_every: args.pothole_every,
        battery: args.battery_selection(),
    });

    info!("Starting survey...");

    let stats = pipeline.run(shutdown_signal()).await?;
    stats.print_summary();

    if !stats.stuck_activities.is_empty() {
        return Err(CliError::shutdown(format!(
            "activities did not stop in time: {}",
            stats.stuck_activities.join(", ")
        ))
        .into());
    }

    info!("Road Quality survey finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
