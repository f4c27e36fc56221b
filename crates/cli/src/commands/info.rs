//! `info` command implementation.

use anyhow::{Context, Result};
use config_loader::ConfigLoader;
use contracts::SurveyBlueprint;
use tracing::info;

use super::load_blueprint;
use crate::cli::InfoArgs;

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = ?args.config, "Loading configuration info");

    let blueprint = effective_blueprint(load_blueprint(args.config.as_deref())?);

    if args.json {
        let json = ConfigLoader::to_json(&blueprint).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint);
    }

    Ok(())
}

/// The blueprint as `run` would execute it
fn effective_blueprint(mut blueprint: SurveyBlueprint) -> SurveyBlueprint {
    blueprint.sinks = ConfigLoader::effective_sinks(&blueprint);
    blueprint
}

fn print_config_info(blueprint: &SurveyBlueprint) {
    println!("Road Quality Configuration ({:?})", blueprint.version);
    println!("Vehicle: {}\n", blueprint.vehicle.id);

    println!("Analyzer");
    println!(
        "   ├─ Band: {}° .. {}°",
        blueprint.analyzer.min_angle_deg, blueprint.analyzer.max_angle_deg
    );
    println!(
        "   ├─ Ground window: ({} mm, {} mm)",
        blueprint.ground.min_distance_mm, blueprint.ground.max_distance_mm
    );
    println!("   ├─ Min valid samples: {}", blueprint.analyzer.min_valid_samples);
    let t = &blueprint.analyzer.thresholds;
    println!(
        "   └─ Thresholds (mm): excellent<{} good<{} fair<{} poor<{}",
        t.excellent, t.good, t.fair, t.poor
    );

    let d = &blueprint.detector;
    println!("\nDetector");
    let bands: Vec<String> = d
        .bands
        .iter()
        .map(|b| format!("[{}°, {}°]", b.from_deg, b.to_deg))
        .collect();
    println!("   ├─ Bands: {}", bands.join(" ∪ "));
    println!("   ├─ Min ground points: {}, max gap: {}", d.min_ground_points, d.max_gap);
    println!(
        "   ├─ Pothole > {} mm (high > {} mm)",
        d.pothole_threshold_mm, d.high_pothole_depth_mm
    );
    println!(
        "   ├─ Bump > {} mm (high > {} mm)",
        d.bump_threshold_mm, d.high_bump_height_mm
    );
    println!("   └─ Crack step > {} mm", d.crack_threshold_mm);

    let c = &blueprint.compensation;
    println!("\nMotion compensation");
    if c.enabled {
        println!(
            "   └─ ±{}° around nadir, {} s sample interval",
            c.band_half_width_deg, c.sample_interval_s
        );
    } else {
        println!("   └─ disabled");
    }

    let cadence = &blueprint.cadence;
    println!("\nCadence (ms)");
    println!(
        "   ├─ scan {} / fix {} / accel {}",
        cadence.scan_ms, cadence.fix_ms, cadence.accel_ms
    );
    println!(
        "   ├─ analysis {} / battery {}",
        cadence.analysis_ms, cadence.battery_ms
    );
    println!(
        "   └─ track every {} / shutdown timeout {}",
        cadence.track_interval_ms, cadence.shutdown_timeout_ms
    );

    println!(
        "\nBattery: low < {}%, re-arm > {}%",
        blueprint.battery.low_pct, blueprint.battery.recover_pct
    );

    println!("\nSinks ({})", blueprint.sinks.len());
    for (i, sink) in blueprint.sinks.iter().enumerate() {
        let is_last = i == blueprint.sinks.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        println!(
            "   {} {} ({:?}, queue {})",
            prefix, sink.name, sink.sink_type, sink.queue_capacity
        );
    }

    println!();
}
