//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::SurveyBlueprint;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    vehicle: String,
    analyzer_band_deg: (f64, f64),
    detector_band_count: usize,
    analysis_ms: u64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    vehicle: blueprint.vehicle.id.clone(),
                    analyzer_band_deg: (
                        blueprint.analyzer.min_angle_deg,
                        blueprint.analyzer.max_angle_deg,
                    ),
                    detector_band_count: blueprint.detector.bands.len(),
                    analysis_ms: blueprint.cadence.analysis_ms,
                    sink_count: blueprint.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &SurveyBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();

    if blueprint.sinks.is_empty() {
        warnings.push("No sinks configured - default log and alert sinks will be used".to_string());
    }

    if !blueprint.compensation.enabled {
        warnings.push("Motion compensation is disabled".to_string());
    }

    if blueprint.detector.min_ground_points < blueprint.analyzer.min_valid_samples {
        warnings.push(format!(
            "detector.min_ground_points ({}) is below analyzer.min_valid_samples ({})",
            blueprint.detector.min_ground_points, blueprint.analyzer.min_valid_samples
        ));
    }

    if blueprint.cadence.analysis_ms < blueprint.cadence.scan_ms {
        warnings.push(format!(
            "Analysis ({} ms) runs faster than scan acquisition ({} ms)",
            blueprint.cadence.analysis_ms, blueprint.cadence.scan_ms
        ));
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Vehicle: {}", summary.vehicle);
            println!(
                "  Analyzer band: {}° .. {}°",
                summary.analyzer_band_deg.0, summary.analyzer_band_deg.1
            );
            println!("  Detector bands: {}", summary.detector_band_count);
            println!("  Analysis period: {} ms", summary.analysis_ms);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
