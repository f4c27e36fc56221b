//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::BatterySelection;

/// Road Quality - vehicle-mounted road surface survey
#[derive(Parser, Debug)]
#[command(
    name = "road-quality",
    author,
    version,
    about = "Road surface quality survey from scanner, GPS and accelerometer fusion",
    long_about = "Fuses a downward ranging scanner, a GPS receiver and a vertical \n\
                  accelerometer into a continuous road quality score and discrete \n\
                  hazard events (potholes, bumps, cracks), dispatched to configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "ROAD_QUALITY_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "ROAD_QUALITY_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Default filter when `RUST_LOG` is unset
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Calibrate, then run the survey until interrupted or the duration elapses
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display the effective configuration
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "ROAD_QUALITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Survey duration in seconds (0 = until Ctrl+C)
    #[arg(long, default_value = "0", env = "ROAD_QUALITY_DURATION")]
    pub duration: u64,

    /// Seed for the simulated sources
    #[arg(long, default_value = "7", env = "ROAD_QUALITY_SEED")]
    pub seed: u64,

    /// Prometheus metrics port (disabled when omitted)
    #[arg(long, env = "ROAD_QUALITY_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Inject a simulated pothole every N scans
    #[arg(long, env = "ROAD_QUALITY_POTHOLE_EVERY", value_parser = clap::value_parser!(u64).range(1..))]
    pub pothole_every: Option<u64>,

    /// Override the vehicle id from configuration
    #[arg(long, env = "ROAD_QUALITY_VEHICLE_ID")]
    pub vehicle_id: Option<String>,

    /// Battery status source
    #[arg(long, value_enum, default_value = "simulated", env = "ROAD_QUALITY_BATTERY")]
    pub battery: BatteryKind,

    /// `power_supply` directory read by `--battery sysfs`
    #[arg(long, default_value = ingestion::DEFAULT_SYSFS_PATH, env = "ROAD_QUALITY_BATTERY_SYSFS")]
    pub battery_sysfs: PathBuf,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn battery_selection(&self) -> BatterySelection {
        match self.battery {
            BatteryKind::Simulated => BatterySelection::Simulated,
            BatteryKind::Sysfs => BatterySelection::Sysfs(self.battery_sysfs.clone()),
            BatteryKind::None => BatterySelection::None,
        }
    }
}

/// Battery status source
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatteryKind {
    /// Linear drain model
    #[default]
    Simulated,
    /// Linux sysfs `power_supply` class
    Sysfs,
    /// No battery, watchdog disabled
    None,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "survey.toml", env = "ROAD_QUALITY_CONFIG")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file; built-in defaults when omitted
    #[arg(short, long, env = "ROAD_QUALITY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}
