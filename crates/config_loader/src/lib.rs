//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Generate `SurveyBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("survey.toml")).unwrap();
//! println!("Vehicle: {}", blueprint.vehicle.id);
//! ```

mod parser;
mod validator;

pub use contracts::SurveyBlueprint;
pub use parser::ConfigFormat;

use contracts::{ContractError, SinkConfig, SinkType};
use std::path::Path;
use tracing::debug;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SurveyBlueprint, ContractError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        let blueprint = Self::load_from_str(&content, format)?;
        debug!(path = %path.display(), ?format, "Configuration loaded");
        Ok(blueprint)
    }

    /// Load configuration from an optional path, falling back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<SurveyBlueprint, ContractError> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => {
                let blueprint = SurveyBlueprint::default();
                validator::validate(&blueprint)?;
                Ok(blueprint)
            }
        }
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SurveyBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Validate an already-built blueprint (e.g. after CLI overrides)
    pub fn validate(blueprint: &SurveyBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Sinks to run when the configuration names none: one log, one alert
    pub fn effective_sinks(blueprint: &SurveyBlueprint) -> Vec<SinkConfig> {
        if blueprint.sinks.is_empty() {
            vec![
                SinkConfig::new("log", SinkType::Log),
                SinkConfig::new("alerts", SinkType::Alert),
            ]
        } else {
            blueprint.sinks.clone()
        }
    }

    /// Serialize SurveyBlueprint to TOML string
    pub fn to_toml(blueprint: &SurveyBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize SurveyBlueprint to JSON string
    pub fn to_json(blueprint: &SurveyBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SurveyBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}
