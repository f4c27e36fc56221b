//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_survey;
pub use validate::run_validate;

use std::path::Path;

use anyhow::{Context, Result};
use contracts::SurveyBlueprint;

use crate::error::CliError;

/// Load the blueprint from `path`, or the built-in defaults when absent
pub(crate) fn load_blueprint(path: Option<&Path>) -> Result<SurveyBlueprint> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path.display().to_string()).into());
        }
    }
    config_loader::ConfigLoader::load_or_default(path).with_context(|| match path {
        Some(path) => format!("Failed to load config from {}", path.display()),
        None => "Built-in defaults failed validation".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_defaults_without_path() {
        let blueprint = load_blueprint(None).unwrap();
        assert_eq!(blueprint.analyzer.min_valid_samples, 10);
    }

    #[test]
    fn test_missing_file() {
        let err = load_blueprint(Some(Path::new("/nonexistent/survey.toml"))).unwrap_err();
        assert!(err.downcast_ref::<CliError>().is_some());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[vehicle]\nid = \"van-7\"").unwrap();
        let blueprint = load_blueprint(Some(file.path())).unwrap();
        assert_eq!(blueprint.vehicle.id, "van-7");
    }
}
