//! Analysis error types

use thiserror::Error;

/// Faults raised inside an analysis stage
///
/// These never leave the analyzer/detector boundary; callers see an
/// `Error` quality class instead.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Non-finite intermediate value
    #[error("{stage}: non-finite {quantity} ({value})")]
    NonFinite {
        stage: &'static str,
        quantity: &'static str,
        value: f64,
    },

    /// Statistic requested over no values
    #[error("{stage}: empty input")]
    EmptyInput { stage: &'static str },

    /// Mean distance that cannot be used as a divisor
    #[error("{stage}: degenerate mean distance {mean}")]
    DegenerateMean { stage: &'static str, mean: f64 },
}

impl AnalysisError {
    pub fn non_finite(stage: &'static str, quantity: &'static str, value: f64) -> Self {
        Self::NonFinite {
            stage,
            quantity,
            value,
        }
    }

    /// Check a value and turn NaN/inf into an error
    pub fn ensure_finite(
        stage: &'static str,
        quantity: &'static str,
        value: f64,
    ) -> Result<f64, Self> {
        if value.is_finite() {
            Ok(value)
        } else {
            Err(Self::non_finite(stage, quantity, value))
        }
    }
}

impl From<AnalysisError> for contracts::ContractError {
    fn from(err: AnalysisError) -> Self {
        let stage = match &err {
            AnalysisError::NonFinite { stage, .. }
            | AnalysisError::EmptyInput { stage }
            | AnalysisError::DegenerateMean { stage, .. } => *stage,
        };
        contracts::ContractError::analysis(stage, err.to_string())
    }
}
