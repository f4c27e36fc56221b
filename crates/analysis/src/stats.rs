//! Plain statistics over distance slices.

use crate::error::AnalysisError;

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population variance (divides by n).
pub fn population_variance(values: &[f64], mean: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Some(sum_sq / values.len() as f64)
}

/// Median; averages the two middle values for even lengths.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Mean and population variance, rejecting empty or non-finite results.
pub fn mean_and_variance(
    stage: &'static str,
    values: &[f64],
) -> Result<(f64, f64), AnalysisError> {
    let mean = mean(values).ok_or(AnalysisError::EmptyInput { stage })?;
    let mean = AnalysisError::ensure_finite(stage, "mean", mean)?;
    let variance =
        population_variance(values, mean).ok_or(AnalysisError::EmptyInput { stage })?;
    let variance = AnalysisError::ensure_finite(stage, "variance", variance)?;
    Ok((mean, variance))
}
