//! Flood elevation from a percentile of the prepared grid.

use super::ElevationGrid;

/// Compute the `percent`-th percentile of the defined elevations.
///
/// Undefined samples are ignored. Between closest ranks the value is linearly
/// interpolated, with rank `percent / 100 * (n - 1)` over the sorted samples.
pub fn flood_threshold(grid: &ElevationGrid, percent: u8) -> Result<f64, ThresholdError> {
    if !(1..=100).contains(&percent) {
        return Err(ThresholdError::PercentileOutOfRange(percent));
    }

    let mut values: Vec<f64> = grid.defined_values().collect();
    if values.is_empty() {
        return Err(ThresholdError::NoDefinedSamples);
    }
    values.sort_unstable_by(f64::total_cmp);

    Ok(percentile_sorted(&values, f64::from(percent)))
}

/// Linear-interpolated percentile of an ascending, non-empty slice.
fn percentile_sorted(sorted: &[f64], percent: f64) -> f64 {
    let rank = percent / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        return sorted[lo];
    }
    let frac = rank - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Undefined or unattainable flood elevation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ThresholdError {
    #[error("No defined elevation samples to take a percentile of")]
    NoDefinedSamples,
    #[error("Percentile must be within 1-100 (got {0})")]
    PercentileOutOfRange(u8),
    #[error("Flood elevation is undefined (NaN)")]
    Undefined,
}
