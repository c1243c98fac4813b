//! Initial water state from the flood elevation.

use crate::schema::SeedPolicy;

use super::{ElevationGrid, ThresholdError, WaterState};

/// Seed the water state: every cell with `elevation >= threshold` is a seed.
///
/// Under [`SeedPolicy::Source`], seeds exactly at the threshold are flooded
/// and seeds above it become source cells. Under [`SeedPolicy::Transient`]
/// every seed is flooded. Undefined cells never seed.
pub fn seed_water(
    grid: &ElevationGrid,
    threshold: f64,
    policy: SeedPolicy,
) -> Result<WaterState, ThresholdError> {
    if threshold.is_nan() {
        return Err(ThresholdError::Undefined);
    }

    let len = grid.len();
    let mut flooded = vec![false; len];
    let mut source = vec![false; len];

    for (i, &elevation) in grid.as_slice().iter().enumerate() {
        if elevation.is_nan() || elevation < threshold {
            continue;
        }
        match policy {
            SeedPolicy::Source if elevation > threshold => source[i] = true,
            _ => flooded[i] = true,
        }
    }

    Ok(WaterState::from_parts(
        grid.width(),
        grid.height(),
        flooded,
        source,
    ))
}
