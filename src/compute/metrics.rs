//! Hydrological metrics derived from consecutive water states.

use serde::{Deserialize, Serialize};

use super::{ElevationGrid, ShapeError, WaterState};

/// Guards the velocity proxy against an empty previous state.
pub const VELOCITY_EPSILON: f64 = 1e-6;

/// Metrics for one frame transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsFrame {
    /// Index of the frame these metrics describe (1 for the first advance).
    pub frame: u64,
    /// Flooded cells in the new state.
    pub flooded_cells: usize,
    /// Cells whose flooded flag changed during the transition.
    pub changed_cells: usize,
    /// Flooded cells times cell area.
    pub coverage_area: f64,
    /// Sum of per-cell depth times cell area.
    pub volume: f64,
    /// Deepest flooded cell, 0 when nothing is flooded.
    pub max_depth: f64,
    /// Relative change proxy: changed cells * flow speed / previous flooded cells.
    pub velocity_estimate: f64,
}

impl MetricsFrame {
    /// Compute metrics for the transition `previous -> current`.
    ///
    /// Only the flooded planes enter the formulas; source cells are ignored.
    /// Per-cell depth is `max(0, threshold - elevation)` on flooded cells.
    pub fn compute(
        frame: u64,
        previous: &WaterState,
        current: &WaterState,
        grid: &ElevationGrid,
        threshold: f64,
        cell_area: f64,
        flow_speed: u32,
    ) -> Result<Self, ShapeError> {
        grid.check_dims(previous.dims())?;
        grid.check_dims(current.dims())?;

        let flooded_cells = current.flooded_count();
        let coverage_area = flooded_cells as f64 * cell_area;

        let mut depth_sum = 0.0f64;
        let mut max_depth = 0.0f64;
        for (&flooded, &elevation) in current.flooded().iter().zip(grid.as_slice()) {
            if !flooded {
                continue;
            }
            let depth = cell_depth(elevation, threshold);
            depth_sum += depth;
            max_depth = max_depth.max(depth);
        }
        let volume = depth_sum * cell_area;

        let changed_cells = current.changed_cells(previous);
        let velocity_estimate = changed_cells as f64 * f64::from(flow_speed)
            / (previous.flooded_count() as f64 + VELOCITY_EPSILON);

        Ok(Self {
            frame,
            flooded_cells,
            changed_cells,
            coverage_area,
            volume,
            max_depth,
            velocity_estimate,
        })
    }

    /// Whether the transition changed no cells.
    pub fn is_steady(&self) -> bool {
        self.changed_cells == 0
    }
}

/// Water depth proxy for one flooded cell. Never negative; undefined cells
/// contribute nothing.
#[inline]
pub fn cell_depth(elevation: f64, threshold: f64) -> f64 {
    let depth = threshold - elevation;
    if depth > 0.0 { depth } else { 0.0 }
}

/// Aggregate over a run of metrics frames.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub frames: usize,
    pub final_coverage_area: f64,
    pub final_volume: f64,
    pub peak_max_depth: f64,
    pub peak_velocity: f64,
    pub mean_velocity: f64,
}

impl MetricsSummary {
    /// Summarize a frame-ordered history.
    pub fn from_history(history: &[MetricsFrame]) -> Self {
        let Some(last) = history.last() else {
            return Self::default();
        };

        let peak_max_depth = history.iter().map(|m| m.max_depth).fold(0.0, f64::max);
        let peak_velocity = history
            .iter()
            .map(|m| m.velocity_estimate)
            .fold(0.0, f64::max);
        let mean_velocity =
            history.iter().map(|m| m.velocity_estimate).sum::<f64>() / history.len() as f64;

        Self {
            frames: history.len(),
            final_coverage_area: last.coverage_area,
            final_volume: last.volume,
            peak_max_depth,
            peak_velocity,
            mean_velocity,
        }
    }
}
