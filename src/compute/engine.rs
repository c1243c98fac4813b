//! Flow simulation engine - constrained ring growth.
//!
//! Each ring grows the flooded mask by one layer of 8-connected neighbours
//! (a binary dilation with a full 3x3 structuring element) and intersects the
//! result with the static constraint `elevation <= threshold`. Cells beyond
//! the grid edge are treated as dry.

use rayon::prelude::*;

use super::{ElevationGrid, ShapeError, SimError, ThresholdError, WaterState};

/// 3x3 structuring element with full 8-connectivity, centre included.
pub const NEIGHBOR_KERNEL: [[bool; 3]; 3] = [[true; 3]; 3];

/// Cells allowed to hold water: defined and at or below the threshold.
pub fn constraint_mask(grid: &ElevationGrid, threshold: f64) -> Vec<bool> {
    grid.as_slice().iter().map(|&e| e <= threshold).collect()
}

/// Grow `flooded ∪ source` by one ring into `out`, keeping only `allowed` cells.
pub fn grow_ring_into(
    flooded: &[bool],
    source: &[bool],
    allowed: &[bool],
    width: usize,
    height: usize,
    out: &mut [bool],
) {
    if width == 0 || height == 0 {
        return;
    }

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, cell) in row.iter_mut().enumerate() {
                *cell = allowed[y * width + x]
                    && touches_water(flooded, source, width, height, x, y);
            }
        });
}

/// Whether any kernel neighbour of (x, y), or (x, y) itself, holds water.
#[inline]
fn touches_water(
    flooded: &[bool],
    source: &[bool],
    width: usize,
    height: usize,
    x: usize,
    y: usize,
) -> bool {
    for (ky, kernel_row) in NEIGHBOR_KERNEL.iter().enumerate() {
        let Some(sy) = (y + ky).checked_sub(1).filter(|&sy| sy < height) else {
            continue;
        };
        for (kx, &active) in kernel_row.iter().enumerate() {
            if !active {
                continue;
            }
            let Some(sx) = (x + kx).checked_sub(1).filter(|&sx| sx < width) else {
                continue;
            };
            let idx = sy * width + sx;
            if flooded[idx] || source[idx] {
                return true;
            }
        }
    }
    false
}

/// Flood engine bound to one prepared grid and threshold.
///
/// The constraint mask and ring buffer are allocated once and reused for
/// every frame.
pub struct FloodEngine {
    width: usize,
    height: usize,
    threshold: f64,
    /// Cells that may hold water (`elevation <= threshold`).
    allowed: Vec<bool>,
    /// Pre-allocated output buffer for one ring (reused each ring).
    next: Vec<bool>,
}

impl FloodEngine {
    /// Create an engine for `grid` at flood elevation `threshold`.
    pub fn new(grid: &ElevationGrid, threshold: f64) -> Result<Self, ThresholdError> {
        if threshold.is_nan() {
            return Err(ThresholdError::Undefined);
        }

        Ok(Self {
            width: grid.width(),
            height: grid.height(),
            threshold,
            allowed: constraint_mask(grid, threshold),
            next: vec![false; grid.len()],
        })
    }

    /// Flood elevation this engine constrains growth to.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Grid dimensions as `(width, height)`.
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Whether the cell at (x, y) may hold water.
    #[inline]
    pub fn is_allowed(&self, x: usize, y: usize) -> bool {
        self.allowed[y * self.width + x]
    }

    /// Advance `state` by `flow_speed` rings and return the state it had before.
    ///
    /// The dimension check happens before any mutation, so a failed call
    /// leaves `state` untouched. `flow_speed == 0` is a no-op.
    pub fn advance(
        &mut self,
        state: &mut WaterState,
        flow_speed: u32,
    ) -> Result<WaterState, ShapeError> {
        if state.dims() != self.dims() {
            return Err(ShapeError {
                expected: self.dims(),
                found: state.dims(),
            });
        }

        let previous = state.clone();

        for _ in 0..flow_speed {
            grow_ring_into(
                state.flooded(),
                state.source(),
                &self.allowed,
                self.width,
                self.height,
                &mut self.next,
            );
            std::mem::swap(state.flooded_mut(), &mut self.next);

            // Fixed point: further rings cannot change anything.
            if self.next.as_slice() == state.flooded() {
                break;
            }
        }

        Ok(previous)
    }

    /// Run `frames` advances, discarding the intermediate states.
    pub fn run(
        &mut self,
        state: &mut WaterState,
        flow_speed: u32,
        frames: u64,
    ) -> Result<(), ShapeError> {
        for _ in 0..frames {
            self.advance(state, flow_speed)?;
        }
        Ok(())
    }
}

/// Advance `state` by `flow_speed` rings against `grid` and `threshold`.
///
/// Convenience over [`FloodEngine`] for one-off frames; returns the previous
/// state for metrics.
pub fn advance(
    state: &mut WaterState,
    grid: &ElevationGrid,
    threshold: f64,
    flow_speed: u32,
) -> Result<WaterState, SimError> {
    grid.check_dims(state.dims())?;
    let mut engine = FloodEngine::new(grid, threshold)?;
    Ok(engine.advance(state, flow_speed)?)
}
