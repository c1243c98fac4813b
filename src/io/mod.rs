//! Elevation sources on disk.

mod ascii_grid;

pub use ascii_grid::*;
