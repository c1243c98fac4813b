//! Compute module - Flood propagation over prepared elevation grids.

mod controller;
mod engine;
mod error;
mod grid;
mod metrics;
mod prepare;
mod seed;
mod sink;
mod threshold;

pub use controller::*;
pub use engine::*;
pub use error::*;
pub use grid::*;
pub use metrics::*;
pub use prepare::*;
pub use seed::*;
pub use sink::*;
pub use threshold::*;
