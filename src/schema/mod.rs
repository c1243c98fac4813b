//! Schema module - Configuration and terrain types for flood simulations.

mod config;
mod terrain;

pub use config::*;
pub use terrain::*;
