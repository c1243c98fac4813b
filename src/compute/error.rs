//! Error kinds surfaced by the simulation pipeline.

use crate::schema::ConfigError;

use super::{DataError, SessionStatus, ShapeError, ThresholdError};

/// Any failure raised while preparing or advancing a simulation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Threshold error: {0}")]
    Threshold(#[from] ThresholdError),

    #[error("Shape error: {0}")]
    Shape(#[from] ShapeError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cannot {command} while {from:?}")]
    InvalidTransition {
        from: SessionStatus,
        command: &'static str,
    },
}

impl SimError {
    /// Short name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            SimError::Data(_) => "DataError",
            SimError::Threshold(_) => "ThresholdError",
            SimError::Shape(_) => "ShapeError",
            SimError::Config(_) => "ConfigError",
            SimError::InvalidTransition { .. } => "InvalidTransition",
        }
    }
}
