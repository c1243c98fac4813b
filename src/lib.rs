//! GLOF Sim - Glacial lake outburst flood propagation over elevation grids.
//!
//! A constrained morphological flood fill: water starts from the cells at or
//! above a percentile elevation threshold and grows through the 8-connected
//! neighbourhood, never into cells higher than the threshold. Each frame
//! reports coverage, volume, maximum depth and a growth-rate estimate.
//!
//! # Architecture
//!
//! - `schema`: Configuration and synthetic terrain
//! - `compute`: Grid preparation, threshold, seeding, flood engine, metrics,
//!   session controller
//! - `io`: ESRI ASCII DEM reader
//! - `animation`: `.glfa` recording and playback
//!
//! # Example
//!
//! ```rust,no_run
//! use glof_sim::{
//!     compute::{AnimationController, MetricsLog},
//!     schema::{SimulationConfig, Terrain},
//! };
//!
//! let dem = Terrain::default().generate()?;
//!
//! let mut controller = AnimationController::new(SimulationConfig::default())?;
//! controller.initialize(&dem)?;
//! controller.start()?;
//!
//! let mut log = MetricsLog::new();
//! controller.run_frames(&mut log, 100)?;
//!
//! let summary = log.summary();
//! println!("Flooded area after {} frames: {}", summary.frames, summary.final_coverage_area);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod animation;
pub mod compute;
pub mod io;
pub mod schema;

// Re-export commonly used types
pub use compute::{AnimationController, FloodEngine, MetricsFrame, SimError, WaterState};
pub use schema::{SimulationConfig, Terrain};
