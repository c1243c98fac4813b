//! Synthetic terrain for demos and tests.
//!
//! Real runs read a DEM from disk (see [`crate::io`]); these patterns stand in
//! for one when no raster is at hand.

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::compute::{DataError, ElevationGrid};

/// Complete synthetic terrain description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    /// Grid width in cells. Ignored by [`TerrainPattern::Custom`].
    pub width: usize,
    /// Grid height in cells. Ignored by [`TerrainPattern::Custom`].
    pub height: usize,
    /// Base surface.
    pub pattern: TerrainPattern,
    /// Optional uniform noise added on top of the pattern.
    #[serde(default)]
    pub noise: Option<NoiseLayer>,
    /// Cells to mark as missing data, as (x, y).
    #[serde(default)]
    pub nodata: Vec<(usize, usize)>,
}

impl Default for Terrain {
    fn default() -> Self {
        Self {
            width: 120,
            height: 60,
            pattern: TerrainPattern::GlacialValley {
                lake_center: (0.2, 0.5),
                lake_radius: 0.25,
                lake_depth: 40.0,
                moraine_height: 15.0,
                valley_drop: 300.0,
                wall_height: 200.0,
            },
            noise: Some(NoiseLayer {
                amplitude: 2.0,
                seed: 42,
            }),
            nodata: Vec::new(),
        }
    }
}

/// Predefined surface shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TerrainPattern {
    /// Tilted plane.
    Plane {
        /// Elevation at (0, 0).
        elevation: f64,
        /// Rise per cell along x.
        slope_x: f64,
        /// Rise per cell along y.
        slope_y: f64,
    },
    /// Bowl with a flat rim.
    Basin {
        /// Centre as fraction of grid size (0.0-1.0).
        center: (f64, f64),
        /// Radius as fraction of the smaller grid dimension.
        radius: f64,
        /// Depth of the bowl below the rim.
        depth: f64,
        /// Rim elevation.
        rim: f64,
    },
    /// V-shaped valley falling along x, with a moraine-dammed lake near its head.
    GlacialValley {
        /// Lake centre as fraction of grid size.
        lake_center: (f64, f64),
        /// Lake radius as fraction of the smaller grid dimension.
        lake_radius: f64,
        /// Depth of the lake basin at its centre.
        lake_depth: f64,
        /// Height of the moraine ridge around the lake.
        moraine_height: f64,
        /// Total elevation drop from the valley head to its mouth.
        valley_drop: f64,
        /// Height of the valley walls above the thalweg.
        wall_height: f64,
    },
    /// Explicit rows; `null` marks missing data.
    Custom { rows: Vec<Vec<Option<f64>>> },
}

/// Uniform noise in `[-amplitude, amplitude]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoiseLayer {
    pub amplitude: f64,
    /// Random seed.
    pub seed: u64,
}

impl Terrain {
    /// Generate the elevation grid.
    pub fn generate(&self) -> Result<ElevationGrid, DataError> {
        let mut grid: Vec<Vec<f64>> = match &self.pattern {
            TerrainPattern::Custom { rows } => rows
                .iter()
                .map(|row| row.iter().map(|v| v.unwrap_or(f64::NAN)).collect())
                .collect(),
            pattern => {
                let mut rows = vec![vec![0.0f64; self.width]; self.height];
                for (y, row) in rows.iter_mut().enumerate() {
                    for (x, cell) in row.iter_mut().enumerate() {
                        *cell = pattern.sample(x, y, self.width, self.height);
                    }
                }
                rows
            }
        };

        if let Some(noise) = &self.noise {
            apply_noise(&mut grid, noise)?;
        }

        for &(x, y) in &self.nodata {
            if let Some(cell) = grid.get_mut(y).and_then(|row| row.get_mut(x)) {
                *cell = f64::NAN;
            }
        }

        ElevationGrid::from_rows(grid)
    }
}

impl TerrainPattern {
    /// Elevation of cell (x, y) on a `width x height` grid.
    fn sample(&self, x: usize, y: usize, width: usize, height: usize) -> f64 {
        let min_dim = width.min(height) as f64;
        match self {
            TerrainPattern::Plane {
                elevation,
                slope_x,
                slope_y,
            } => elevation + slope_x * x as f64 + slope_y * y as f64,
            TerrainPattern::Basin {
                center,
                radius,
                depth,
                rim,
            } => {
                let d = distance(x, y, center.0 * width as f64, center.1 * height as f64);
                let r = radius * min_dim;
                if r > 0.0 && d < r {
                    rim - depth * (1.0 - (d / r).powi(2))
                } else {
                    *rim
                }
            }
            TerrainPattern::GlacialValley {
                lake_center,
                lake_radius,
                lake_depth,
                moraine_height,
                valley_drop,
                wall_height,
            } => {
                let along = x as f64 / (width.max(2) - 1) as f64;
                let across = (y as f64 / (height.max(2) - 1) as f64 - 0.5).abs() * 2.0;
                let mut z = valley_drop * (1.0 - along) + wall_height * across;

                let d = distance(
                    x,
                    y,
                    lake_center.0 * width as f64,
                    lake_center.1 * height as f64,
                );
                let r = lake_radius * min_dim;
                if r > 0.0 {
                    if d < r {
                        z -= lake_depth * (1.0 - (d / r).powi(2));
                    }
                    let ridge = (d - r) / (0.15 * r);
                    z += moraine_height * (-ridge * ridge).exp();
                }
                z
            }
            TerrainPattern::Custom { .. } => f64::NAN,
        }
    }
}

fn distance(x: usize, y: usize, cx: f64, cy: f64) -> f64 {
    let dx = x as f64 - cx;
    let dy = y as f64 - cy;
    (dx * dx + dy * dy).sqrt()
}

fn apply_noise(grid: &mut [Vec<f64>], noise: &NoiseLayer) -> Result<(), DataError> {
    // The sampled range spans twice the amplitude and must stay finite.
    if !(2.0 * noise.amplitude).is_finite() {
        return Err(DataError::InvalidNoiseAmplitude(noise.amplitude));
    }
    if noise.amplitude <= 0.0 {
        return Ok(());
    }
    let mut rng = StdRng::seed_from_u64(noise.seed);
    for row in grid.iter_mut() {
        for cell in row.iter_mut() {
            *cell += rng.gen_range(-noise.amplitude..=noise.amplitude);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane() {
        let terrain = Terrain {
            width: 3,
            height: 2,
            pattern: TerrainPattern::Plane {
                elevation: 10.0,
                slope_x: 1.0,
                slope_y: 5.0,
            },
            noise: None,
            nodata: vec![(2, 1)],
        };
        let grid = terrain.generate().unwrap();

        assert_eq!(grid.dims(), (3, 2));
        assert_eq!(grid.get(0, 0), 10.0);
        assert_eq!(grid.get(2, 0), 12.0);
        assert_eq!(grid.get(1, 1), 16.0);
        assert!(grid.get(2, 1).is_nan());
    }

    #[test]
    fn test_basin_is_lowest_at_center() {
        let terrain = Terrain {
            width: 21,
            height: 21,
            pattern: TerrainPattern::Basin {
                center: (0.5, 0.5),
                radius: 0.4,
                depth: 30.0,
                rim: 100.0,
            },
            noise: None,
            nodata: Vec::new(),
        };
        let grid = terrain.generate().unwrap();

        let center = grid.get(10, 10);
        assert!(center < 75.0, "center = {}", center);
        assert_eq!(grid.get(0, 0), 100.0);
    }

    #[test]
    fn test_glacial_valley_falls_downstream() {
        let terrain = Terrain {
            noise: None,
            ..Terrain::default()
        };
        let grid = terrain.generate().unwrap();

        let mid = grid.height() / 2;
        assert!(grid.get(grid.width() - 1, mid) < grid.get(grid.width() / 2, mid));
        assert!(grid.get(grid.width() / 2, 0) > grid.get(grid.width() / 2, mid));
    }

    #[test]
    fn test_noise_is_deterministic() {
        let a = Terrain::default().generate().unwrap();
        let b = Terrain::default().generate().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unusable_noise_amplitude_rejected() {
        for amplitude in [1e308, f64::INFINITY, f64::NAN] {
            let terrain = Terrain {
                noise: Some(NoiseLayer { amplitude, seed: 7 }),
                ..Terrain::default()
            };
            assert!(matches!(
                terrain.generate(),
                Err(DataError::InvalidNoiseAmplitude(_))
            ));
        }

        let flat = Terrain {
            noise: Some(NoiseLayer {
                amplitude: 0.0,
                seed: 7,
            }),
            ..Terrain::default()
        };
        let plain = Terrain {
            noise: None,
            ..Terrain::default()
        };
        assert_eq!(flat.generate().unwrap(), plain.generate().unwrap());
    }

    #[test]
    fn test_custom_rows_map_null_to_nan() {
        let json = r#"{
            "width": 0,
            "height": 0,
            "pattern": { "type": "Custom", "rows": [[1.0, null], [3.0, 4.0]] }
        }"#;
        let terrain: Terrain = serde_json::from_str(json).unwrap();
        let grid = terrain.generate().unwrap();

        assert_eq!(grid.dims(), (2, 2));
        assert!(grid.get(1, 0).is_nan());
        assert_eq!(grid.get(1, 1), 4.0);
    }

    #[test]
    fn test_custom_ragged_rows_rejected() {
        let terrain = Terrain {
            width: 0,
            height: 0,
            pattern: TerrainPattern::Custom {
                rows: vec![vec![Some(1.0)], vec![Some(1.0), Some(2.0)]],
            },
            noise: None,
            nodata: Vec::new(),
        };
        assert!(matches!(
            terrain.generate(),
            Err(DataError::RaggedRows { row: 1, .. })
        ));
    }
}
