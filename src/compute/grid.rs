//! Grid containers shared by every simulation stage.
//!
//! Both grids are stored as flat row-major arrays indexed `y * width + x`,
//! where `y` is the row and `x` the column.

/// Immutable 2D elevation samples. NaN marks a missing ("no data") sample.
#[derive(Debug, Clone, PartialEq)]
pub struct ElevationGrid {
    width: usize,
    height: usize,
    data: Vec<f64>,
}

impl ElevationGrid {
    /// Wrap a row-major sample buffer.
    pub fn new(width: usize, height: usize, data: Vec<f64>) -> Result<Self, DataError> {
        if data.len() != width * height {
            return Err(DataError::LengthMismatch {
                width,
                height,
                len: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Build a grid from a list of rows. All rows must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self, DataError> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        let mut data = Vec::with_capacity(width * height);

        for (row, values) in rows.into_iter().enumerate() {
            if values.len() != width {
                return Err(DataError::RaggedRows {
                    row,
                    expected: width,
                    found: values.len(),
                });
            }
            data.extend(values);
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wrap a buffer whose length is correct by construction.
    pub(crate) fn from_parts(width: usize, height: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
        }
    }

    /// Number of columns.
    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions as `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Total number of cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Convert (x, y) coordinates to flat index.
    #[inline]
    pub fn idx(&self, x: usize, y: usize) -> usize {
        y * self.width + x
    }

    /// Elevation at (x, y).
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> f64 {
        self.data[self.idx(x, y)]
    }

    /// Raw row-major samples.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    /// Iterator over the defined (non-NaN) samples.
    pub fn defined_values(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().copied().filter(|v| !v.is_nan())
    }

    /// Number of defined samples.
    pub fn defined_count(&self) -> usize {
        self.defined_values().count()
    }

    /// Fail with [`ShapeError`] unless `other` has the same dimensions.
    pub fn check_dims(&self, other: (usize, usize)) -> Result<(), ShapeError> {
        if self.dims() != other {
            return Err(ShapeError {
                expected: self.dims(),
                found: other,
            });
        }
        Ok(())
    }
}

/// Flooded-cell masks for one frame.
///
/// `flooded` holds the cells counted by every metric. `source` holds seed
/// cells above the flood elevation: they feed growth but never hold
/// measurable water and never change after seeding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WaterState {
    width: usize,
    height: usize,
    flooded: Vec<bool>,
    source: Vec<bool>,
}

impl WaterState {
    /// Dry state with no flooded or source cells.
    pub fn dry(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            flooded: vec![false; width * height],
            source: vec![false; width * height],
        }
    }

    /// Build a state from explicit masks.
    pub fn from_masks(
        width: usize,
        height: usize,
        flooded: Vec<bool>,
        source: Vec<bool>,
    ) -> Result<Self, ShapeError> {
        let expected = width * height;
        for mask in [&flooded, &source] {
            if mask.len() != expected {
                return Err(ShapeError {
                    expected: (width, height),
                    found: (mask.len(), 1),
                });
            }
        }
        Ok(Self {
            width,
            height,
            flooded,
            source,
        })
    }

    pub(crate) fn from_parts(
        width: usize,
        height: usize,
        flooded: Vec<bool>,
        source: Vec<bool>,
    ) -> Self {
        debug_assert_eq!(flooded.len(), width * height);
        debug_assert_eq!(source.len(), width * height);
        Self {
            width,
            height,
            flooded,
            source,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Dimensions as `(width, height)`.
    #[inline]
    pub fn dims(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Whether the cell at (x, y) is flooded.
    #[inline]
    pub fn is_flooded(&self, x: usize, y: usize) -> bool {
        self.flooded[y * self.width + x]
    }

    /// Whether the cell at (x, y) is a source cell.
    #[inline]
    pub fn is_source(&self, x: usize, y: usize) -> bool {
        self.source[y * self.width + x]
    }

    /// Row-major flooded mask.
    #[inline]
    pub fn flooded(&self) -> &[bool] {
        &self.flooded
    }

    /// Row-major source mask.
    #[inline]
    pub fn source(&self) -> &[bool] {
        &self.source
    }

    pub(crate) fn flooded_mut(&mut self) -> &mut Vec<bool> {
        &mut self.flooded
    }

    /// Number of flooded cells.
    pub fn flooded_count(&self) -> usize {
        self.flooded.iter().filter(|&&f| f).count()
    }

    /// Number of source cells.
    pub fn source_count(&self) -> usize {
        self.source.iter().filter(|&&s| s).count()
    }

    /// Number of cells whose flooded flag differs from `other`.
    pub fn changed_cells(&self, other: &WaterState) -> usize {
        self.flooded
            .iter()
            .zip(other.flooded.iter())
            .filter(|(a, b)| a != b)
            .count()
    }
}

/// Malformed or empty elevation input.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    #[error("Elevation grid is empty")]
    Empty,
    #[error("Elevation grid ({width}x{height}) has no defined samples")]
    AllUndefined { width: usize, height: usize },
    #[error("Row {row} has {found} samples, expected {expected}")]
    RaggedRows {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Sample buffer of length {len} does not match {width}x{height}")]
    LengthMismatch {
        width: usize,
        height: usize,
        len: usize,
    },
    #[error("Noise amplitude {0} is not a usable elevation offset")]
    InvalidNoiseAmplitude(f64),
}

/// Grid and state dimensions disagree. Dimensions are `(width, height)`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Shape mismatch: expected {expected:?}, found {found:?}")]
pub struct ShapeError {
    pub expected: (usize, usize),
    pub found: (usize, usize),
}
