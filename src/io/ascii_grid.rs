//! ESRI ASCII raster reader (`.asc`).
//!
//! ```text
//! ncols         4
//! nrows         3
//! xllcorner     0.0
//! yllcorner     0.0
//! cellsize      30.0
//! NODATA_value  -9999
//! 4210 4205 4198 -9999
//! ...
//! ```
//!
//! Samples equal to `NODATA_value` become NaN. Rows are listed north to south,
//! which maps directly onto row-major `y`.

use std::fs;
use std::io;
use std::path::Path;

use crate::compute::{DataError, ElevationGrid};

/// Georeferencing header of an ASCII raster.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiGridHeader {
    pub ncols: usize,
    pub nrows: usize,
    /// Lower-left x (corner or centre, as given).
    pub xll: f64,
    /// Lower-left y (corner or centre, as given).
    pub yll: f64,
    pub cellsize: f64,
    pub nodata: Option<f64>,
}

/// A parsed raster: header plus elevation grid.
#[derive(Debug, Clone)]
pub struct AsciiGrid {
    pub header: AsciiGridHeader,
    pub grid: ElevationGrid,
}

/// Failure to read an ASCII raster.
#[derive(Debug, thiserror::Error)]
pub enum GridReadError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Missing header field `{0}`")]
    MissingHeader(&'static str),
    #[error("Invalid value `{value}` for header field `{key}`")]
    InvalidHeader { key: String, value: String },
    #[error("Invalid sample `{token}` at index {index}")]
    InvalidSample { index: usize, token: String },
    #[error("Expected {expected} samples, found {found}")]
    SampleCount { expected: usize, found: usize },
    #[error(transparent)]
    Data(#[from] DataError),
}

/// Read an ASCII raster from `path`.
pub fn read_ascii_grid<P: AsRef<Path>>(path: P) -> Result<AsciiGrid, GridReadError> {
    let text = fs::read_to_string(path)?;
    parse_ascii_grid(&text)
}

/// Parse an ASCII raster from text.
pub fn parse_ascii_grid(text: &str) -> Result<AsciiGrid, GridReadError> {
    let mut ncols = None;
    let mut nrows = None;
    let mut xll = 0.0;
    let mut yll = 0.0;
    let mut cellsize = 1.0;
    let mut nodata = None;

    let mut lines = text.lines().peekable();
    while let Some(&line) = lines.peek() {
        let mut parts = line.split_whitespace();
        let Some(key) = parts.next() else {
            lines.next();
            continue;
        };
        if !key.starts_with(|c: char| c.is_ascii_alphabetic()) {
            break;
        }
        let value = parts.next().unwrap_or("");
        let key = key.to_ascii_lowercase();
        match key.as_str() {
            "ncols" => ncols = Some(parse_header(&key, value)?),
            "nrows" => nrows = Some(parse_header(&key, value)?),
            "xllcorner" | "xllcenter" => xll = parse_header(&key, value)?,
            "yllcorner" | "yllcenter" => yll = parse_header(&key, value)?,
            "cellsize" => cellsize = parse_header(&key, value)?,
            "nodata_value" => nodata = Some(parse_header(&key, value)?),
            _ => {
                return Err(GridReadError::InvalidHeader {
                    key,
                    value: value.to_string(),
                });
            }
        }
        lines.next();
    }

    let ncols: usize = ncols.ok_or(GridReadError::MissingHeader("ncols"))?;
    let nrows: usize = nrows.ok_or(GridReadError::MissingHeader("nrows"))?;
    let expected = ncols
        .checked_mul(nrows)
        .ok_or_else(|| GridReadError::InvalidHeader {
            key: "ncols x nrows".to_string(),
            value: format!("{} x {}", ncols, nrows),
        })?;

    // Samples are whitespace separated, so the text holds at most half its
    // length in samples whatever the header claims.
    let mut data = Vec::with_capacity(expected.min(text.len() / 2));
    for (index, token) in lines.flat_map(str::split_whitespace).enumerate() {
        let value: f64 = token.parse().map_err(|_| GridReadError::InvalidSample {
            index,
            token: token.to_string(),
        })?;
        data.push(match nodata {
            Some(nd) if value == nd => f64::NAN,
            _ => value,
        });
    }
    if data.len() != expected {
        return Err(GridReadError::SampleCount {
            expected,
            found: data.len(),
        });
    }

    Ok(AsciiGrid {
        header: AsciiGridHeader {
            ncols,
            nrows,
            xll,
            yll,
            cellsize,
            nodata,
        },
        grid: ElevationGrid::new(ncols, nrows, data)?,
    })
}

fn parse_header<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, GridReadError> {
    value.parse().map_err(|_| GridReadError::InvalidHeader {
        key: key.to_string(),
        value: value.to_string(),
    })
}
