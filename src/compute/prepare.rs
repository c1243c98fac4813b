//! Grid preparation: decimation followed by Gaussian smoothing.
//!
//! Decimation is nearest-neighbour (every `d`-th row and column), trading
//! resolution for speed. Smoothing suppresses single-cell noise that would
//! otherwise act as a spurious flow barrier.

use crate::schema::{ConfigError, MAX_SMOOTHING_SIGMA};

use super::{DataError, ElevationGrid, SimError};

/// Gaussian kernel truncation, in standard deviations.
const TRUNCATE: f64 = 4.0;

/// Decimate and smooth a raw elevation grid to simulation resolution.
pub fn prepare_grid(
    raw: &ElevationGrid,
    downscale_factor: usize,
    smoothing_sigma: f64,
) -> Result<ElevationGrid, SimError> {
    if downscale_factor == 0 {
        return Err(ConfigError::InvalidDownscaleFactor(downscale_factor).into());
    }
    if !(0.0..=MAX_SMOOTHING_SIGMA).contains(&smoothing_sigma) {
        return Err(ConfigError::InvalidSmoothingSigma(smoothing_sigma).into());
    }
    if raw.is_empty() {
        return Err(DataError::Empty.into());
    }

    let decimated = decimate(raw, downscale_factor);
    if decimated.defined_count() == 0 {
        return Err(DataError::AllUndefined {
            width: decimated.width(),
            height: decimated.height(),
        }
        .into());
    }

    Ok(gaussian_smooth(&decimated, smoothing_sigma))
}

/// Keep every `factor`-th row and column, starting at index 0.
pub fn decimate(grid: &ElevationGrid, factor: usize) -> ElevationGrid {
    let factor = factor.max(1);
    let width = grid.width().div_ceil(factor);
    let height = grid.height().div_ceil(factor);

    let mut data = Vec::with_capacity(width * height);
    for y in (0..grid.height()).step_by(factor) {
        for x in (0..grid.width()).step_by(factor) {
            data.push(grid.get(x, y));
        }
    }

    ElevationGrid::from_parts(width, height, data)
}

/// Kernel radius for `sigma`, capped at `max_radius`.
///
/// Zero means the kernel is the identity.
pub fn kernel_radius(sigma: f64, max_radius: usize) -> usize {
    if sigma.is_nan() || sigma <= 0.0 {
        return 0;
    }
    ((TRUNCATE * sigma + 0.5) as usize).min(max_radius)
}

/// Normalized 1D Gaussian weights over `[-radius, radius]`.
pub fn gaussian_weights(sigma: f64, radius: usize) -> Vec<f64> {
    if radius == 0 {
        return vec![1.0];
    }
    let mut weights: Vec<f64> = (0..=2 * radius)
        .map(|i| {
            let d = i as f64 - radius as f64;
            let z = d / sigma;
            (-0.5 * z * z).exp()
        })
        .collect();

    let sum: f64 = weights.iter().sum();
    if sum > 0.0 {
        for w in &mut weights {
            *w /= sum;
        }
    }
    weights
}

/// Separable Gaussian blur with mirror-reflect boundaries.
///
/// Undefined cells are excluded: each defined output is the weighted mean of
/// the defined samples under the kernel, and undefined cells stay undefined.
/// The radius never exceeds the longer grid axis.
pub fn gaussian_smooth(grid: &ElevationGrid, sigma: f64) -> ElevationGrid {
    let width = grid.width();
    let height = grid.height();
    let radius = kernel_radius(sigma, width.max(height));
    if radius == 0 {
        return grid.clone();
    }
    let weights = gaussian_weights(sigma, radius);
    let radius = radius as isize;

    // Value field with undefined samples zeroed, and its coverage mask.
    let values: Vec<f64> = grid
        .as_slice()
        .iter()
        .map(|&v| if v.is_nan() { 0.0 } else { v })
        .collect();
    let mask: Vec<f64> = grid
        .as_slice()
        .iter()
        .map(|v| if v.is_nan() { 0.0 } else { 1.0 })
        .collect();

    let mut values_h = vec![0.0f64; width * height];
    let mut mask_h = vec![0.0f64; width * height];
    for y in 0..height {
        let row = y * width;
        for x in 0..width {
            let mut v = 0.0;
            let mut m = 0.0;
            for (k, &w) in weights.iter().enumerate() {
                let sx = reflect_coord(x as isize + k as isize - radius, width);
                v += w * values[row + sx];
                m += w * mask[row + sx];
            }
            values_h[row + x] = v;
            mask_h[row + x] = m;
        }
    }

    let mut data = vec![f64::NAN; width * height];
    for y in 0..height {
        for x in 0..width {
            let idx = y * width + x;
            if mask[idx] == 0.0 {
                continue;
            }
            let mut v = 0.0;
            let mut m = 0.0;
            for (k, &w) in weights.iter().enumerate() {
                let sy = reflect_coord(y as isize + k as isize - radius, height);
                v += w * values_h[sy * width + x];
                m += w * mask_h[sy * width + x];
            }
            data[idx] = v / m;
        }
    }

    ElevationGrid::from_parts(width, height, data)
}

/// Map a possibly out-of-range coordinate onto `[0, len)` by half-sample
/// symmetric reflection (`d c b a | a b c d | d c b a`).
#[inline]
pub fn reflect_coord(i: isize, len: usize) -> usize {
    let n = len as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n { m as usize } else { (period - m - 1) as usize }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> ElevationGrid {
        let data = (0..width * height).map(|i| i as f64).collect();
        ElevationGrid::new(width, height, data).unwrap()
    }

    #[test]
    fn test_decimate_takes_every_nth_sample() {
        let grid = ramp(5, 4);
        let small = decimate(&grid, 2);

        assert_eq!(small.dims(), (3, 2));
        assert_eq!(small.as_slice(), &[0.0, 2.0, 4.0, 10.0, 12.0, 14.0]);
    }

    #[test]
    fn test_decimate_factor_one_is_identity() {
        let grid = ramp(4, 3);
        assert_eq!(decimate(&grid, 1), grid);
    }

    #[test]
    fn test_gaussian_weights_normalized_and_symmetric() {
        let weights = gaussian_weights(1.0, kernel_radius(1.0, usize::MAX));
        assert_eq!(weights.len(), 9);

        let sum: f64 = weights.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        for i in 0..4 {
            assert!((weights[i] - weights[8 - i]).abs() < 1e-15);
        }
    }

    #[test]
    fn test_kernel_radius_bounds() {
        assert_eq!(kernel_radius(0.0, 10), 0);
        assert_eq!(kernel_radius(1e-200, 10), 0);
        assert_eq!(kernel_radius(0.1, 10), 0);
        assert_eq!(kernel_radius(2.0, 10), 8);
        assert_eq!(kernel_radius(1e19, 10), 10);
        assert_eq!(gaussian_weights(1e-200, 0), vec![1.0]);
    }

    #[test]
    fn test_reflect_coord() {
        assert_eq!(reflect_coord(-1, 4), 0);
        assert_eq!(reflect_coord(-2, 4), 1);
        assert_eq!(reflect_coord(4, 4), 3);
        assert_eq!(reflect_coord(5, 4), 2);
        assert_eq!(reflect_coord(2, 4), 2);
        // Offsets larger than the axis keep bouncing.
        assert_eq!(reflect_coord(-5, 2), 0);
        assert_eq!(reflect_coord(7, 1), 0);
    }

    #[test]
    fn test_smoothing_preserves_constant_field() {
        let grid = ElevationGrid::new(6, 5, vec![42.0; 30]).unwrap();
        let smoothed = gaussian_smooth(&grid, 1.0);
        for &v in smoothed.as_slice() {
            assert!((v - 42.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_smoothing_suppresses_single_cell_spike() {
        let mut data = vec![0.0; 49];
        data[24] = 100.0;
        let grid = ElevationGrid::new(7, 7, data).unwrap();
        let smoothed = gaussian_smooth(&grid, 1.0);

        let peak = smoothed.get(3, 3);
        assert!(peak < 20.0, "spike survived smoothing: {}", peak);
        assert!(smoothed.get(2, 3) > 0.0);
        let total: f64 = smoothed.as_slice().iter().sum();
        assert!((total - 100.0).abs() < 1e-6, "mass drift: {}", total);
    }

    #[test]
    fn test_smoothing_keeps_undefined_cells_undefined() {
        let mut data = vec![5.0; 25];
        data[12] = f64::NAN;
        let grid = ElevationGrid::new(5, 5, data).unwrap();
        let smoothed = gaussian_smooth(&grid, 1.0);

        assert!(smoothed.get(2, 2).is_nan());
        for (i, &v) in smoothed.as_slice().iter().enumerate() {
            if i != 12 {
                assert!((v - 5.0).abs() < 1e-9, "cell {} = {}", i, v);
            }
        }
    }

    #[test]
    fn test_prepare_rejects_empty_and_undefined() {
        let empty = ElevationGrid::new(0, 0, vec![]).unwrap();
        assert_eq!(
            prepare_grid(&empty, 1, 1.0),
            Err(SimError::Data(DataError::Empty))
        );

        let undefined = ElevationGrid::new(2, 2, vec![f64::NAN; 4]).unwrap();
        assert_eq!(
            prepare_grid(&undefined, 1, 1.0),
            Err(SimError::Data(DataError::AllUndefined {
                width: 2,
                height: 2
            }))
        );
    }

    #[test]
    fn test_prepare_rejects_undefined_after_decimation() {
        // Defined samples only at odd columns; stride 2 keeps even columns.
        let data = vec![f64::NAN, 1.0, f64::NAN, 1.0];
        let grid = ElevationGrid::new(4, 1, data).unwrap();
        assert!(matches!(
            prepare_grid(&grid, 2, 0.0),
            Err(SimError::Data(DataError::AllUndefined { .. }))
        ));
    }

    #[test]
    fn test_prepare_zero_sigma_skips_smoothing() {
        let grid = ramp(6, 6);
        let prepared = prepare_grid(&grid, 3, 0.0).unwrap();
        assert_eq!(prepared.as_slice(), &[0.0, 3.0, 18.0, 21.0]);
    }

    #[test]
    fn test_prepare_tiny_sigma_leaves_grid_unchanged() {
        let grid = ElevationGrid::new(2, 2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let prepared = prepare_grid(&grid, 1, 1e-200).unwrap();
        assert_eq!(prepared, grid);
    }

    #[test]
    fn test_prepare_rejects_oversized_sigma() {
        let grid = ramp(2, 2);
        assert_eq!(
            prepare_grid(&grid, 1, 1e19),
            Err(SimError::Config(ConfigError::InvalidSmoothingSigma(1e19)))
        );
    }

    #[test]
    fn test_wide_kernel_is_capped_to_grid() {
        let grid = ramp(3, 2);
        let smoothed = gaussian_smooth(&grid, MAX_SMOOTHING_SIGMA);
        assert_eq!(smoothed.dims(), (3, 2));

        let values = smoothed.as_slice();
        assert!(values.iter().all(|v| v.is_finite()));
        let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        // Input spans 0..=5; a near-flat kernel pulls everything together.
        assert!(hi - lo < 1.5, "spread {}", hi - lo);
    }

    #[test]
    fn test_prepare_rejects_zero_downscale() {
        let grid = ramp(2, 2);
        assert_eq!(
            prepare_grid(&grid, 0, 1.0),
            Err(SimError::Config(ConfigError::InvalidDownscaleFactor(0)))
        );
    }
}
