//! Per-block gradient feature extraction.

use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};

/// Added to every min-max range so uniform blocks normalize to 0.
pub const NORMALIZE_EPSILON: f32 = 1e-6;

/// Bands in an enhanced raster.
pub const ENHANCED_BANDS: usize = 3;

/// Derivative direction of a Sobel operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Along columns (dz/dx).
    X,
    /// Along rows (dz/dy).
    Y,
}

/// Sobel derivative of `block` in `direction`.
///
/// The derivative kernel `[-1, 0, 1]` runs along the direction and
/// the smoothing kernel `[1, 2, 1]` across it. Out-of-block samples are
/// reflected about the edge (`d c b a | a b c d | d c b a`), which for
/// a three tap kernel repeats the edge sample.
pub fn sobel(block: ArrayView2<'_, f32>, direction: Direction) -> Array2<f32> {
    let (rows, cols) = block.dim();
    let at = |row: usize, d_row: isize, col: usize, d_col: isize| {
        block[[reflect(row, d_row, rows), reflect(col, d_col, cols)]]
    };
    Array2::from_shape_fn((rows, cols), |(r, c)| match direction {
        Direction::X => {
            (at(r, -1, c, 1) - at(r, -1, c, -1))
                + 2.0 * (at(r, 0, c, 1) - at(r, 0, c, -1))
                + (at(r, 1, c, 1) - at(r, 1, c, -1))
        }
        Direction::Y => {
            (at(r, 1, c, -1) - at(r, -1, c, -1))
                + 2.0 * (at(r, 1, c, 0) - at(r, -1, c, 0))
                + (at(r, 1, c, 1) - at(r, -1, c, 1))
        }
    })
}

/// Euclidean magnitude of two gradient components.
pub fn magnitude(dx: &Array2<f32>, dy: &Array2<f32>) -> Array2<f32> {
    Zip::from(dx).and(dy).map_collect(|x, y| x.hypot(*y))
}

/// Min-max scales `values` into `[0, 1]`.
///
/// NaN samples are ignored when finding the extremes.
pub fn normalize(values: &Array2<f32>) -> Array2<f32> {
    let (min, max) = values
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = max - min + NORMALIZE_EPSILON;
    values.mapv(|v| (v - min) / range)
}

/// Returns the `(3, rows, cols)` feature stack for one block of
/// heights: normalized height, normalized gradient magnitude, and the
/// gradient magnitude again.
pub fn enhance(heights: ArrayView2<'_, f32>) -> Array3<f32> {
    let dx = sobel(heights, Direction::X);
    let dy = sobel(heights, Direction::Y);
    let height_norm = normalize(&heights.to_owned());
    let grad_norm = normalize(&magnitude(&dx, &dy));
    let (rows, cols) = heights.dim();
    let mut stack = Array3::zeros((ENHANCED_BANDS, rows, cols));
    stack.index_axis_mut(Axis(0), 0).assign(&height_norm);
    stack.index_axis_mut(Axis(0), 1).assign(&grad_norm);
    stack.index_axis_mut(Axis(0), 2).assign(&grad_norm);
    stack
}

/// Index of `i + d` reflected into `0..len`.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)]
fn reflect(i: usize, d: isize, len: usize) -> usize {
    let j = i as isize + d;
    if j < 0 {
        (-j - 1) as usize
    } else if j as usize >= len {
        2 * len - 1 - j as usize
    } else {
        j as usize
    }
}
