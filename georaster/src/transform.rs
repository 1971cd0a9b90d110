//! Affine pixel to geo coordinate mapping.

use geo::geometry::{Coord, Rect};

/// Six-coefficient affine transform, GDAL ordering.
///
/// ```text
/// x = c + a * col + b * row
/// y = f + d * col + e * row
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub c: f64,
    pub a: f64,
    pub b: f64,
    pub f: f64,
    pub d: f64,
    pub e: f64,
}

impl GeoTransform {
    /// North-up transform with the given upper-left origin and pixel
    /// size.
    pub fn north_up(origin: Coord, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            c: origin.x,
            a: pixel_width,
            b: 0.0,
            f: origin.y,
            d: 0.0,
            e: -pixel_height,
        }
    }

    /// Transform mapping a `width` x `height` pixel grid onto `bounds`.
    #[allow(clippy::cast_precision_loss)]
    pub fn from_bounds(bounds: Rect, width: usize, height: usize) -> Self {
        let pixel_width = bounds.width() / width as f64;
        let pixel_height = bounds.height() / height as f64;
        let origin = Coord {
            x: bounds.min().x,
            y: bounds.max().y,
        };
        Self::north_up(origin, pixel_width, pixel_height)
    }

    /// Returns the geo coordinate of pixel corner `(col, row)`.
    pub fn apply(&self, col: f64, row: f64) -> Coord {
        Coord {
            x: self.c + self.a * col + self.b * row,
            y: self.f + self.d * col + self.e * row,
        }
    }

    /// Returns the fractional `(col, row)` of a geo coordinate.
    pub fn invert(&self, coord: Coord) -> (f64, f64) {
        let det = self.a * self.e - self.b * self.d;
        let dx = coord.x - self.c;
        let dy = coord.y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (self.a * dy - self.d * dx) / det;
        (col, row)
    }

    /// Horizontal pixel size in CRS units.
    pub fn pixel_width(&self) -> f64 {
        self.a
    }

    /// Vertical pixel size in CRS units, positive for north-up.
    pub fn pixel_height(&self) -> f64 {
        -self.e
    }

    /// Returns `true` when there is no rotation or shear term.
    pub fn is_north_up(&self) -> bool {
        self.b == 0.0 && self.d == 0.0
    }

    /// Geographic bounds of a `width` x `height` raster.
    #[allow(clippy::cast_precision_loss)]
    pub fn bounds(&self, width: usize, height: usize) -> Rect {
        let ul = self.apply(0.0, 0.0);
        let lr = self.apply(width as f64, height as f64);
        Rect::new(ul, lr)
    }

    /// Geographic bounds of the pixel window `[col0, col1) x [row0, row1)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn window_bounds(&self, col0: usize, row0: usize, col1: usize, row1: usize) -> Rect {
        let ul = self.apply(col0 as f64, row0 as f64);
        let lr = self.apply(col1 as f64, row1 as f64);
        Rect::new(ul, lr)
    }
}
