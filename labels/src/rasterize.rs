//! Burn vector geometries into a binary pixel mask.
//!
//! Pixel selection follows the usual non-`all_touched` rules:
//!
//! - polygons burn every pixel whose centre falls inside, using the
//!   even-odd rule across exterior and interior rings;
//! - line segments burn one pixel per step along their major axis,
//!   giving an 8-connected trace, plus the pixel holding each vertex;
//! - points burn the pixel that contains them.

use geo::geometry::{Coord, Geometry, Polygon, Rect};
use ndarray::Array2;

/// Value written for burned pixels.
pub const BURN: u8 = 1;

/// Returns a `height` x `width` mask over `bounds` with every pixel
/// touched by `geometries` set to [`BURN`].
#[allow(clippy::cast_precision_loss)]
pub fn rasterize<'a, I>(geometries: I, bounds: Rect, width: usize, height: usize) -> Array2<u8>
where
    I: IntoIterator<Item = &'a Geometry>,
{
    let mut burner = Burner {
        mask: Array2::zeros((height, width)),
        origin: Coord {
            x: bounds.min().x,
            y: bounds.max().y,
        },
        res: Coord {
            x: bounds.width() / width as f64,
            y: bounds.height() / height as f64,
        },
    };
    for geometry in geometries {
        burner.geometry(geometry);
    }
    burner.mask
}

struct Burner {
    mask: Array2<u8>,

    /// Geo coordinate of the upper-left corner of pixel (0, 0).
    origin: Coord,

    /// Pixel size in CRS units.
    res: Coord,
}

impl Burner {
    /// Returns the fractional (col, row) position of `coord`.
    fn to_pixel(&self, coord: Coord) -> Coord {
        Coord {
            x: (coord.x - self.origin.x) / self.res.x,
            y: (self.origin.y - coord.y) / self.res.y,
        }
    }

    fn width(&self) -> usize {
        self.mask.ncols()
    }

    fn height(&self) -> usize {
        self.mask.nrows()
    }

    fn geometry(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Point(point) => self.pixel(self.to_pixel(point.0)),
            Geometry::Line(line) => self.path(&[line.start, line.end]),
            Geometry::LineString(line_string) => self.path(&line_string.0),
            Geometry::Polygon(polygon) => self.polygon(polygon),
            Geometry::MultiPoint(points) => {
                for point in points.iter() {
                    self.pixel(self.to_pixel(point.0));
                }
            }
            Geometry::MultiLineString(lines) => {
                for line_string in lines.iter() {
                    self.path(&line_string.0);
                }
            }
            Geometry::MultiPolygon(polygons) => {
                for polygon in polygons.iter() {
                    self.polygon(polygon);
                }
            }
            Geometry::GeometryCollection(collection) => {
                for geometry in collection.iter() {
                    self.geometry(geometry);
                }
            }
            Geometry::Rect(rect) => self.polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.polygon(&triangle.to_polygon()),
        }
    }

    fn path(&mut self, coords: &[Coord]) {
        let pixels: Vec<Coord> = coords.iter().map(|&c| self.to_pixel(c)).collect();
        if let [only] = pixels[..] {
            self.pixel(only);
        }
        for pair in pixels.windows(2) {
            self.segment(pair[0], pair[1]);
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn segment(&mut self, a: Coord, b: Coord) {
        self.pixel(a);
        self.pixel(b);
        let d = b - a;
        if d.x.abs() >= d.y.abs() {
            if d.x == 0.0 {
                return;
            }
            for col in centers(a.x.min(b.x), a.x.max(b.x), self.width()) {
                let x = col as f64 + 0.5;
                self.pixel(Coord {
                    x,
                    y: a.y + (x - a.x) * d.y / d.x,
                });
            }
        } else {
            for row in centers(a.y.min(b.y), a.y.max(b.y), self.height()) {
                let y = row as f64 + 0.5;
                self.pixel(Coord {
                    x: a.x + (y - a.y) * d.x / d.y,
                    y,
                });
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn polygon(&mut self, polygon: &Polygon) {
        let rings: Vec<Vec<Coord>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(|ring| ring.coords().map(|&c| self.to_pixel(c)).collect())
            .collect();
        let (min_y, max_y) = rings
            .iter()
            .flatten()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), c| {
                (lo.min(c.y), hi.max(c.y))
            });
        let mut crossings = Vec::new();
        for row in centers(min_y, max_y, self.height()) {
            let y = row as f64 + 0.5;
            crossings.clear();
            for ring in &rings {
                for edge in ring.windows(2) {
                    let (p, q) = (edge[0], edge[1]);
                    if (p.y <= y) != (q.y <= y) {
                        crossings.push(p.x + (y - p.y) * (q.x - p.x) / (q.y - p.y));
                    }
                }
            }
            crossings.sort_by(f64::total_cmp);
            for span in crossings.chunks_exact(2) {
                for col in centers(span[0], span[1], self.width()) {
                    self.mask[[row, col]] = BURN;
                }
            }
        }
    }

    /// Burns the pixel containing fractional position `p`, if any.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn pixel(&mut self, p: Coord) {
        if p.x >= 0.0 && p.y >= 0.0 {
            let (col, row) = (p.x.floor() as usize, p.y.floor() as usize);
            if col < self.width() && row < self.height() {
                self.mask[[row, col]] = BURN;
            }
        }
    }
}

/// Indices `i` in `0..len` whose pixel centre `i + 0.5` lies in
/// `[lo, hi)`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn centers(lo: f64, hi: f64, len: usize) -> std::ops::Range<usize> {
    let first = (lo - 0.5).ceil().max(0.0);
    let last = (hi - 0.5).ceil().clamp(0.0, len as f64);
    if first >= last {
        return 0..0;
    }
    first as usize..last as usize
}
