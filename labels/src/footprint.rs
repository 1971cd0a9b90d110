use geo::geometry::{Coord, LineString, Polygon, Rect};
use std::f64::consts::FRAC_PI_2;

/// Line segments used to approximate each quarter circle of a
/// rounded buffer.
pub const QUADRANT_SEGMENTS: usize = 8;

/// Returns `rect` grown by `distance` in every direction.
///
/// A positive distance yields a rectangle with round corners of
/// radius `distance`, each approximated by [`QUADRANT_SEGMENTS`]
/// segments. A negative distance shrinks the rectangle, and yields an
/// empty polygon once it collapses.
pub fn buffer(rect: Rect, distance: f64) -> Polygon {
    if distance <= 0.0 {
        let inset = Coord {
            x: -distance,
            y: -distance,
        };
        let (min, max) = (rect.min() + inset, rect.max() - inset);
        if min.x > max.x || min.y > max.y {
            return Polygon::new(LineString::new(vec![]), vec![]);
        }
        return Rect::new(min, max).to_polygon();
    }

    let (min, max) = (rect.min(), rect.max());
    let corners = [
        (Coord { x: max.x, y: min.y }, -FRAC_PI_2),
        (Coord { x: max.x, y: max.y }, 0.0),
        (Coord { x: min.x, y: max.y }, FRAC_PI_2),
        (Coord { x: min.x, y: min.y }, 2.0 * FRAC_PI_2),
    ];
    let mut ring = Vec::with_capacity(corners.len() * (QUADRANT_SEGMENTS + 1) + 1);
    for (center, start) in corners {
        for step in 0..=QUADRANT_SEGMENTS {
            #[allow(clippy::cast_precision_loss)]
            let angle = start + FRAC_PI_2 * step as f64 / QUADRANT_SEGMENTS as f64;
            ring.push(Coord {
                x: center.x + distance * angle.cos(),
                y: center.y + distance * angle.sin(),
            });
        }
    }
    Polygon::new(LineString::new(ring), vec![])
}

#[cfg(test)]
mod tests {
    use super::{buffer, QUADRANT_SEGMENTS};
    use approx::assert_relative_eq;
    use geo::{
        geometry::{Coord, Rect},
        point, Area, BoundingRect, Contains, Intersects,
    };

    fn unit_rect() -> Rect {
        Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 })
    }

    #[test]
    fn test_zero_distance_is_the_rect() {
        let poly = buffer(unit_rect(), 0.0);
        assert_relative_eq!(poly.unsigned_area(), 1.0);
    }

    #[test]
    fn test_positive_buffer_grows_with_round_corners() {
        let poly = buffer(unit_rect(), 0.5);
        // closed ring: 4 arcs of QUADRANT_SEGMENTS + 1 points, plus closing point
        assert_eq!(poly.exterior().0.len(), 4 * (QUADRANT_SEGMENTS + 1) + 1);
        let bbox = poly.bounding_rect().unwrap();
        assert_relative_eq!(bbox.min().x, -0.5, epsilon = 1e-12);
        assert_relative_eq!(bbox.max().y, 1.5, epsilon = 1e-12);
        // Square corners are cut off, edge midpoints are not.
        assert!(!poly.contains(&point!(x: -0.45, y: -0.45)));
        assert!(poly.intersects(&point!(x: -0.5, y: 0.5)));
        // 1 + 4 * 0.5 + pi * 0.25, minus the polygonal chord loss.
        let full_round = 3.0 + std::f64::consts::PI * 0.25;
        assert!(poly.unsigned_area() < full_round);
        assert!(poly.unsigned_area() > full_round - 0.01);
    }

    #[test]
    fn test_negative_buffer_shrinks() {
        let poly = buffer(unit_rect(), -0.25);
        assert_relative_eq!(poly.unsigned_area(), 0.25);
        let collapsed = buffer(unit_rect(), -0.75);
        assert_relative_eq!(collapsed.unsigned_area(), 0.0);
        assert!(!collapsed.intersects(&point!(x: 0.5, y: 0.5)));
    }
}
