//! Grid geometry: segment distance, snapping and screen/grid transforms.
//!
//! Grid space is measured in cells. The renderer maps a grid point to the
//! screen with `origin + point * scale`, where `scale = cell_size * zoom`;
//! [`screen_to_grid`] is the exact inverse of that mapping.

use kurbo::{Point, Vec2};

/// Distance from `p` to the closest point on segment `a`-`b`.
///
/// The projection is clamped to the segment, so points beyond either end
/// measure to that endpoint. A degenerate segment (`a == b`) measures to
/// the single point. No tolerance is applied here.
pub fn point_to_segment_distance(p: Point, a: Point, b: Point) -> f64 {
    let segment = b - a;
    let to_point = p - a;

    let length_sq = segment.hypot2();
    if length_sq == 0.0 {
        return to_point.hypot();
    }

    // Project point onto line, clamped to segment
    let t = (to_point.dot(segment) / length_sq).clamp(0.0, 1.0);
    let projection = a + segment * t;
    (p - projection).hypot()
}

/// Round each coordinate independently to the nearest multiple of `unit`.
///
/// A non-positive or non-finite unit leaves the point unchanged.
pub fn snap(p: Point, unit: f64) -> Point {
    if !(unit > 0.0 && unit.is_finite()) {
        return p;
    }
    Point::new((p.x / unit).round() * unit, (p.y / unit).round() * unit)
}

/// Convert a screen position to grid space: `(screen - origin) / scale`.
///
/// `scale` is the number of screen pixels per grid unit, i.e. the cell size
/// multiplied by the zoom factor.
pub fn screen_to_grid(screen: Point, origin: Vec2, scale: f64) -> Point {
    let local = screen - origin;
    Point::new(local.x / scale, local.y / scale)
}

/// Convert a grid position to screen space. Inverse of [`screen_to_grid`].
pub fn grid_to_screen(grid: Point, origin: Vec2, scale: f64) -> Point {
    Point::new(grid.x * scale, grid.y * scale) + origin
}

/// The `(row, col)` of the cell containing a grid point, if it is not
/// left of or above the grid.
pub fn cell_at(grid: Point) -> Option<(u32, u32)> {
    if !(grid.x.is_finite() && grid.y.is_finite()) || grid.x < 0.0 || grid.y < 0.0 {
        return None;
    }
    let row = grid.y.floor();
    let col = grid.x.floor();
    if row > f64::from(u32::MAX) || col > f64::from(u32::MAX) {
        return None;
    }
    Some((row as u32, col as u32))
}
