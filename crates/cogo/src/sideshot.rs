//! Polar projection (sideshot / radial line).

use kurbo::Point;

use crate::coords::CoordinateSystem;
use crate::geom::{polar, TINY};

/// Project `length` along `bearing` from `origin`.
///
/// A ground length gets one reduction pass using the scale factor between
/// the origin and the unreduced position. Planar lengths (for instance one
/// taken from an offset point) are used as they are.
pub fn sideshot(
    origin: Point,
    bearing: f64,
    length: f64,
    planar: bool,
    cs: &dyn CoordinateSystem,
) -> Option<Point> {
    if length < TINY {
        return None;
    }
    let unreduced = polar(origin, bearing, length);
    if planar {
        return Some(unreduced);
    }
    let sfac = cs.line_scale_factor(origin, unreduced);
    Some(polar(origin, bearing, length * sfac))
}
