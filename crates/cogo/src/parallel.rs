//! Parallel line projection and clipping to terminal lines.

use std::f64::consts::FRAC_PI_2;

use kurbo::Point;

use crate::coords::CoordinateSystem;
use crate::curve::{Arc, Curve};
use crate::geom::{bearing, offset_start, polar, signed_offset, TINY};
use crate::intersect::closest_to;

/// Furthest a parallel end is pushed when searching for its terminal line.
pub const MAX_REACH: f64 = 100_000.0;

/// Parallel to a->b at a signed plan offset (right of travel is positive).
pub fn parallel_segment(a: Point, b: Point, offset: f64) -> Option<(Point, Point)> {
    if a.distance(b) < TINY {
        return None;
    }
    let brg = bearing(a, b);
    Some((offset_start(a, brg, offset), offset_start(b, brg, offset)))
}

/// Parallel at a ground offset, reduced using the scale factor between the
/// reference midpoint and its offset position.
pub fn parallel_by_distance(
    a: Point,
    b: Point,
    ground_offset: f64,
    cs: &dyn CoordinateSystem,
) -> Option<(Point, Point)> {
    if a.distance(b) < TINY {
        return None;
    }
    let mid = a.midpoint(b);
    let side = polar(mid, bearing(a, b) + FRAC_PI_2, ground_offset);
    let plan = cs.reduce(ground_offset, mid, side);
    parallel_segment(a, b, plan)
}

/// Parallel through a point.
pub fn parallel_through(a: Point, b: Point, p: Point) -> Option<(Point, Point)> {
    let offset = signed_offset(p, a, b)?;
    parallel_segment(a, b, offset)
}

/// Concentric arc at a signed offset. Travelling clockwise, the right hand
/// side is towards the centre.
pub fn parallel_arc(arc: &Arc, offset: f64) -> Option<Arc> {
    let r = arc.radius();
    let radius = if arc.clockwise { r - offset } else { r + offset };
    arc.with_radius(radius)
}

/// Concentric arc through a point.
pub fn parallel_arc_through(arc: &Arc, p: Point) -> Option<Arc> {
    arc.with_radius(arc.centre.distance(p))
}

/// Move the end `p` of a parallel (whose other end is `other`) onto the
/// terminal curve, searching `reach` either way along the parallel. The
/// crossing nearest to `p` wins.
pub fn clip_to_terminal(p: Point, other: Point, terminal: &Curve, reach: f64) -> Option<Point> {
    let d = p - other;
    let len = d.hypot();
    if len < TINY {
        return None;
    }
    let u = d / len;
    let reach = reach.min(MAX_REACH);
    let span = Curve::segment(p - u * reach, p + u * reach);
    closest_to(&span.intersect(terminal), p)
}

/// Reject a parallel that collapsed to a point.
pub fn non_degenerate(start: Point, end: Point) -> Option<(Point, Point)> {
    if start.distance(end) < TINY {
        None
    } else {
        Some((start, end))
    }
}
