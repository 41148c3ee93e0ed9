//! Intersections between circles, directions and straight segments.
//!
//! Two-solution cases keep a fixed ordering so that replaying the same
//! inputs always selects the same branch:
//!
//! - circle/circle: the default solution lies to the left of the line from
//!   the first centre to the second.
//! - direction/circle: solutions are ordered by distance along the ray, the
//!   nearest one is the default.

use kurbo::{Point, Vec2};

use crate::coords::CoordinateSystem;
use crate::geom::{unit, TINY};

/// A primary solution plus the alternate branch (if there is one).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TwoWay {
    pub default: Point,
    pub other: Option<Point>,
}

impl TwoWay {
    pub fn single(p: Point) -> Self {
        Self { default: p, other: None }
    }

    /// Select a branch. A tangent case has only one solution, which serves
    /// both branches.
    pub fn pick(&self, default: bool) -> Point {
        match (default, self.other) {
            (false, Some(other)) => other,
            _ => self.default,
        }
    }

    /// The branch that was not picked, if distinct.
    pub fn alternate(&self, default: bool) -> Option<Point> {
        if default {
            self.other
        } else {
            self.other.map(|_| self.default)
        }
    }

    pub fn points(&self) -> Vec<Point> {
        let mut v = vec![self.default];
        v.extend(self.other);
        v
    }
}

/// Intersect two circles.
pub fn circle_circle(c1: Point, r1: f64, c2: Point, r2: f64) -> Option<TwoWay> {
    if r1 < TINY || r2 < TINY {
        return None;
    }
    let d = c1.distance(c2);
    if d < TINY {
        return None;
    }
    if d > r1 + r2 + TINY || d < (r1 - r2).abs() - TINY {
        return None;
    }

    let a = (r1 * r1 - r2 * r2 + d * d) / (2.0 * d);
    let u = (c2 - c1) / d;
    let mid = c1 + u * a;
    let h = (r1 * r1 - a * a).max(0.0).sqrt();
    if h < TINY {
        return Some(TwoWay::single(mid));
    }

    let left = Vec2::new(-u.y, u.x);
    Some(TwoWay {
        default: mid + left * h,
        other: Some(mid - left * h),
    })
}

/// Intersect a ray with a circle. Roots behind the ray start are dropped.
pub fn direction_circle(start: Point, bearing: f64, centre: Point, radius: f64) -> Option<TwoWay> {
    if radius < TINY {
        return None;
    }
    let u = unit(bearing);
    let w = start - centre;
    let b = u.dot(w);
    let perp2 = (w.dot(w) - b * b).max(0.0);
    if perp2.sqrt() > radius + TINY {
        return None;
    }

    let h = (radius * radius - perp2).max(0.0).sqrt();
    let roots: Vec<f64> = if h < TINY { vec![-b] } else { vec![-b - h, -b + h] };
    let mut forward = roots.into_iter().filter(|t| *t >= -TINY).map(|t| start + u * t.max(0.0));

    let first = forward.next()?;
    Some(TwoWay {
        default: first,
        other: forward.next(),
    })
}

/// Ray/circle intersection where the radius is a ground distance. Solves
/// once, takes the line scale factor at the first solution and solves again
/// with the reduced radius.
pub fn direction_circle_reduced(
    start: Point,
    bearing: f64,
    centre: Point,
    ground_radius: f64,
    cs: &dyn CoordinateSystem,
) -> Option<TwoWay> {
    let first = direction_circle(start, bearing, centre, ground_radius)?;
    let sfac = cs.line_scale_factor(centre, first.default);
    direction_circle(start, bearing, centre, ground_radius * sfac)
}

/// Parameters (t, k) with `p + r*t == q + s*k`, or `None` when parallel.
fn line_params(p: Point, r: Vec2, q: Point, s: Vec2) -> Option<(f64, f64)> {
    let denom = r.cross(s);
    if denom.abs() < 1e-12 * r.hypot() * s.hypot() || denom == 0.0 {
        return None;
    }
    let qp = q - p;
    Some((qp.cross(s) / denom, qp.cross(r) / denom))
}

fn within(t: f64, len: f64) -> bool {
    let tol = if len > 0.0 { TINY / len } else { 0.0 };
    t >= -tol && t <= 1.0 + tol
}

/// Intersect two rays.
pub fn direction_direction(s1: Point, b1: f64, s2: Point, b2: f64) -> Option<Point> {
    let (sin1, cos1) = b1.sin_cos();
    let (sin2, cos2) = b2.sin_cos();
    let det = sin2 * cos1 - sin1 * cos2;
    if det.abs() < 1e-12 {
        return None;
    }

    let dx = s2.x - s1.x;
    let dy = s2.y - s1.y;
    let prat = (sin2 * dy - cos2 * dx) / det;
    let qrat = (sin1 * dy - cos1 * dx) / det;
    if prat < -TINY || qrat < -TINY {
        return None;
    }
    Some(Point::new(s1.x + prat * sin1, s1.y + prat * cos1))
}

/// Intersect two finite segments.
pub fn segment_segment(a1: Point, a2: Point, b1: Point, b2: Point) -> Option<Point> {
    let r = a2 - a1;
    let s = b2 - b1;
    let (t, k) = line_params(a1, r, b1, s)?;
    if within(t, r.hypot()) && within(k, s.hypot()) {
        Some(a1 + r * t)
    } else {
        None
    }
}

/// Intersect a ray with a finite segment.
pub fn direction_segment(start: Point, bearing: f64, a: Point, b: Point) -> Option<Point> {
    let u = unit(bearing);
    let s = b - a;
    let (t, k) = line_params(start, u, a, s)?;
    if t >= -TINY && within(k, s.hypot()) {
        Some(start + u * t.max(0.0))
    } else {
        None
    }
}

/// Intersect a finite segment with a full circle, ordered from `a` to `b`.
pub fn segment_circle(a: Point, b: Point, centre: Point, radius: f64) -> Vec<Point> {
    let d = b - a;
    let len = d.hypot();
    if len < TINY || radius < TINY {
        return Vec::new();
    }
    let u = d / len;
    let w = a - centre;
    let p = u.dot(w);
    let perp2 = (w.dot(w) - p * p).max(0.0);
    if perp2.sqrt() > radius + TINY {
        return Vec::new();
    }
    let h = (radius * radius - perp2).max(0.0).sqrt();
    let roots: Vec<f64> = if h < TINY { vec![-p] } else { vec![-p - h, -p + h] };
    roots
        .into_iter()
        .filter(|t| *t >= -TINY && *t <= len + TINY)
        .map(|t| a + u * t)
        .collect()
}

/// The candidate nearest to `target`. Ties keep the earlier candidate.
pub fn closest_to(candidates: &[Point], target: Point) -> Option<Point> {
    let mut best: Option<(Point, f64)> = None;
    for &c in candidates {
        let d = c.distance(target);
        match best {
            Some((_, bd)) if bd <= d => {}
            _ => best = Some((c, d)),
        }
    }
    best.map(|(p, _)| p)
}
