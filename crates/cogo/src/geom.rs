//! Bearings, polar projection and other plane helpers.

use std::f64::consts::{FRAC_PI_2, TAU};

use kurbo::{Point, Vec2};

/// Distances at or below this (metres) are treated as zero.
pub const TINY: f64 = 1e-6;

/// Normalize an angle to [0, TAU)
pub fn normalize(angle: f64) -> f64 {
    let mut a = angle % TAU;
    if a < 0.0 {
        a += TAU;
    }
    if a >= TAU {
        a -= TAU;
    }
    a
}

/// Bearing from `from` to `to`, clockwise from north.
pub fn bearing(from: Point, to: Point) -> f64 {
    let d = to - from;
    normalize(d.x.atan2(d.y))
}

/// Unit vector pointing along a bearing.
pub fn unit(bearing: f64) -> Vec2 {
    Vec2::new(bearing.sin(), bearing.cos())
}

/// Project `dist` along `bearing` from `from`.
pub fn polar(from: Point, bearing: f64, dist: f64) -> Point {
    from + unit(bearing) * dist
}

/// Perpendicular distance of `p` from the line a→b, positive when `p` lies
/// to the right of the direction of travel. `None` if a and b coincide.
pub fn signed_offset(p: Point, a: Point, b: Point) -> Option<f64> {
    let ab = b - a;
    let len = ab.hypot();
    if len < TINY {
        return None;
    }
    Some(-ab.cross(p - a) / len)
}

/// Start of a direction line shifted sideways by a signed offset.
pub fn offset_start(origin: Point, bearing: f64, offset: f64) -> Point {
    if offset == 0.0 {
        origin
    } else {
        polar(origin, bearing + FRAC_PI_2, offset)
    }
}

/// Rotate `p` about `origin` clockwise by `angle`.
pub fn rotate(p: Point, origin: Point, angle: f64) -> Point {
    let v = p - origin;
    let (s, c) = angle.sin_cos();
    origin + Vec2::new(v.x * c + v.y * s, -v.x * s + v.y * c)
}

/// Scale `p` about `origin`.
pub fn scale_about(p: Point, origin: Point, factor: f64) -> Point {
    origin + (p - origin) * factor
}

/// Clockwise angle swept going from bearing `from` to bearing `to`.
pub fn clockwise_sweep(from: f64, to: f64) -> f64 {
    normalize(to - from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_bearing_quadrants() {
        let o = Point::ORIGIN;
        assert_relative_eq!(bearing(o, Point::new(0.0, 10.0)), 0.0);
        assert_relative_eq!(bearing(o, Point::new(10.0, 0.0)), FRAC_PI_2);
        assert_relative_eq!(bearing(o, Point::new(0.0, -10.0)), PI);
        assert_relative_eq!(bearing(o, Point::new(-10.0, 0.0)), 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_polar_matches_bearing() {
        let from = Point::new(100.0, 200.0);
        let p = polar(from, 0.7, 50.0);
        assert_relative_eq!(p.distance(from), 50.0, epsilon = 1e-9);
        assert_relative_eq!(bearing(from, p), 0.7, epsilon = 1e-12);
    }

    #[test]
    fn test_normalize_wraps_negative() {
        assert_relative_eq!(normalize(-FRAC_PI_2), 3.0 * FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(normalize(TAU + 0.25), 0.25, epsilon = 1e-12);
        assert!(normalize(TAU) < TAU);
    }

    #[test]
    fn test_signed_offset_right_positive() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 100.0);
        assert_relative_eq!(signed_offset(Point::new(5.0, 50.0), a, b).unwrap(), 5.0);
        assert_relative_eq!(signed_offset(Point::new(-3.0, 10.0), a, b).unwrap(), -3.0);
        assert!(signed_offset(Point::new(1.0, 1.0), a, a).is_none());
    }

    #[test]
    fn test_offset_start_sides() {
        let o = Point::ORIGIN;
        let right = offset_start(o, 0.0, 10.0);
        assert_relative_eq!(right.x, 10.0, epsilon = 1e-12);
        let left = offset_start(o, 0.0, -10.0);
        assert_relative_eq!(left.x, -10.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rotate_clockwise() {
        let p = rotate(Point::new(0.0, 10.0), Point::ORIGIN, FRAC_PI_2);
        assert_relative_eq!(p.x, 10.0, epsilon = 1e-12);
        assert_relative_eq!(p.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clockwise_sweep() {
        assert_relative_eq!(clockwise_sweep(0.0, FRAC_PI_2), FRAC_PI_2);
        assert_relative_eq!(clockwise_sweep(FRAC_PI_2, 0.0), 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }
}
