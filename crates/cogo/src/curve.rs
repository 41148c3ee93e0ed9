//! Straight and circular line geometry.

use std::f64::consts::TAU;

use kurbo::{Line, Point};

use crate::geom::{bearing, clockwise_sweep, polar, TINY};
use crate::intersect::{direction_circle, direction_segment, segment_circle, segment_segment};

const ANGLE_TOLERANCE: f64 = 1e-9;

/// A circular arc between two positions on a circle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Arc {
    pub centre: Point,
    pub start: Point,
    pub end: Point,
    pub clockwise: bool,
}

impl Arc {
    pub fn new(centre: Point, start: Point, end: Point, clockwise: bool) -> Self {
        Self { centre, start, end, clockwise }
    }

    pub fn radius(&self) -> f64 {
        self.centre.distance(self.start)
    }

    /// Angle swept from start to end in the arc's own direction. An arc
    /// that closes on itself sweeps a full turn.
    pub fn sweep(&self) -> f64 {
        let sb = bearing(self.centre, self.start);
        let eb = bearing(self.centre, self.end);
        let s = if self.clockwise {
            clockwise_sweep(sb, eb)
        } else {
            clockwise_sweep(eb, sb)
        };
        if s < ANGLE_TOLERANCE {
            TAU
        } else {
            s
        }
    }

    pub fn length(&self) -> f64 {
        self.radius() * self.sweep()
    }

    /// Whether a radial bearing from the centre falls on the arc.
    pub fn contains_bearing(&self, b: f64) -> bool {
        let from = if self.clockwise {
            bearing(self.centre, self.start)
        } else {
            bearing(self.centre, self.end)
        };
        let s = clockwise_sweep(from, b);
        s <= self.sweep() + ANGLE_TOLERANCE || s >= TAU - ANGLE_TOLERANCE
    }

    pub fn contains(&self, p: Point) -> bool {
        self.contains_bearing(bearing(self.centre, p))
    }

    /// Position `dist` along the arc from its start.
    pub fn point_at(&self, dist: f64) -> Point {
        let r = self.radius();
        let turn = dist / r;
        let sb = bearing(self.centre, self.start);
        let b = if self.clockwise { sb + turn } else { sb - turn };
        polar(self.centre, b, r)
    }

    /// Same circle, new radius. End positions move radially.
    pub fn with_radius(&self, radius: f64) -> Option<Arc> {
        let r = self.radius();
        if r < TINY || radius < TINY {
            return None;
        }
        let k = radius / r;
        Some(Arc {
            centre: self.centre,
            start: self.centre + (self.start - self.centre) * k,
            end: self.centre + (self.end - self.centre) * k,
            clockwise: self.clockwise,
        })
    }
}

/// The shape of a line feature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Segment(Line),
    Arc(Arc),
}

impl Curve {
    pub fn segment(start: Point, end: Point) -> Self {
        Curve::Segment(Line::new(start, end))
    }

    pub fn start(&self) -> Point {
        match self {
            Curve::Segment(l) => l.p0,
            Curve::Arc(a) => a.start,
        }
    }

    pub fn end(&self) -> Point {
        match self {
            Curve::Segment(l) => l.p1,
            Curve::Arc(a) => a.end,
        }
    }

    pub fn length(&self) -> f64 {
        match self {
            Curve::Segment(l) => l.p0.distance(l.p1),
            Curve::Arc(a) => a.length(),
        }
    }

    /// Position `dist` along the curve from its start.
    pub fn point_at(&self, dist: f64) -> Point {
        match self {
            Curve::Segment(l) => {
                let len = self.length();
                if len < TINY {
                    l.p0
                } else {
                    l.p0 + (l.p1 - l.p0) * (dist / len)
                }
            }
            Curve::Arc(a) => a.point_at(dist),
        }
    }

    /// Position `dist` beyond one end, continuing the line or its circle.
    /// `None` for a zero extension, or one that would wrap back onto an arc.
    pub fn extension(&self, from_end: bool, dist: f64) -> Option<Point> {
        if dist < TINY {
            return None;
        }
        match self {
            Curve::Segment(l) => {
                if l.p0.distance(l.p1) < TINY {
                    return None;
                }
                Some(if from_end {
                    polar(l.p1, bearing(l.p0, l.p1), dist)
                } else {
                    polar(l.p0, bearing(l.p1, l.p0), dist)
                })
            }
            Curve::Arc(a) => {
                let r = a.radius();
                if r < TINY || dist >= TAU * r - a.length() {
                    return None;
                }
                // Bearings grow clockwise.
                let turn = if a.clockwise { dist / r } else { -dist / r };
                let b = if from_end {
                    bearing(a.centre, a.end) + turn
                } else {
                    bearing(a.centre, a.start) - turn
                };
                Some(polar(a.centre, b, r))
            }
        }
    }

    /// Where a ray crosses this curve, nearest along the ray first.
    pub fn intersect_direction(&self, start: Point, b: f64) -> Vec<Point> {
        match self {
            Curve::Segment(l) => direction_segment(start, b, l.p0, l.p1).into_iter().collect(),
            Curve::Arc(a) => direction_circle(start, b, a.centre, a.radius())
                .map(|t| t.points())
                .unwrap_or_default()
                .into_iter()
                .filter(|p| a.contains(*p))
                .collect(),
        }
    }

    /// Every crossing with another curve.
    pub fn intersect(&self, other: &Curve) -> Vec<Point> {
        match (self, other) {
            (Curve::Segment(a), Curve::Segment(b)) => {
                segment_segment(a.p0, a.p1, b.p0, b.p1).into_iter().collect()
            }
            (Curve::Segment(l), Curve::Arc(a)) | (Curve::Arc(a), Curve::Segment(l)) => {
                segment_circle(l.p0, l.p1, a.centre, a.radius())
                    .into_iter()
                    .filter(|p| a.contains(*p))
                    .collect()
            }
            (Curve::Arc(a), Curve::Arc(b)) => {
                crate::intersect::circle_circle(a.centre, a.radius(), b.centre, b.radius())
                    .map(|t| t.points())
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|p| a.contains(*p) && b.contains(*p))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn quarter() -> Arc {
        // Clockwise from north to east around the origin.
        Arc::new(Point::ORIGIN, Point::new(0.0, 10.0), Point::new(10.0, 0.0), true)
    }

    #[test]
    fn test_arc_sweep_and_length() {
        let a = quarter();
        assert_relative_eq!(a.sweep(), FRAC_PI_2, epsilon = 1e-12);
        assert_relative_eq!(a.length(), 10.0 * FRAC_PI_2, epsilon = 1e-9);

        let ccw = Arc { clockwise: false, ..a };
        assert_relative_eq!(ccw.sweep(), 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_arc_contains() {
        let a = quarter();
        assert!(a.contains(Point::new(7.0, 7.0)));
        assert!(!a.contains(Point::new(-7.0, -7.0)));
        assert!(a.contains(Point::new(0.0, 10.0)));
        assert!(a.contains(Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_arc_point_at() {
        let a = quarter();
        let mid = a.point_at(a.length() / 2.0);
        assert_relative_eq!(bearing(Point::ORIGIN, mid), PI / 4.0, epsilon = 1e-12);
        let end = a.point_at(a.length());
        assert_relative_eq!(end.x, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_arc_with_radius() {
        let a = quarter().with_radius(5.0).unwrap();
        assert_relative_eq!(a.start.y, 5.0, epsilon = 1e-12);
        assert_relative_eq!(a.end.x, 5.0, epsilon = 1e-12);
        assert!(quarter().with_radius(0.0).is_none());
    }

    #[test]
    fn test_segment_point_at() {
        let c = Curve::segment(Point::ORIGIN, Point::new(100.0, 0.0));
        assert_relative_eq!(c.point_at(25.0).x, 25.0);
        assert_relative_eq!(c.length(), 100.0);
    }

    #[test]
    fn test_segment_extension() {
        let c = Curve::segment(Point::ORIGIN, Point::new(10.0, 0.0));
        let e = c.extension(true, 5.0).unwrap();
        assert_relative_eq!(e.x, 15.0, epsilon = 1e-9);
        assert_relative_eq!(e.y, 0.0, epsilon = 1e-9);
        let s = c.extension(false, 5.0).unwrap();
        assert_relative_eq!(s.x, -5.0, epsilon = 1e-9);
        assert!(c.extension(true, 0.0).is_none());
    }

    #[test]
    fn test_arc_extension_follows_circle() {
        let c = Curve::Arc(quarter());
        let quarter_turn = 10.0 * FRAC_PI_2;
        let e = c.extension(true, quarter_turn).unwrap();
        assert_relative_eq!(e.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(e.y, -10.0, epsilon = 1e-9);
        let s = c.extension(false, quarter_turn).unwrap();
        assert_relative_eq!(s.x, -10.0, epsilon = 1e-9);
        assert_relative_eq!(s.y, 0.0, epsilon = 1e-9);
        // Only three quarters of the circle are free.
        assert!(c.extension(true, 10.0 * 1.6 * PI).is_none());
    }

    #[test]
    fn test_ray_against_arc_filters_outside() {
        let c = Curve::Arc(quarter());
        // Ray travelling east along y=5 hits the circle at x=-8.66 and x=8.66,
        // only the second lies on the quarter arc.
        let hits = c.intersect_direction(Point::new(-20.0, 5.0), FRAC_PI_2);
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].x, 75f64.sqrt(), epsilon = 1e-9);
    }

    #[test]
    fn test_segment_against_arc() {
        let seg = Curve::segment(Point::ORIGIN, Point::new(20.0, 20.0));
        let hits = seg.intersect(&Curve::Arc(quarter()));
        assert_eq!(hits.len(), 1);
        assert_relative_eq!(hits[0].x, 10.0 / 2f64.sqrt(), epsilon = 1e-9);
    }
}
