//! Ground to plan reduction.

use kurbo::Point;

/// Converts ground distances to plan (grid) distances.
pub trait CoordinateSystem {
    /// Factor that turns a ground distance measured between two plan
    /// positions into a plan distance.
    fn line_scale_factor(&self, from: Point, to: Point) -> f64;

    /// Convenience: reduce a ground distance between two positions.
    fn reduce(&self, ground: f64, from: Point, to: Point) -> f64 {
        ground * self.line_scale_factor(from, to)
    }
}

/// A flat projection with one constant scale factor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaneSystem {
    pub scale: f64,
}

impl PlaneSystem {
    pub fn new(scale: f64) -> Self {
        Self { scale }
    }
}

impl Default for PlaneSystem {
    fn default() -> Self {
        Self { scale: 1.0 }
    }
}

impl CoordinateSystem for PlaneSystem {
    fn line_scale_factor(&self, _from: Point, _to: Point) -> f64 {
        self.scale
    }
}
