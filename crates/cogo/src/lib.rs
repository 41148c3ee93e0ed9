//! Coordinate geometry used by the cadastral editor.
//!
//! Every function here is pure: the same inputs always give the same
//! outputs, and "no solution" is reported as `None` rather than an error.
//! Bearings are radians measured clockwise from north (the +y axis).

pub mod adjust;
pub mod coords;
pub mod curve;
pub mod geom;
pub mod intersect;
pub mod parallel;
pub mod path;
pub mod sideshot;

pub use adjust::{proportion, AdjustmentError, Leg};
pub use coords::{CoordinateSystem, PlaneSystem};
pub use curve::{Arc, Curve};
pub use geom::TINY;
pub use intersect::TwoWay;
pub use path::{adjust_path, PathAdjustment, PathLeg, PathPoint, Precision, Turn};

pub use kurbo::{Point, Vec2};
