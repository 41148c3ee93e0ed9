//! Factory functions for building edits in tests and scripts.

use std::f64::consts::FRAC_PI_2;

use kurbo::Point;

use crate::feature::FeatureId;
use crate::observation::{Direction, DirectionKind, Distance, Leg, Length, Offset, Side};
use crate::operation::EditKind;

// ── Observations ────────────────────────────────────────────────

/// A floating distance in metres.
pub fn metres(value: f64) -> Distance {
    Distance::meters(value)
}

/// A measured length in metres.
pub fn length(value: f64) -> Length {
    Length::Distance(Distance::meters(value))
}

pub fn degrees(d: f64) -> f64 {
    d.to_radians()
}

/// Direction from a point on a bearing given in degrees.
pub fn bearing_from(from: FeatureId, deg: f64) -> Direction {
    Direction::bearing(from, degrees(deg))
}

/// Clockwise angle from a backsight, in degrees.
pub fn angle_from(from: FeatureId, backsight: FeatureId, deg: f64) -> Direction {
    Direction { from, kind: DirectionKind::Angle { backsight, angle: degrees(deg) }, offset: None }
}

/// Turn off the line arriving at `from` from `backsight`, in degrees.
pub fn deflection_from(from: FeatureId, backsight: FeatureId, deg: f64) -> Direction {
    Direction { from, kind: DirectionKind::Deflection { backsight, angle: degrees(deg) }, offset: None }
}

/// Direction from `from` parallel to `start` -> `end`.
pub fn parallel_from(from: FeatureId, start: FeatureId, end: FeatureId) -> Direction {
    Direction { from, kind: DirectionKind::Parallel { start, end }, offset: None }
}

/// Straight leg with floating distances.
pub fn straight_leg(distances: &[f64]) -> Leg {
    Leg::straight(distances.iter().map(|d| metres(*d)).collect())
}

// ── Edits ───────────────────────────────────────────────────────

pub fn new_point(x: f64, y: f64) -> EditKind {
    EditKind::NewPoint { position: Point::new(x, y) }
}

pub fn new_line(start: FeatureId, end: FeatureId) -> EditKind {
    EditKind::NewLine { start, end }
}

pub fn two_distances(from1: FeatureId, d1: f64, from2: FeatureId, d2: f64) -> EditKind {
    EditKind::IntersectTwoDistances {
        from1,
        distance1: length(d1),
        from2,
        distance2: length(d2),
        default: true,
        add_line1: false,
        add_line2: false,
    }
}

pub fn direction_distance(direction: Direction, from: FeatureId, d: f64) -> EditKind {
    EditKind::IntersectDirectionDistance {
        direction,
        from,
        distance: length(d),
        default: true,
        add_direction_line: false,
        add_distance_line: false,
    }
}

pub fn two_directions(direction1: Direction, direction2: Direction) -> EditKind {
    EditKind::IntersectTwoDirections { direction1, direction2, add_line1: false, add_line2: false }
}

/// Where a direction crosses a line, optionally splitting the line there.
pub fn direction_line(direction: Direction, line: FeatureId, close_to: Point, split: bool) -> EditKind {
    EditKind::IntersectDirectionLine { direction, line, close_to, split, add_direction_line: false }
}

pub fn two_lines(line1: FeatureId, line2: FeatureId, close_to: Point) -> EditKind {
    EditKind::IntersectTwoLines { line1, line2, close_to, split1: false, split2: false }
}

pub fn extension(line: FeatureId, from_end: bool, d: f64, add_line: bool) -> EditKind {
    EditKind::LineExtension { line, from_end, length: metres(d), add_line }
}

pub fn simple_split(line: FeatureId, d: f64, from_end: bool) -> EditKind {
    EditKind::SimpleLineSubdivision { line, distance: metres(d), from_end }
}

pub fn attach(line: FeatureId, ratio: f64) -> EditKind {
    EditKind::AttachPoint { line, ratio }
}

/// Parallel at a distance, optionally clipped to terminal lines.
pub fn parallel(
    reference: FeatureId,
    offset: f64,
    side: Side,
    terminal1: Option<FeatureId>,
    terminal2: Option<FeatureId>,
) -> EditKind {
    EditKind::Parallel {
        reference,
        offset: Offset::Distance { distance: metres(offset), side },
        terminal1,
        terminal2,
    }
}

/// Subdivision from `(distance, fixed)` pairs.
pub fn subdivision(line: FeatureId, distances: &[(f64, bool)]) -> EditKind {
    EditKind::LineSubdivision {
        line,
        distances: distances
            .iter()
            .map(|(d, fixed)| if *fixed { metres(*d).fixed() } else { metres(*d) })
            .collect(),
    }
}

pub fn radial(direction: Direction, d: f64, add_line: bool) -> EditKind {
    EditKind::Radial { direction, length: length(d), add_line }
}

/// Circular leg tangent to the legs either side of it.
pub fn circular_leg(radius: f64, clockwise: bool, arc_length: f64) -> Leg {
    Leg::Circular {
        radius: metres(radius),
        clockwise,
        entry_angle: FRAC_PI_2,
        exit_angle: FRAC_PI_2,
        length: metres(arc_length),
    }
}

pub fn connection_path(from: FeatureId, to: FeatureId, legs: Vec<Leg>) -> EditKind {
    EditKind::ConnectionPath { from, to, legs }
}
