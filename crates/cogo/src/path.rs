//! Connection paths: legs projected from a start point and fitted to an
//! end point with a rotation and a uniform scale (Helmert adjustment).

use std::f64::consts::PI;
use std::fmt;

use kurbo::Point;

use crate::adjust::AdjustmentError;
use crate::coords::CoordinateSystem;
use crate::geom::{bearing, normalize, polar, rotate, scale_about, TINY};

/// Angle that starts a straight leg.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Turn {
    pub angle: f64,
    /// Measured from the extension of the previous leg rather than from the
    /// backsight.
    pub deflection: bool,
}

/// One leg of a connection path. Lengths are ground distances in metres.
#[derive(Debug, Clone, PartialEq)]
pub enum PathLeg {
    Straight {
        turn: Option<Turn>,
        distances: Vec<f64>,
    },
    Circular {
        radius: f64,
        clockwise: bool,
        /// Angle between the backsight and the radial at the curve start.
        entry_angle: f64,
        /// Angle between the radial at the curve end and the next leg.
        exit_angle: f64,
        length: f64,
    },
}

impl PathLeg {
    /// How many positions this leg produces.
    pub fn point_count(&self) -> usize {
        match self {
            PathLeg::Straight { distances, .. } => distances.len(),
            PathLeg::Circular { .. } => 2,
        }
    }
}

/// A projected position. Circular legs produce their centre before their
/// end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub position: Point,
    pub centre: bool,
}

/// How well the observed path closed on its end point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Precision {
    Exact,
    /// 1 part in N
    Ratio(f64),
}

impl fmt::Display for Precision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Precision::Exact => write!(f, "exact"),
            Precision::Ratio(n) => write!(f, "1:{:.0}", n),
        }
    }
}

/// Result of fitting a path between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct PathAdjustment {
    /// Rotation applied to the projected path (radians, clockwise)
    pub rotation: f64,
    /// want-distance / got-distance
    pub scale: f64,
    /// Gap left after rotation and line scale reduction
    pub misclosure: f64,
    pub precision: Precision,
    /// Adjusted positions, in leg order
    pub points: Vec<PathPoint>,
}

/// Walk the legs from `start` with an initial bearing.
pub fn project(start: Point, initial: f64, legs: &[PathLeg]) -> Result<Vec<PathPoint>, AdjustmentError> {
    if legs.is_empty() {
        return Err(AdjustmentError::Empty);
    }

    let mut out = Vec::new();
    let mut brg = initial;
    let mut pos = start;
    let mut index = 0;

    for leg in legs {
        match leg {
            PathLeg::Straight { turn, distances } => {
                if distances.is_empty() {
                    return Err(AdjustmentError::Empty);
                }
                if let Some(t) = turn {
                    brg = if t.deflection { brg + t.angle } else { brg + t.angle - PI };
                }
                for d in distances {
                    if *d <= 0.0 {
                        return Err(AdjustmentError::NonPositive { index });
                    }
                    pos = polar(pos, brg, *d);
                    out.push(PathPoint { position: pos, centre: false });
                    index += 1;
                }
            }
            PathLeg::Circular { radius, clockwise, entry_angle, exit_angle, length } => {
                if *radius < TINY || *length <= 0.0 {
                    return Err(AdjustmentError::NonPositive { index });
                }
                let to_centre = if *clockwise {
                    brg + (PI - entry_angle)
                } else {
                    brg - (PI - entry_angle)
                };
                let centre = polar(pos, to_centre, *radius);
                let turn = length / radius;
                let radial = to_centre + PI;
                let end_radial = if *clockwise { radial + turn } else { radial - turn };
                let end = polar(centre, end_radial, *radius);
                out.push(PathPoint { position: centre, centre: true });
                out.push(PathPoint { position: end, centre: false });

                let back = end_radial + PI;
                brg = if *clockwise {
                    back - (PI - exit_angle)
                } else {
                    back + (PI - exit_angle)
                };
                pos = end;
                index += 1;
            }
        }
    }
    Ok(out)
}

/// Fit a path between `from` and `to`.
pub fn adjust_path(
    from: Point,
    to: Point,
    legs: &[PathLeg],
    cs: &dyn CoordinateSystem,
) -> Result<PathAdjustment, AdjustmentError> {
    let raw = project(from, 0.0, legs)?;
    let got_end = raw
        .iter()
        .rev()
        .find(|p| !p.centre)
        .map(|p| p.position)
        .ok_or(AdjustmentError::Empty)?;

    let gotdist = from.distance(got_end);
    let wantdist = from.distance(to);
    if gotdist < TINY || wantdist < TINY {
        return Err(AdjustmentError::DegeneratePath);
    }

    let rotation = normalize(bearing(from, to) - bearing(from, got_end));
    let lsf = cs.line_scale_factor(from, to);
    let reduced_end = scale_about(rotate(got_end, from, rotation), from, lsf);
    let misclosure = reduced_end.distance(to);
    let precision = if misclosure <= TINY {
        Precision::Exact
    } else {
        Precision::Ratio(wantdist / misclosure)
    };
    let scale = wantdist / gotdist;

    tracing::debug!(rotation, scale, misclosure, "connection path adjusted");

    let points = raw
        .into_iter()
        .map(|p| PathPoint {
            position: scale_about(rotate(p.position, from, rotation), from, scale),
            centre: p.centre,
        })
        .collect();

    Ok(PathAdjustment { rotation, scale, misclosure, precision, points })
}
