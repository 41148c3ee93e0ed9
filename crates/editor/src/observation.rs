//! Observations: the measured inputs of an edit.
//!
//! An observation that names a feature (a backsight, an offset point) makes
//! the owning edit a dependent of that feature, the same as a direct input.

pub use shared::{DistanceUnit, Side, StartAngle};

use crate::feature::FeatureId;

/// A measured ground distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    pub value: f64,
    pub unit: DistanceUnit,
    /// Excluded from proportional adjustment
    pub fixed: bool,
}

impl Distance {
    pub fn new(value: f64, unit: DistanceUnit) -> Self {
        Self { value, unit, fixed: false }
    }

    pub fn meters(value: f64) -> Self {
        Self::new(value, DistanceUnit::Meters)
    }

    pub fn fixed(self) -> Self {
        Self { fixed: true, ..self }
    }

    pub fn in_meters(&self) -> f64 {
        self.unit.to_meters(self.value)
    }
}

/// A length given either as a measurement or by a point whose distance
/// from the origin supplies it. Point lengths are already planar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Length {
    Distance(Distance),
    OffsetPoint(FeatureId),
}

impl Length {
    pub fn feature(&self) -> Option<FeatureId> {
        match self {
            Length::Distance(_) => None,
            Length::OffsetPoint(p) => Some(*p),
        }
    }
}

impl From<Distance> for Length {
    fn from(d: Distance) -> Self {
        Length::Distance(d)
    }
}

/// Sideways shift of a direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Offset {
    Distance { distance: Distance, side: Side },
    /// The shifted direction passes through this point
    Point(FeatureId),
}

impl Offset {
    pub fn feature(&self) -> Option<FeatureId> {
        match self {
            Offset::Distance { .. } => None,
            Offset::Point(p) => Some(*p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DirectionKind {
    /// Bearing in radians, clockwise from north
    Bearing(f64),
    /// Clockwise angle from the backsight
    Angle { backsight: FeatureId, angle: f64 },
    /// Clockwise turn from the extension of backsight -> origin
    Deflection { backsight: FeatureId, angle: f64 },
    /// Parallel to the line between two points
    Parallel { start: FeatureId, end: FeatureId },
}

/// A direction from a point, optionally shifted sideways.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Direction {
    pub from: FeatureId,
    pub kind: DirectionKind,
    pub offset: Option<Offset>,
}

impl Direction {
    pub fn bearing(from: FeatureId, bearing: f64) -> Self {
        Self { from, kind: DirectionKind::Bearing(bearing), offset: None }
    }

    pub fn with_offset(self, offset: Offset) -> Self {
        Self { offset: Some(offset), ..self }
    }

    /// Every feature the direction refers to.
    pub fn features(&self) -> Vec<FeatureId> {
        let mut out = vec![self.from];
        match self.kind {
            DirectionKind::Bearing(_) => {}
            DirectionKind::Angle { backsight, .. } | DirectionKind::Deflection { backsight, .. } => {
                out.push(backsight)
            }
            DirectionKind::Parallel { start, end } => {
                out.push(start);
                out.push(end);
            }
        }
        out.extend(self.offset.and_then(|o| o.feature()));
        out
    }

    /// A direction whose reference points coincide cannot define a bearing.
    pub fn is_self_referential(&self) -> bool {
        match self.kind {
            DirectionKind::Bearing(_) => false,
            DirectionKind::Angle { backsight, .. } | DirectionKind::Deflection { backsight, .. } => {
                backsight == self.from
            }
            DirectionKind::Parallel { start, end } => start == end,
        }
    }
}

/// One leg of a connection path.
#[derive(Debug, Clone, PartialEq)]
pub enum Leg {
    Straight {
        start_angle: Option<StartAngle>,
        distances: Vec<Distance>,
    },
    Circular {
        radius: Distance,
        clockwise: bool,
        entry_angle: f64,
        exit_angle: f64,
        length: Distance,
    },
}

impl Leg {
    pub fn straight(distances: Vec<Distance>) -> Self {
        Leg::Straight { start_angle: None, distances }
    }

    /// Layout key: two legs with the same shape produce the same features.
    pub fn shape(&self) -> (bool, usize) {
        match self {
            Leg::Straight { distances, .. } => (false, distances.len()),
            Leg::Circular { .. } => (true, 2),
        }
    }

    pub fn to_path_leg(&self) -> cogo::PathLeg {
        match self {
            Leg::Straight { start_angle, distances } => cogo::PathLeg::Straight {
                turn: start_angle.map(|a| cogo::Turn { angle: a.angle, deflection: a.deflection }),
                distances: distances.iter().map(|d| d.in_meters()).collect(),
            },
            Leg::Circular { radius, clockwise, entry_angle, exit_angle, length } => {
                cogo::PathLeg::Circular {
                    radius: radius.in_meters(),
                    clockwise: *clockwise,
                    entry_angle: *entry_angle,
                    exit_angle: *exit_angle,
                    length: length.in_meters(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_units() {
        let d = Distance::new(2.0, DistanceUnit::Chains);
        assert!((d.in_meters() - 40.2336).abs() < 1e-9);
        assert!(Distance::meters(5.0).fixed().fixed);
    }

    #[test]
    fn test_direction_features() {
        let d = Direction {
            from: FeatureId(1),
            kind: DirectionKind::Angle { backsight: FeatureId(2), angle: 0.3 },
            offset: Some(Offset::Point(FeatureId(4))),
        };
        assert_eq!(d.features(), vec![FeatureId(1), FeatureId(2), FeatureId(4)]);
        assert!(!d.is_self_referential());

        let p = Direction {
            from: FeatureId(1),
            kind: DirectionKind::Parallel { start: FeatureId(3), end: FeatureId(3) },
            offset: None,
        };
        assert!(p.is_self_referential());
    }

    #[test]
    fn test_leg_shape() {
        let a = Leg::straight(vec![Distance::meters(1.0), Distance::meters(2.0)]);
        let b = Leg::straight(vec![Distance::meters(3.0), Distance::meters(4.0)]);
        assert_eq!(a.shape(), b.shape());
        match a.to_path_leg() {
            cogo::PathLeg::Straight { distances, .. } => assert_eq!(distances, vec![1.0, 2.0]),
            other => panic!("unexpected {:?}", other),
        }
    }
}
