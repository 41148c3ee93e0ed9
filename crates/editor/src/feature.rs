//! Spatial features and their dependents.

use std::collections::BTreeSet;
use std::fmt;

use kurbo::{Point, Vec2};

use crate::operation::EditId;

/// Stable index of a feature in the model arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeatureId(pub u32);

impl FeatureId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "f{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureKind {
    Point,
    Line,
    Text,
}

impl FeatureKind {
    pub fn name(&self) -> &'static str {
        match self {
            FeatureKind::Point => "point",
            FeatureKind::Line => "line",
            FeatureKind::Text => "text",
        }
    }
}

/// Line shape. End points (and arc centres) are point features, so a line
/// follows its points when they move.
#[derive(Debug, Clone, PartialEq)]
pub enum LineGeometry {
    Segment {
        start: FeatureId,
        end: FeatureId,
    },
    Arc {
        centre: FeatureId,
        start: FeatureId,
        end: FeatureId,
        clockwise: bool,
    },
}

impl LineGeometry {
    pub fn start(&self) -> FeatureId {
        match self {
            LineGeometry::Segment { start, .. } | LineGeometry::Arc { start, .. } => *start,
        }
    }

    pub fn end(&self) -> FeatureId {
        match self {
            LineGeometry::Segment { end, .. } | LineGeometry::Arc { end, .. } => *end,
        }
    }

    /// True when the line starts or ends at `point`.
    pub fn touches(&self, point: FeatureId) -> bool {
        self.start() == point || self.end() == point
    }

    /// Every point the shape is built from.
    pub fn points(&self) -> Vec<FeatureId> {
        match self {
            LineGeometry::Segment { start, end } => vec![*start, *end],
            LineGeometry::Arc { centre, start, end, .. } => vec![*centre, *start, *end],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Point(Point),
    Line(LineGeometry),
    /// Text placed at a fixed offset from a point.
    Text {
        anchor: FeatureId,
        offset: Vec2,
        text: String,
    },
}

impl Geometry {
    pub fn kind(&self) -> FeatureKind {
        match self {
            Geometry::Point(_) => FeatureKind::Point,
            Geometry::Line(_) => FeatureKind::Line,
            Geometry::Text { .. } => FeatureKind::Text,
        }
    }
}

/// A point, line or text in the map.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    /// Session-qualified identifier
    pub key: String,
    /// The edit that created this feature
    pub creator: EditId,
    /// Entity type from the catalogue
    pub entity: String,
    pub geometry: Geometry,
    /// Inactive features are soft-deleted and can be restored
    pub active: bool,
    /// Whether a line takes part in polygon topology
    pub topological: bool,
    dependents: BTreeSet<EditId>,
}

impl Feature {
    pub(crate) fn new(
        id: FeatureId,
        key: String,
        creator: EditId,
        entity: String,
        geometry: Geometry,
        topological: bool,
    ) -> Self {
        Self {
            id,
            key,
            creator,
            entity,
            geometry,
            active: true,
            topological,
            dependents: BTreeSet::new(),
        }
    }

    pub fn kind(&self) -> FeatureKind {
        self.geometry.kind()
    }

    /// Edits that use this feature as an input.
    pub fn dependents(&self) -> &BTreeSet<EditId> {
        &self.dependents
    }

    pub(crate) fn add_reference(&mut self, edit: EditId) -> bool {
        self.dependents.insert(edit)
    }

    pub(crate) fn cut_reference(&mut self, edit: EditId) -> bool {
        self.dependents.remove(&edit)
    }

    pub fn is_referenced_by_others(&self, edit: EditId) -> bool {
        self.dependents.iter().any(|d| *d != edit)
    }

    pub fn point(&self) -> Option<Point> {
        match self.geometry {
            Geometry::Point(p) => Some(p),
            _ => None,
        }
    }

    pub fn line(&self) -> Option<&LineGeometry> {
        match &self.geometry {
            Geometry::Line(l) => Some(l),
            _ => None,
        }
    }
}
