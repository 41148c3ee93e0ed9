//! Collaborators the edit engine calls: a spatial index for point lookup,
//! the coordinate system for ground to plan reduction, and the entity
//! catalogue that classifies new features.

use std::collections::BTreeMap;

use cogo::{CoordinateSystem, PlaneSystem};
use kurbo::Point;

use crate::feature::{FeatureId, FeatureKind};
use crate::settings::EditorSettings;

/// Point lookup by position.
pub trait SpatialIndex {
    fn insert_point(&mut self, id: FeatureId, position: Point);
    fn remove_point(&mut self, id: FeatureId);
    /// Nearest indexed point within `tolerance` of `position`.
    fn nearest_point(&self, position: Point, tolerance: f64) -> Option<FeatureId>;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Brute-force index. Ties go to the lowest feature id.
#[derive(Debug, Default, Clone)]
pub struct LinearIndex {
    points: BTreeMap<FeatureId, Point>,
}

impl LinearIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SpatialIndex for LinearIndex {
    fn insert_point(&mut self, id: FeatureId, position: Point) {
        self.points.insert(id, position);
    }

    fn remove_point(&mut self, id: FeatureId) {
        self.points.remove(&id);
    }

    fn nearest_point(&self, position: Point, tolerance: f64) -> Option<FeatureId> {
        let mut best: Option<(FeatureId, f64)> = None;
        for (id, p) in &self.points {
            let d = p.distance(position);
            if d > tolerance {
                continue;
            }
            match best {
                Some((_, bd)) if bd <= d => {}
                _ => best = Some((*id, d)),
            }
        }
        best.map(|(id, _)| id)
    }

    fn len(&self) -> usize {
        self.points.len()
    }
}

/// Default classification for new features.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityCatalogue {
    pub point: String,
    pub line: String,
    pub text: String,
    /// Whether new lines take part in topology
    pub topological_lines: bool,
}

impl Default for EntityCatalogue {
    fn default() -> Self {
        Self {
            point: "Survey point".into(),
            line: "Boundary".into(),
            text: "Annotation".into(),
            topological_lines: true,
        }
    }
}

impl EntityCatalogue {
    pub fn default_entity(&self, kind: FeatureKind) -> &str {
        match kind {
            FeatureKind::Point => &self.point,
            FeatureKind::Line => &self.line,
            FeatureKind::Text => &self.text,
        }
    }

    pub fn is_topological(&self, kind: FeatureKind) -> bool {
        kind == FeatureKind::Line && self.topological_lines
    }
}

/// Everything the model consumes from outside.
pub struct Services {
    pub index: Box<dyn SpatialIndex>,
    pub coords: Box<dyn CoordinateSystem>,
    pub catalogue: EntityCatalogue,
    /// Two points closer than this are the same point
    pub point_tolerance: f64,
}

impl Default for Services {
    fn default() -> Self {
        Self {
            index: Box::new(LinearIndex::new()),
            coords: Box::new(PlaneSystem::default()),
            catalogue: EntityCatalogue::default(),
            point_tolerance: 0.001,
        }
    }
}

impl Services {
    pub fn from_settings(settings: &EditorSettings) -> Self {
        Self {
            index: Box::new(LinearIndex::new()),
            coords: Box::new(PlaneSystem::new(settings.coordinates.scale_factor)),
            catalogue: EntityCatalogue {
                point: settings.entities.point.clone(),
                line: settings.entities.line.clone(),
                text: settings.entities.text.clone(),
                topological_lines: settings.entities.topological_lines,
            },
            point_tolerance: settings.tolerance.point_match,
        }
    }

    pub fn with_scale(scale: f64) -> Self {
        Self {
            coords: Box::new(PlaneSystem::new(scale)),
            ..Self::default()
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("indexed_points", &self.index.len())
            .field("catalogue", &self.catalogue)
            .field("point_tolerance", &self.point_tolerance)
            .finish()
    }
}
