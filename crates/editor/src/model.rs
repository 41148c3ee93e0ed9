//! The map model: an arena of features plus the ordered edit history.
//!
//! Lifecycle transitions (execute, rollforward, undo) live in
//! `lifecycle.rs`, corrections and the recompute walk in `coordinator.rs`.
//! This file owns the arena itself and the geometry lookups every
//! calculation goes through.

use std::collections::BTreeSet;
use std::f64::consts::FRAC_PI_2;

use cogo::geom::{bearing, offset_start, polar, signed_offset};
use cogo::{Arc, Curve, TINY};
use kurbo::Point;

use crate::error::{infeasible, invalid, EditError, Result};
use crate::feature::{Feature, FeatureId, FeatureKind, Geometry, LineGeometry};
use crate::observation::{Direction, DirectionKind, Length, Offset};
use crate::operation::{Edit, EditId};
use crate::services::Services;

/// A direction reduced to a start position and a bearing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedDirection {
    /// Position of the point the direction is observed from
    pub origin: Point,
    /// Where the direction line starts after any offset
    pub start: Point,
    pub bearing: f64,
}

/// Features, edits and the services they are calculated with.
pub struct MapModel {
    session: String,
    pub(crate) features: Vec<Feature>,
    pub(crate) edits: Vec<Edit>,
    pub(crate) services: Services,
    version: u64,
}

impl MapModel {
    /// Empty model with a fresh session id.
    pub fn new(services: Services) -> Self {
        Self::with_session(uuid::Uuid::new_v4().to_string(), services)
    }

    pub fn with_session(session: impl Into<String>, services: Services) -> Self {
        Self {
            session: session.into(),
            features: Vec::new(),
            edits: Vec::new(),
            services,
            version: 0,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn session(&self) -> &str {
        &self.session
    }

    /// Bumped by every change to the model.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn bump_version(&mut self) {
        self.version += 1;
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.get(id.index())
    }

    pub fn edit(&self, id: EditId) -> Option<&Edit> {
        self.edits.get(id.index())
    }

    pub fn edits(&self) -> &[Edit] {
        &self.edits
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn active_features(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter().filter(|f| f.active)
    }

    /// The most recent edit that is still active.
    pub fn last_edit(&self) -> Option<EditId> {
        self.edits.iter().rev().find(|e| e.is_active()).map(|e| e.id)
    }

    pub(crate) fn next_edit_id(&self) -> EditId {
        EditId(self.edits.len() as u32)
    }

    pub(crate) fn require_feature(&self, id: FeatureId) -> Result<&Feature> {
        self.feature(id).ok_or_else(|| invalid(format!("feature {} does not exist", id)))
    }

    pub(crate) fn require_edit(&self, id: EditId) -> Result<&Edit> {
        self.edit(id).ok_or_else(|| invalid(format!("edit {} does not exist", id)))
    }

    // ── Geometry lookups ──────────────────────────────────────

    /// Current position of a point feature.
    pub fn position_of(&self, id: FeatureId) -> Result<Point> {
        let f = self.require_feature(id)?;
        f.point()
            .ok_or_else(|| invalid(format!("{} is a {}, not a point", id, f.kind().name())))
    }

    /// Current shape of a line feature, with its end points resolved.
    pub fn curve_of(&self, id: FeatureId) -> Result<Curve> {
        let f = self.require_feature(id)?;
        match f.line() {
            Some(LineGeometry::Segment { start, end }) => {
                Ok(Curve::segment(self.position_of(*start)?, self.position_of(*end)?))
            }
            Some(LineGeometry::Arc { centre, start, end, clockwise }) => Ok(Curve::Arc(Arc::new(
                self.position_of(*centre)?,
                self.position_of(*start)?,
                self.position_of(*end)?,
                *clockwise,
            ))),
            None => Err(invalid(format!("{} is a {}, not a line", id, f.kind().name()))),
        }
    }

    fn bearing_between(&self, from: FeatureId, to: FeatureId) -> Result<f64> {
        let a = self.position_of(from)?;
        let b = self.position_of(to)?;
        if a.distance(b) < TINY {
            return Err(infeasible(format!("{} and {} coincide, no bearing between them", from, to)));
        }
        Ok(bearing(a, b))
    }

    /// Start position and bearing of a direction observation.
    pub fn resolve_direction(&self, d: &Direction) -> Result<ResolvedDirection> {
        let origin = self.position_of(d.from)?;
        let b = match d.kind {
            DirectionKind::Bearing(b) => b,
            DirectionKind::Angle { backsight, angle } => self.bearing_between(d.from, backsight)? + angle,
            DirectionKind::Deflection { backsight, angle } => {
                self.bearing_between(backsight, d.from)? + angle
            }
            DirectionKind::Parallel { start, end } => self.bearing_between(start, end)?,
        };
        let b = cogo::geom::normalize(b);

        let start = match d.offset {
            None => origin,
            Some(Offset::Distance { distance, side }) => {
                let ground = distance.in_meters();
                let beside = polar(origin, b + side.sign() * FRAC_PI_2, ground);
                let plan = self.services.coords.reduce(ground, origin, beside);
                offset_start(origin, b, side.sign() * plan)
            }
            Some(Offset::Point(p)) => {
                let through = self.position_of(p)?;
                let ahead = polar(origin, b, 1.0);
                let off = signed_offset(through, origin, ahead)
                    .ok_or_else(|| infeasible("direction offset is undefined"))?;
                offset_start(origin, b, off)
            }
        };

        Ok(ResolvedDirection { origin, start, bearing: b })
    }

    /// A length in metres measured from `origin`, and whether it is already
    /// planar (taken from an offset point).
    pub fn resolve_length(&self, length: &Length, origin: Point) -> Result<(f64, bool)> {
        match length {
            Length::Distance(d) => Ok((d.in_meters(), false)),
            Length::OffsetPoint(p) => Ok((origin.distance(self.position_of(*p)?), true)),
        }
    }

    // ── Dependency graph ──────────────────────────────────────

    /// Edits that must be calculated before `id`: the creators of its
    /// inputs, and for an update the edit it revises.
    pub fn required_edits(&self, id: EditId) -> BTreeSet<EditId> {
        let Some(edit) = self.edit(id) else {
            return BTreeSet::new();
        };
        let mut out: BTreeSet<EditId> = edit
            .required_features()
            .into_iter()
            .filter_map(|f| self.feature(f))
            .map(|f| f.creator)
            .filter(|c| *c != id)
            .collect();
        if let Some(revised) = edit.revised() {
            out.insert(revised);
        }
        out
    }

    /// Active updates that revise `id`.
    pub(crate) fn active_updates_of(&self, id: EditId) -> Vec<EditId> {
        self.edits
            .iter()
            .filter(|e| e.is_active() && e.revised() == Some(id))
            .map(|e| e.id)
            .collect()
    }

    /// Verify that the dependents of every feature match what active edits
    /// require, that edits only read earlier work, and that activity flags
    /// agree with the history.
    pub fn check_integrity(&self) -> Result<()> {
        let mut expected: Vec<BTreeSet<EditId>> = vec![BTreeSet::new(); self.features.len()];
        let mut deactivated: BTreeSet<FeatureId> = BTreeSet::new();

        for edit in self.edits.iter().filter(|e| e.is_active()) {
            for f in edit.required_features() {
                let feature = self
                    .feature(f)
                    .ok_or_else(|| corrupt(format!("edit {} requires missing feature {}", edit.id, f)))?;
                if feature.creator > edit.id {
                    return Err(corrupt(format!(
                        "edit {} requires {} created later by {}",
                        edit.id, f, feature.creator
                    )));
                }
                expected[f.index()].insert(edit.id);
            }
            if let Some(revised) = edit.revised() {
                if revised >= edit.id {
                    return Err(corrupt(format!("update {} revises later edit {}", edit.id, revised)));
                }
            }
            deactivated.extend(edit.deactivated.iter().copied());
        }

        for (feature, want) in self.features.iter().zip(&expected) {
            if feature.dependents() != want {
                return Err(corrupt(format!(
                    "{} lists dependents {:?}, active edits require {:?}",
                    feature.id,
                    feature.dependents(),
                    want
                )));
            }
            let creator_active = self.edit(feature.creator).map(|e| e.is_active()).unwrap_or(false);
            let should_be_active = creator_active && !deactivated.contains(&feature.id);
            if feature.active != should_be_active {
                return Err(corrupt(format!(
                    "{} is {} but its history says otherwise",
                    feature.id,
                    if feature.active { "active" } else { "inactive" }
                )));
            }
        }
        Ok(())
    }

    // ── Feature arena ─────────────────────────────────────────

    /// Append a feature created by `creator`.
    pub(crate) fn add_feature(&mut self, creator: EditId, geometry: Geometry) -> FeatureId {
        let id = FeatureId(self.features.len() as u32);
        let kind = geometry.kind();
        let entity = self.services.catalogue.default_entity(kind).to_string();
        let topological = self.services.catalogue.is_topological(kind);
        if let Geometry::Point(p) = geometry {
            self.services.index.insert_point(id, p);
        }
        let key = format!("{}:{}", self.session, id.0);
        self.features.push(Feature::new(id, key, creator, entity, geometry, topological));
        id
    }

    /// An active point within tolerance of `position`, or a new one created
    /// by `creator`. The flag is true when an existing point was reused.
    pub(crate) fn ensure_point_exists(&mut self, position: Point, creator: EditId) -> (FeatureId, bool) {
        let tolerance = self.services.point_tolerance;
        let existing = self
            .services
            .index
            .nearest_point(position, tolerance)
            .filter(|id| self.feature(*id).map(|f| f.active && f.kind() == FeatureKind::Point).unwrap_or(false));
        match existing {
            Some(id) => (id, true),
            None => (self.add_feature(creator, Geometry::Point(position)), false),
        }
    }

    /// Switch a feature on or off, keeping the spatial index in step.
    pub(crate) fn set_active(&mut self, id: FeatureId, active: bool) {
        let Some(f) = self.features.get_mut(id.index()) else {
            return;
        };
        f.active = active;
        if let Geometry::Point(p) = f.geometry {
            if active {
                self.services.index.insert_point(id, p);
            } else {
                self.services.index.remove_point(id);
            }
        }
    }

    /// Overwrite geometry in place. Only the creator's recompute calls this.
    pub(crate) fn write_geometry(&mut self, id: FeatureId, geometry: Geometry) {
        let Some(f) = self.features.get_mut(id.index()) else {
            return;
        };
        if let Geometry::Point(p) = geometry {
            if f.active {
                self.services.index.insert_point(id, p);
            }
        }
        f.geometry = geometry;
    }

    pub(crate) fn register_references(&mut self, edit: EditId, features: &BTreeSet<FeatureId>) {
        for f in features {
            if let Some(feature) = self.features.get_mut(f.index()) {
                feature.add_reference(edit);
            }
        }
    }

    pub(crate) fn cut_references(&mut self, edit: EditId, features: &BTreeSet<FeatureId>) {
        for f in features {
            if let Some(feature) = self.features.get_mut(f.index()) {
                feature.cut_reference(edit);
            }
        }
    }

    /// Re-point an edit at new inputs: cut every reference, let `change`
    /// rewrite the edit, then register the new set.
    pub(crate) fn rewire<T>(
        &mut self,
        id: EditId,
        change: impl FnOnce(&mut Edit) -> Result<T>,
    ) -> Result<T> {
        let before = self.require_edit(id)?.required_features();
        self.cut_references(id, &before);
        let result = change(&mut self.edits[id.index()]);
        let after = self.edits[id.index()].required_features();
        self.register_references(id, &after);
        result
    }
}

fn corrupt(msg: String) -> EditError {
    EditError::CorruptHistory(msg)
}

impl std::fmt::Debug for MapModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapModel")
            .field("session", &self.session)
            .field("features", &self.features.len())
            .field("edits", &self.edits.len())
            .field("version", &self.version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Distance, Side};
    use crate::operation::EditKind;
    use approx::assert_relative_eq;

    fn model_with_points(points: &[(f64, f64)]) -> (MapModel, Vec<FeatureId>) {
        let mut m = MapModel::with_session("test", Services::default());
        let ids = points
            .iter()
            .map(|(x, y)| m.execute(EditKind::NewPoint { position: Point::new(*x, *y) }).unwrap().created[0])
            .collect();
        (m, ids)
    }

    #[test]
    fn test_resolve_angle_and_deflection() {
        let (m, p) = model_with_points(&[(0.0, 0.0), (0.0, 100.0)]);
        // Backsight due north, 90 degrees clockwise points east
        let d = Direction {
            from: p[0],
            kind: DirectionKind::Angle { backsight: p[1], angle: FRAC_PI_2 },
            offset: None,
        };
        let r = m.resolve_direction(&d).unwrap();
        assert_relative_eq!(r.bearing, FRAC_PI_2, epsilon = 1e-12);

        // Deflection from the extension of p1 -> p0 (due south) turns west
        let d = Direction {
            from: p[0],
            kind: DirectionKind::Deflection { backsight: p[1], angle: FRAC_PI_2 },
            offset: None,
        };
        let r = m.resolve_direction(&d).unwrap();
        assert_relative_eq!(r.bearing, 3.0 * FRAC_PI_2, epsilon = 1e-12);
    }

    #[test]
    fn test_resolve_offsets() {
        let (m, p) = model_with_points(&[(0.0, 0.0), (5.0, 50.0)]);
        let left = Direction::bearing(p[0], 0.0)
            .with_offset(Offset::Distance { distance: Distance::meters(3.0), side: Side::Left });
        let r = m.resolve_direction(&left).unwrap();
        assert_relative_eq!(r.start.x, -3.0, epsilon = 1e-9);
        assert_relative_eq!(r.start.y, 0.0, epsilon = 1e-9);

        let through = Direction::bearing(p[0], 0.0).with_offset(Offset::Point(p[1]));
        let r = m.resolve_direction(&through).unwrap();
        assert_relative_eq!(r.start.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(r.start.y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_resolve_length_from_point_is_planar() {
        let (m, p) = model_with_points(&[(0.0, 0.0), (3.0, 4.0)]);
        let (len, planar) = m.resolve_length(&Length::OffsetPoint(p[1]), Point::ORIGIN).unwrap();
        assert_relative_eq!(len, 5.0);
        assert!(planar);
        let (len, planar) = m.resolve_length(&Length::Distance(Distance::meters(7.0)), Point::ORIGIN).unwrap();
        assert_eq!(len, 7.0);
        assert!(!planar);
    }

    #[test]
    fn test_position_of_rejects_lines() {
        let (mut m, p) = model_with_points(&[(0.0, 0.0), (10.0, 0.0)]);
        let line = m.execute(EditKind::NewLine { start: p[0], end: p[1] }).unwrap().created[0];
        assert!(m.position_of(line).is_err());
        assert!(m.curve_of(line).is_ok());
        assert!(m.curve_of(p[0]).is_err());
        assert!(m.position_of(FeatureId(99)).is_err());
    }

    #[test]
    fn test_required_edits_and_integrity() {
        let (mut m, p) = model_with_points(&[(0.0, 0.0), (10.0, 0.0)]);
        let line = m.execute(EditKind::NewLine { start: p[0], end: p[1] }).unwrap();
        let req: Vec<_> = m.required_edits(line.edit).into_iter().collect();
        assert_eq!(req, vec![EditId(0), EditId(1)]);
        m.check_integrity().unwrap();

        // Forge a stale dependent, which the check must notice
        m.features[0].add_reference(EditId(7));
        assert!(matches!(m.check_integrity(), Err(EditError::CorruptHistory(_))));
    }

    #[test]
    fn test_ensure_point_exists_reuses_within_tolerance() {
        let (mut m, p) = model_with_points(&[(10.0, 10.0)]);
        let (id, reused) = m.ensure_point_exists(Point::new(10.0004, 10.0), EditId(5));
        assert_eq!(id, p[0]);
        assert!(reused);
        let (id, reused) = m.ensure_point_exists(Point::new(10.5, 10.0), EditId(5));
        assert_ne!(id, p[0]);
        assert!(!reused);
        assert_eq!(m.feature(id).unwrap().creator, EditId(5));
    }
}
