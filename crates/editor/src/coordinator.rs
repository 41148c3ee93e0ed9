//! Corrections and the recompute walk.
//!
//! `correct` exchanges new values into an earlier edit, records the change
//! as an [`EditKind::Update`] edit, then marks everything downstream as
//! changed and recomputes it in sequence order. The first edit that cannot
//! be recomputed stops the walk; it and the edits after it stay changed.

use std::collections::BTreeSet;

use crate::calculate::calculate;
use crate::error::{invalid, EditError, Result};
use crate::model::MapModel;
use crate::observation::Leg;
use crate::operation::{Edit, EditId, EditKind, EditState};
use crate::update::{FieldValue, UpdateItemCollection};

/// What a correction (or an update undo) touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecomputeReport {
    /// The update edit recording the correction
    pub update: Option<EditId>,
    /// Edits marked changed, ascending
    pub changed: Vec<EditId>,
    /// Edits successfully recomputed, ascending
    pub recomputed: Vec<EditId>,
}

impl RecomputeReport {
    pub fn is_empty(&self) -> bool {
        self.update.is_none() && self.changed.is_empty()
    }
}

impl MapModel {
    /// Revise an earlier edit and recompute everything that depends on it.
    /// An unchanged `revised` kind is a no-op. A revision the edit itself
    /// cannot calculate is rejected with the history untouched.
    pub fn correct(&mut self, target: EditId, revised: EditKind) -> Result<RecomputeReport> {
        let edit = self.require_edit(target)?;
        if !edit.is_active() {
            return Err(invalid(format!("edit {} is not active", target)));
        }
        if !edit.kind.is_revisable() {
            return Err(EditError::Unsupported("only calculated edits can be corrected"));
        }

        let changes = UpdateItemCollection::diff(&edit.kind, &revised)?;
        if changes.is_empty() {
            return Ok(RecomputeReport::default());
        }
        self.validate(&revised, &edit.deactivated)?;
        self.check_revision(target, &changes)?;

        let outputs = edit.outputs.len();
        let calc = calculate(self, &revised)?;
        if calc.drafts.len() != outputs {
            return Err(EditError::Unsupported("a correction cannot change what the edit creates"));
        }

        tracing::info!(edit = %target, fields = ?changes.field_names(), "correcting");
        let previous = self.apply_changes(target, &changes)?;

        let id = self.next_edit_id();
        let mut update = Edit::new(id, EditKind::Update { revised: target, changes });
        update.previous = Some(previous);
        update.state = EditState::Executed;
        let required = update.required_features();
        self.edits.push(update);
        self.register_references(id, &required);
        self.bump_version();

        let mut report = self.cascade(target)?;
        report.update = Some(id);
        Ok(report)
    }

    /// Reject revisions that would change the layout of what the edit
    /// created, or that point it at later work.
    fn check_revision(&self, target: EditId, changes: &UpdateItemCollection) -> Result<()> {
        for f in changes.features() {
            let creator = self.require_feature(f)?.creator;
            if creator >= target {
                return Err(invalid(format!(
                    "{} was created by edit {}, after edit {}",
                    f, creator, target
                )));
            }
        }

        let current = &self.require_edit(target)?.kind;
        match current {
            EditKind::LineSubdivision { distances, .. } => {
                if changes.get("line").is_some() {
                    return Err(EditError::Unsupported("moving a subdivision to another line"));
                }
                if let Some(FieldValue::Distances(new)) = changes.get("distances") {
                    if new.len() != distances.len() {
                        return Err(EditError::Unsupported("changing the number of subdivision sections"));
                    }
                }
            }
            EditKind::ConnectionPath { legs, .. } => {
                if let Some(FieldValue::Legs(new)) = changes.get("legs") {
                    let shape = |l: &[Leg]| l.iter().map(Leg::shape).collect::<Vec<_>>();
                    if shape(new) != shape(legs) {
                        return Err(EditError::Unsupported("changing the legs of a connection path"));
                    }
                }
            }
            EditKind::SimpleLineSubdivision { .. } => {
                if changes.get("line").is_some() {
                    return Err(EditError::Unsupported("moving a subdivision to another line"));
                }
            }
            EditKind::IntersectDirectionLine { split: true, .. } => {
                if changes.get("line").is_some() {
                    return Err(EditError::Unsupported("moving a split to another line"));
                }
            }
            EditKind::IntersectTwoLines { split1, split2, .. } => {
                if (*split1 && changes.get("line1").is_some()) || (*split2 && changes.get("line2").is_some()) {
                    return Err(EditError::Unsupported("moving a split to another line"));
                }
            }
            _ => {}
        }

        // Flags that decide which lines an edit creates or replaces.
        let layout: &[&str] = match current {
            EditKind::Radial { .. } | EditKind::LineExtension { .. } => &["add_line"],
            EditKind::IntersectDirectionDistance { .. } => &["add_direction_line", "add_distance_line"],
            EditKind::IntersectTwoDistances { .. } | EditKind::IntersectTwoDirections { .. } => {
                &["add_line1", "add_line2"]
            }
            EditKind::IntersectDirectionLine { .. } => &["split", "add_direction_line"],
            EditKind::IntersectTwoLines { .. } => &["split1", "split2"],
            _ => &[],
        };
        if layout.iter().any(|field| changes.get(field).is_some()) {
            return Err(EditError::Unsupported("adding or removing lines an edit creates"));
        }
        Ok(())
    }

    /// Exchange `changes` into the target, moving its references. Returns
    /// the values that were replaced.
    fn apply_changes(&mut self, target: EditId, changes: &UpdateItemCollection) -> Result<UpdateItemCollection> {
        let mut swap = changes.clone();
        self.rewire(target, |edit| swap.exchange(&mut edit.kind))?;
        Ok(swap)
    }

    /// Mark `origin` and everything reachable from it as changed. Edits left
    /// changed by an earlier failed walk are picked up again.
    pub(crate) fn mark_changed(&mut self, origin: EditId) -> BTreeSet<EditId> {
        let mut dirty: BTreeSet<EditId> = self
            .edits
            .iter()
            .filter(|e| e.is_active() && e.is_changed())
            .map(|e| e.id)
            .collect();
        dirty.insert(origin);
        self.edits[origin.index()].state = EditState::Changed;

        let first = dirty.iter().next().copied().unwrap_or(origin);
        for i in first.index() + 1..self.edits.len() {
            let edit = &self.edits[i];
            if !edit.is_active() || dirty.contains(&edit.id) || edit.revised().is_some() {
                continue;
            }
            let id = edit.id;
            if self.required_edits(id).iter().any(|r| dirty.contains(r)) {
                dirty.insert(id);
                self.edits[i].state = EditState::Changed;
            }
        }
        dirty
    }

    /// Mark from `origin` and recompute in ascending order.
    pub(crate) fn cascade(&mut self, origin: EditId) -> Result<RecomputeReport> {
        let dirty = self.mark_changed(origin);
        let mut report = RecomputeReport { changed: dirty.iter().copied().collect(), ..Default::default() };
        tracing::debug!(origin = %origin, changed = dirty.len(), "recomputing");

        for id in dirty {
            match self.rollforward(id) {
                Ok(true) => report.recomputed.push(id),
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(edit = %id, error = %e, "rollforward rejected");
                    return Err(e);
                }
            }
        }
        tracing::info!(origin = %origin, recomputed = report.recomputed.len(), "recompute finished");
        Ok(report)
    }

    /// Recompute every edit left changed by an earlier failure.
    pub fn recompute_changed(&mut self) -> Result<RecomputeReport> {
        let origin = self.edits.iter().find(|e| e.is_active() && e.is_changed()).map(|e| e.id);
        match origin {
            Some(origin) => self.cascade(origin),
            None => Ok(RecomputeReport::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::{Distance, Length};
    use crate::services::Services;
    use kurbo::Point;

    fn two_distances(model: &mut MapModel, d1: f64) -> (EditId, EditKind) {
        let a = model.execute(EditKind::NewPoint { position: Point::new(0.0, 0.0) }).unwrap().created[0];
        let b = model.execute(EditKind::NewPoint { position: Point::new(100.0, 0.0) }).unwrap().created[0];
        let kind = |d: f64| EditKind::IntersectTwoDistances {
            from1: a,
            distance1: Length::Distance(Distance::meters(d)),
            from2: b,
            distance2: Length::Distance(Distance::meters(80.0)),
            default: true,
            add_line1: false,
            add_line2: false,
        };
        let e = model.execute(kind(d1)).unwrap().edit;
        (e, kind(65.0))
    }

    #[test]
    fn test_correct_unchanged_is_noop() {
        let mut m = MapModel::with_session("t", Services::default());
        let (e, _) = two_distances(&mut m, 60.0);
        let same = m.edit(e).unwrap().kind.clone();
        let report = m.correct(e, same).unwrap();
        assert!(report.is_empty());
        assert_eq!(m.edits().len(), 3);
    }

    #[test]
    fn test_correct_records_update() {
        let mut m = MapModel::with_session("t", Services::default());
        let (e, revised) = two_distances(&mut m, 60.0);
        let report = m.correct(e, revised.clone()).unwrap();
        let update = report.update.unwrap();
        assert_eq!(m.edit(update).unwrap().revised(), Some(e));
        assert_eq!(m.edit(e).unwrap().kind, revised);
        assert_eq!(m.edit(e).unwrap().state(), EditState::Recomputed);
        assert_eq!(report.recomputed, vec![e]);
        m.check_integrity().unwrap();
    }

    #[test]
    fn test_correct_rejects_other_kind_and_deletion() {
        let mut m = MapModel::with_session("t", Services::default());
        let (e, _) = two_distances(&mut m, 60.0);
        let other = EditKind::NewPoint { position: Point::ORIGIN };
        assert!(matches!(m.correct(e, other), Err(EditError::InvalidInput(_))));

        let p = m.edit(e).unwrap().created()[0];
        let del = m.execute(EditKind::Deletion { features: vec![p] }).unwrap().edit;
        let revised = EditKind::Deletion { features: vec![] };
        assert!(matches!(m.correct(del, revised), Err(EditError::Unsupported(_))));
    }

    #[test]
    fn test_infeasible_revision_leaves_history_alone() {
        let mut m = MapModel::with_session("t", Services::default());
        let (e, _) = two_distances(&mut m, 60.0);
        let before = m.edit(e).unwrap().kind.clone();
        let version = m.version();
        let mut revised = before.clone();
        if let EditKind::IntersectTwoDistances { distance1, .. } = &mut revised {
            // 10 + 80 does not span the 100 m baseline
            *distance1 = Length::Distance(Distance::meters(10.0));
        }

        assert!(matches!(m.correct(e, revised), Err(EditError::GeometricInfeasibility(_))));
        assert_eq!(m.edits().len(), 3);
        assert_eq!(m.edit(e).unwrap().kind, before);
        assert_eq!(m.edit(e).unwrap().state(), EditState::Executed);
        assert_eq!(m.version(), version);
        m.check_integrity().unwrap();
    }

    #[test]
    fn test_correct_rejects_later_input() {
        let mut m = MapModel::with_session("t", Services::default());
        let (e, _) = two_distances(&mut m, 60.0);
        let later = m.execute(EditKind::NewPoint { position: Point::new(50.0, 90.0) }).unwrap().created[0];
        let mut revised = m.edit(e).unwrap().kind.clone();
        if let EditKind::IntersectTwoDistances { from2, .. } = &mut revised {
            *from2 = later;
        }
        assert!(matches!(m.correct(e, revised), Err(EditError::InvalidInput(_))));
        m.check_integrity().unwrap();
    }
}
