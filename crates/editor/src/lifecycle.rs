//! Execute, rollforward and undo.

use std::collections::BTreeSet;

use crate::calculate::{calculate, deletion_batch, Draft};
use crate::error::{invalid, EditError, Result};
use crate::feature::FeatureId;
use crate::model::MapModel;
use crate::operation::{Edit, EditId, EditKind, EditState};

/// Result of executing an edit.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub edit: EditId,
    /// Features the edit created, in calculation order
    pub created: Vec<FeatureId>,
}

/// Features an edit replaces or removes when it executes.
fn switched_off(model: &MapModel, kind: &EditKind) -> Result<Vec<FeatureId>> {
    Ok(match kind {
        EditKind::Deletion { features } => deletion_batch(model, features)?,
        EditKind::LineSubdivision { line, .. } | EditKind::SimpleLineSubdivision { line, .. } => vec![*line],
        EditKind::IntersectDirectionLine { line, split: true, .. } => vec![*line],
        EditKind::IntersectTwoLines { line1, line2, split1, split2, .. } => {
            let mut split = Vec::new();
            if *split1 {
                split.push(*line1);
            }
            if *split2 {
                split.push(*line2);
            }
            split
        }
        _ => Vec::new(),
    })
}

impl MapModel {
    // ── Execute ───────────────────────────────────────────────

    /// Check that every input exists, is active and has the right kind. No
    /// state changes. Features in `switched_off` may be inactive (a
    /// subdivision being corrected reads the line it replaced).
    pub(crate) fn validate(&self, kind: &EditKind, switched_off: &[FeatureId]) -> Result<()> {
        if let EditKind::Update { .. } = kind {
            return Err(EditError::Unsupported("updates are recorded by correct"));
        }

        for (id, expected) in kind.typed_inputs() {
            let f = self.require_feature(id)?;
            if !f.active && !switched_off.contains(&id) {
                return Err(invalid(format!("{} has been removed", id)));
            }
            if let Some(expected) = expected {
                if f.kind() != expected {
                    return Err(invalid(format!(
                        "{} is a {}, a {} was expected",
                        id,
                        f.kind().name(),
                        expected.name()
                    )));
                }
            }
        }

        let self_referential = match kind {
            EditKind::NewLine { start, end } => start == end,
            EditKind::NewArc { centre, start, end, .. } => centre == start || centre == end,
            EditKind::IntersectDirectionDistance { direction, .. } | EditKind::Radial { direction, .. } => {
                direction.is_self_referential()
            }
            EditKind::IntersectDirectionLine { direction, .. } => direction.is_self_referential(),
            EditKind::IntersectTwoDistances { from1, from2, .. } => from1 == from2,
            EditKind::IntersectTwoDirections { direction1, direction2, .. } => {
                direction1.is_self_referential() || direction2.is_self_referential()
            }
            EditKind::IntersectTwoLines { line1, line2, .. } => line1 == line2,
            EditKind::Parallel { reference, terminal1, terminal2, .. } => {
                *terminal1 == Some(*reference) || *terminal2 == Some(*reference)
            }
            EditKind::ConnectionPath { from, to, .. } => from == to,
            _ => false,
        };
        if self_referential {
            return Err(invalid(format!("{} refers to itself", kind.name())));
        }

        match kind {
            EditKind::Deletion { features } if features.is_empty() => {
                Err(invalid("nothing to delete"))
            }
            EditKind::LineSubdivision { distances, .. } if distances.len() < 2 => {
                Err(invalid("a subdivision needs at least two distances"))
            }
            EditKind::ConnectionPath { legs, .. } if legs.is_empty() => {
                Err(invalid("a connection path needs at least one leg"))
            }
            EditKind::SimpleLineSubdivision { distance, .. } if distance.value <= 0.0 => {
                Err(invalid("a split distance must be positive"))
            }
            EditKind::LineExtension { length, .. } if length.value <= 0.0 => {
                Err(invalid("an extension length must be positive"))
            }
            EditKind::AttachPoint { ratio, .. } if !(0.0..=1.0).contains(ratio) => {
                Err(invalid(format!("position ratio {} is not between 0 and 1", ratio)))
            }
            _ => Ok(()),
        }
    }

    /// Validate, calculate and append a new edit.
    pub fn execute(&mut self, kind: EditKind) -> Result<Executed> {
        self.validate(&kind, &[])?;
        let calc = calculate(self, &kind)?;
        let deactivated = switched_off(self, &kind)?;

        let id = self.next_edit_id();
        self.edits.push(Edit::new(id, kind));

        let mut outputs = Vec::with_capacity(calc.drafts.len());
        let mut reused = Vec::new();
        for draft in &calc.drafts {
            let fid = match draft {
                Draft::SharedPoint(p) => {
                    let (fid, was_there) = self.ensure_point_exists(*p, id);
                    if was_there {
                        reused.push(fid);
                    }
                    fid
                }
                other => {
                    let geometry = other.geometry(&outputs);
                    self.add_feature(id, geometry)
                }
            };
            outputs.push(fid);
        }

        let edit = &mut self.edits[id.index()];
        edit.outputs = outputs;
        edit.reused = reused;
        edit.deactivated = deactivated.clone();
        edit.alternate = calc.alternate;
        edit.adjustment = calc.adjustment;
        let required = edit.required_features();
        self.register_references(id, &required);

        for f in &deactivated {
            self.set_active(*f, false);
        }
        if let EditKind::SetTopology { line, topological } = self.edits[id.index()].kind {
            if let Some(f) = self.features.get_mut(line.index()) {
                self.edits[id.index()].previous_topology = Some(f.topological);
                f.topological = topological;
            }
        }

        let edit = &mut self.edits[id.index()];
        edit.state = EditState::Executed;
        let created = edit.created();
        tracing::debug!(edit = %id, kind = edit.kind.name(), created = created.len(), "executed");
        self.bump_version();
        Ok(Executed { edit: id, created })
    }

    // ── Rollforward ───────────────────────────────────────────

    /// Recalculate a changed edit, writing into the features it already
    /// owns. Returns false when the edit was not changed. Nothing is written
    /// unless the whole calculation succeeds.
    pub fn rollforward(&mut self, id: EditId) -> Result<bool> {
        let edit = self.require_edit(id)?;
        if !edit.is_changed() {
            return Ok(false);
        }
        let fail = |cause: String| EditError::Rollforward { edit: id, cause };

        if matches!(
            edit.kind,
            EditKind::Deletion { .. } | EditKind::SetTopology { .. } | EditKind::Update { .. }
        ) {
            self.edits[id.index()].state = EditState::Recomputed;
            return Ok(true);
        }

        let calc = calculate(self, &edit.kind).map_err(|e| fail(e.to_string()))?;
        if calc.drafts.len() != edit.outputs.len() {
            return Err(fail(format!(
                "calculation now gives {} features instead of {}",
                calc.drafts.len(),
                edit.outputs.len()
            )));
        }
        for (draft, fid) in calc.drafts.iter().zip(&edit.outputs) {
            let feature = self.require_feature(*fid)?;
            if feature.kind() != draft.kind() {
                return Err(fail(format!("{} is no longer a {}", fid, feature.kind().name())));
            }
            if let Draft::SharedPoint(p) = draft {
                if edit.reused.contains(fid) {
                    let at = feature.point().unwrap_or_default();
                    if at.distance(*p) > self.services.point_tolerance {
                        return Err(fail(format!("intersection has moved off {}", fid)));
                    }
                }
            }
        }

        let outputs = edit.outputs.clone();
        let reused = edit.reused.clone();
        for (draft, fid) in calc.drafts.iter().zip(&outputs) {
            if !reused.contains(fid) {
                self.write_geometry(*fid, draft.geometry(&outputs));
            }
        }

        let edit = &mut self.edits[id.index()];
        edit.alternate = calc.alternate;
        edit.adjustment = calc.adjustment;
        edit.state = EditState::Recomputed;
        tracing::debug!(edit = %id, kind = edit.kind.name(), "recomputed");
        self.bump_version();
        Ok(true)
    }

    // ── Undo ──────────────────────────────────────────────────

    /// Undo the most recent active edit.
    pub fn undo_last(&mut self) -> Result<Vec<EditId>> {
        let id = self.last_edit().ok_or_else(|| invalid("nothing to undo"))?;
        self.undo(id)
    }

    /// Undo an edit together with any lines left dangling from the points it
    /// created. Returns the undone edits, latest first.
    pub fn undo(&mut self, id: EditId) -> Result<Vec<EditId>> {
        let batch = self.undo_batch(id)?;
        let mut undone = Vec::with_capacity(batch.len());
        let mut revised = Vec::new();
        for e in batch.iter().rev() {
            if let Some(r) = self.undo_one(*e)? {
                revised.push(r);
            }
            undone.push(*e);
        }
        self.bump_version();
        tracing::info!(edit = %id, batch = undone.len(), "undone");

        for r in revised {
            self.cascade(r)?;
        }
        Ok(undone)
    }

    /// Edits undone together with `id`, ascending. Fails if anything else
    /// still depends on what they produced.
    pub(crate) fn undo_batch(&self, id: EditId) -> Result<Vec<EditId>> {
        let edit = self.require_edit(id)?;
        if !edit.is_active() {
            return Err(invalid(format!("edit {} is not active", id)));
        }

        let updates = self.active_updates_of(id);
        if !updates.is_empty() {
            return Err(EditError::DependencyViolation { subject: format!("edit {}", id), dependents: updates });
        }
        if let Some(revised) = edit.revised() {
            let later: Vec<EditId> =
                self.active_updates_of(revised).into_iter().filter(|u| *u > id).collect();
            if !later.is_empty() {
                return Err(EditError::DependencyViolation {
                    subject: format!("update {}", id),
                    dependents: later,
                });
            }
        }

        let created = edit.created();
        let mut batch = BTreeSet::from([id]);
        let mut blockers = BTreeSet::new();
        for f in &created {
            let feature = self.require_feature(*f)?;
            for d in feature.dependents() {
                if *d == id || batch.contains(d) {
                    continue;
                }
                if self.is_dangling_line(*d, &created) {
                    batch.insert(*d);
                } else {
                    blockers.insert(*d);
                }
            }
        }
        if !blockers.is_empty() {
            return Err(EditError::DependencyViolation {
                subject: format!("edit {}", id),
                dependents: blockers.into_iter().collect(),
            });
        }
        Ok(batch.into_iter().collect())
    }

    /// A plain line or arc drawn from one of `points` that nothing else uses.
    fn is_dangling_line(&self, id: EditId, points: &[FeatureId]) -> bool {
        let Some(edit) = self.edit(id) else {
            return false;
        };
        let uses_point = match &edit.kind {
            EditKind::NewLine { start, end } => points.contains(start) || points.contains(end),
            EditKind::NewArc { centre, start, end, .. } => {
                points.contains(centre) || points.contains(start) || points.contains(end)
            }
            _ => false,
        };
        if !uses_point || !self.active_updates_of(id).is_empty() {
            return false;
        }
        edit.created()
            .iter()
            .all(|f| self.feature(*f).map(|x| !x.is_referenced_by_others(id)).unwrap_or(true))
    }

    /// Undo a single edit. For an update, returns the edit it revised so
    /// the caller can recompute from there.
    fn undo_one(&mut self, id: EditId) -> Result<Option<EditId>> {
        let required = self.require_edit(id)?.required_features();
        let edit = &self.edits[id.index()];
        let created = edit.created();
        let restored = edit.deactivated.clone();
        let revised = edit.revised();

        if let Some(revised) = revised {
            let mut previous = self.edits[id.index()]
                .previous
                .take()
                .ok_or_else(|| EditError::CorruptHistory(format!("update {} lost its old values", id)))?;
            self.cut_references(id, &required);
            let swapped = self.rewire(revised, |target| previous.exchange(&mut target.kind));
            self.edits[id.index()].previous = Some(previous);
            swapped?;
            self.edits[id.index()].state = EditState::RolledBack;
            tracing::debug!(edit = %id, revised = %revised, "update undone");
            return Ok(Some(revised));
        }

        self.cut_references(id, &required);
        for f in &created {
            self.set_active(*f, false);
        }
        for f in &restored {
            self.set_active(*f, true);
        }
        if let EditKind::SetTopology { line, .. } = self.edits[id.index()].kind {
            if let (Some(previous), Some(f)) =
                (self.edits[id.index()].previous_topology, self.features.get_mut(line.index()))
            {
                f.topological = previous;
            }
        }
        self.edits[id.index()].state = EditState::RolledBack;
        tracing::debug!(edit = %id, removed = created.len(), restored = restored.len(), "rolled back");
        Ok(None)
    }
}
