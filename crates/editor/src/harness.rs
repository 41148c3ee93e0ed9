//! Headless test harness for driving a map model programmatically.

use kurbo::Point;

use crate::coordinator::RecomputeReport;
use crate::error::{invalid, Result};
use crate::feature::FeatureId;
use crate::fixtures;
use crate::lifecycle::Executed;
use crate::model::MapModel;
use crate::operation::{EditId, EditKind, EditState};
use crate::services::Services;

/// Headless harness: a model plus shortcuts for common edits
pub struct TestHarness {
    pub model: MapModel,
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl TestHarness {
    /// Create a new empty harness with default services.
    pub fn new() -> Self {
        Self::with_services(Services::default())
    }

    /// Harness over a plane projection with a constant scale factor.
    pub fn with_scale(scale: f64) -> Self {
        Self::with_services(Services::with_scale(scale))
    }

    pub fn with_services(services: Services) -> Self {
        Self { model: MapModel::with_session("harness", services) }
    }

    // ── Editing ───────────────────────────────────────────────

    pub fn execute(&mut self, kind: EditKind) -> Result<Executed> {
        self.model.execute(kind)
    }

    /// Execute and return the first created feature.
    pub fn create(&mut self, kind: EditKind) -> Result<FeatureId> {
        let name = kind.name();
        self.execute(kind)?
            .created
            .first()
            .copied()
            .ok_or_else(|| invalid(format!("{} created nothing", name)))
    }

    /// Add a point and return its id
    pub fn point(&mut self, x: f64, y: f64) -> Result<FeatureId> {
        self.create(fixtures::new_point(x, y))
    }

    /// Add a straight line and return its id
    pub fn line(&mut self, start: FeatureId, end: FeatureId) -> Result<FeatureId> {
        self.create(fixtures::new_line(start, end))
    }

    pub fn correct(&mut self, edit: EditId, kind: EditKind) -> Result<RecomputeReport> {
        self.model.correct(edit, kind)
    }

    /// Correct an edit by modifying a copy of its current kind.
    pub fn revise(&mut self, edit: EditId, change: impl FnOnce(&mut EditKind)) -> Result<RecomputeReport> {
        let mut kind = self.model.require_edit(edit)?.kind.clone();
        change(&mut kind);
        self.model.correct(edit, kind)
    }

    pub fn undo(&mut self) -> Result<Vec<EditId>> {
        self.model.undo_last()
    }

    pub fn undo_edit(&mut self, edit: EditId) -> Result<Vec<EditId>> {
        self.model.undo(edit)
    }

    // ── Inspection ────────────────────────────────────────────

    pub fn position(&self, id: FeatureId) -> Option<Point> {
        self.model.position_of(id).ok()
    }

    pub fn is_active(&self, id: FeatureId) -> bool {
        self.model.feature(id).map(|f| f.active).unwrap_or(false)
    }

    pub fn state(&self, edit: EditId) -> Option<EditState> {
        self.model.edit(edit).map(|e| e.state())
    }

    /// The edit that created a feature.
    pub fn creator(&self, id: FeatureId) -> Option<EditId> {
        self.model.feature(id).map(|f| f.creator)
    }

    pub fn active_feature_count(&self) -> usize {
        self.model.active_features().count()
    }

    pub fn edit_count(&self) -> usize {
        self.model.edits().len()
    }

    /// Edits still waiting to be recomputed.
    pub fn changed_edits(&self) -> Vec<EditId> {
        self.model.edits().iter().filter(|e| e.is_active() && e.is_changed()).map(|e| e.id).collect()
    }

    pub fn check(&self) -> Result<()> {
        self.model.check_integrity()
    }

    // ── Persistence ───────────────────────────────────────────

    /// Export the history as JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(self.model.to_stream()?.to_json()?)
    }

    /// Replace the model with one replayed from JSON
    pub fn load_json(&mut self, json: &str) -> Result<()> {
        let stream = shared::EditStream::from_json(json)?;
        self.model = MapModel::replay(&stream, Services::default())?;
        Ok(())
    }

    /// A fresh harness rebuilt from this one's saved history.
    pub fn replayed(&self) -> Result<TestHarness> {
        let mut h = TestHarness::new();
        h.load_json(&self.export_json()?)?;
        Ok(h)
    }
}
