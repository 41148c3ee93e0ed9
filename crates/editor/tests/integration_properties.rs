//! Graph properties that must hold after any sequence of edits.

use std::collections::BTreeSet;

use approx::assert_abs_diff_eq;

use editor::fixtures::*;
use editor::harness::TestHarness;
use editor::observation::Side;
use editor::{EditKind, EditState, MapModel};

/// Every feature's dependents are exactly the active edits that need it.
fn assert_dependents_match(model: &MapModel) {
    for f in model.features() {
        let expected: BTreeSet<_> = model
            .edits()
            .iter()
            .filter(|e| e.is_active() && e.required_features().contains(&f.id))
            .map(|e| e.id)
            .collect();
        assert_eq!(f.dependents(), &expected, "dependents of {}", f.id);
    }
}

fn chain() -> (TestHarness, editor::EditId) {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let c = h.execute(two_distances(a, 60.0, b, 80.0)).unwrap();
    let p = c.created[0];
    let ap = h.line(a, p).unwrap();
    h.execute(radial(bearing_from(p, 90.0), 10.0, true)).unwrap();
    h.execute(parallel(ap, 5.0, Side::Right, None, None)).unwrap();
    h.execute(subdivision(ap, &[(20.0, false), (20.0, false), (20.0, false)])).unwrap();
    (h, c.edit)
}

#[test]
fn test_undo_then_execute_is_identical() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let kind = two_distances(a, 61.3, b, 77.9);

    let first = h.execute(kind.clone()).unwrap();
    let before = h.position(first.created[0]).unwrap();
    h.undo().unwrap();
    let again = h.execute(kind).unwrap();
    assert_eq!(h.position(again.created[0]).unwrap(), before);
    assert_ne!(first.created[0], again.created[0]);
}

#[test]
fn test_cascade_leaves_nothing_changed() {
    let (mut h, c) = chain();
    let report = h
        .revise(c, |k| {
            if let EditKind::IntersectTwoDistances { distance2, .. } = k {
                *distance2 = length(85.0);
            }
        })
        .unwrap();

    assert!(report.changed.len() > 1);
    assert_eq!(report.changed, report.recomputed);
    assert!(h.changed_edits().is_empty());
    for e in &report.recomputed {
        assert_eq!(h.state(*e), Some(EditState::Recomputed));
    }
}

#[test]
fn test_cascade_skips_unrelated_edits() {
    let (mut h, c) = chain();
    let loose = h.execute(new_point(500.0, 500.0)).unwrap();
    let report = h
        .revise(c, |k| {
            if let EditKind::IntersectTwoDistances { distance1, .. } = k {
                *distance1 = length(62.0);
            }
        })
        .unwrap();
    assert!(!report.changed.contains(&loose.edit));
    assert_eq!(h.state(loose.edit), Some(EditState::Executed));
}

#[test]
fn test_dependents_match_requirements() {
    let (mut h, c) = chain();
    assert_dependents_match(&h.model);

    h.revise(c, |k| {
        if let EditKind::IntersectTwoDistances { default, .. } = k {
            *default = false;
        }
    })
    .unwrap();
    assert_dependents_match(&h.model);

    h.undo().unwrap();
    h.undo().unwrap();
    assert_dependents_match(&h.model);
    h.check().unwrap();
}

#[test]
fn test_rollforward_is_idempotent() {
    let (mut h, c) = chain();
    let p = h.model.edit(c).unwrap().created()[0];
    let before: Vec<_> = h.model.active_features().map(|f| f.geometry.clone()).collect();

    for e in 0..h.edit_count() as u32 {
        assert!(!h.model.rollforward(editor::EditId(e)).unwrap());
    }
    let after: Vec<_> = h.model.active_features().map(|f| f.geometry.clone()).collect();
    assert_eq!(before, after);

    assert!(h.model.recompute_changed().unwrap().is_empty());
    let at = h.position(p).unwrap();
    assert_abs_diff_eq!(at.x, 36.0, epsilon = 1e-9);
}

#[test]
fn test_required_edits_follow_inputs() {
    let (h, c) = chain();
    let radial = h
        .model
        .edits()
        .iter()
        .find(|e| matches!(e.kind, EditKind::Radial { .. }))
        .map(|e| e.id)
        .unwrap();
    assert!(h.model.required_edits(radial).contains(&c));
    assert!(h.model.required_edits(c).iter().all(|r| *r < c));
}

#[test]
fn test_version_moves_on_every_change() {
    let mut h = TestHarness::new();
    let v0 = h.model.version();
    h.point(1.0, 2.0).unwrap();
    let v1 = h.model.version();
    assert!(v1 > v0);
    h.undo().unwrap();
    assert!(h.model.version() > v1);
}
