//! Intersections against lines and directions, point reuse, the line
//! edits (extension, single split, attached points) and arcs.

use std::f64::consts::PI;

use approx::assert_abs_diff_eq;
use kurbo::Point;

use editor::fixtures::*;
use editor::harness::TestHarness;
use editor::observation::Side;
use editor::{EditError, EditKind, EditState, FeatureId, LineGeometry};

fn assert_at(p: Option<Point>, x: f64, y: f64) {
    let p = p.expect("point has no position");
    assert_abs_diff_eq!(p.x, x, epsilon = 1e-6);
    assert_abs_diff_eq!(p.y, y, epsilon = 1e-6);
}

/// End points of a straight line.
fn ends(h: &TestHarness, line: FeatureId) -> (FeatureId, FeatureId) {
    match h.model.feature(line).and_then(|f| f.line()) {
        Some(LineGeometry::Segment { start, end }) => (*start, *end),
        other => panic!("{line} is not a segment: {other:?}"),
    }
}

/// Base line A(0,0)-B(100,0) and a crossing line C(50,-50)-D(50,50)
/// whose top end comes from a radial off C.
struct Cross {
    h: TestHarness,
    a: FeatureId,
    b: FeatureId,
    ab: FeatureId,
    radial: editor::EditId,
    cd: FeatureId,
}

fn cross() -> Cross {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();
    let c = h.point(50.0, -50.0).unwrap();
    let r = h.execute(radial(bearing_from(c, 0.0), 100.0, false)).unwrap();
    let cd = h.line(c, r.created[0]).unwrap();
    Cross { h, a, b, ab, radial: r.edit, cd }
}

fn swing(deg: f64) -> impl FnOnce(&mut EditKind) {
    move |k| {
        if let EditKind::Radial { direction, .. } = k {
            *direction = bearing_from(direction.from, deg);
        }
    }
}

// ── Direction intersections ─────────────────────────────────────

#[test]
fn test_two_directions_meet() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();

    let done = h.execute(two_directions(bearing_from(a, 45.0), bearing_from(b, 315.0))).unwrap();
    assert_eq!(done.created.len(), 1);
    assert_at(h.position(done.created[0]), 50.0, 50.0);

    let parallel_rays = two_directions(bearing_from(a, 0.0), bearing_from(b, 0.0));
    assert!(matches!(h.execute(parallel_rays), Err(EditError::GeometricInfeasibility(_))));
}

#[test]
fn test_two_directions_with_observation_lines() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let kind = EditKind::IntersectTwoDirections {
        direction1: bearing_from(a, 45.0),
        direction2: bearing_from(b, 315.0),
        add_line1: true,
        add_line2: true,
    };

    let done = h.execute(kind).unwrap();
    assert_eq!(done.created.len(), 3);
    let p = done.created[0];
    assert_eq!(ends(&h, done.created[1]), (a, p));
    assert_eq!(ends(&h, done.created[2]), (b, p));
    h.check().unwrap();
}

#[test]
fn test_direction_crosses_line() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();
    let c = h.point(30.0, 40.0).unwrap();

    let done = h.execute(direction_line(bearing_from(c, 180.0), ab, Point::new(30.0, 0.0), false)).unwrap();
    assert_eq!(done.created.len(), 1);
    assert_at(h.position(done.created[0]), 30.0, 0.0);
    assert!(h.is_active(ab));

    let away = direction_line(bearing_from(c, 0.0), ab, Point::new(30.0, 0.0), false);
    assert!(matches!(h.execute(away), Err(EditError::GeometricInfeasibility(_))));
}

#[test]
fn test_direction_split_replaces_line() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();
    let c = h.point(30.0, 40.0).unwrap();
    let kind = EditKind::IntersectDirectionLine {
        direction: bearing_from(c, 180.0),
        line: ab,
        close_to: Point::new(30.0, 0.0),
        split: true,
        add_direction_line: true,
    };

    let done = h.execute(kind).unwrap();
    let p = done.created[0];
    assert_eq!(done.created.len(), 4);
    assert_eq!(ends(&h, done.created[1]), (c, p));
    assert_eq!(ends(&h, done.created[2]), (a, p));
    assert_eq!(ends(&h, done.created[3]), (p, b));
    assert!(!h.is_active(ab));
    assert_eq!(h.model.edit(done.edit).unwrap().deactivated(), &[ab]);
    h.check().unwrap();

    h.undo().unwrap();
    assert!(h.is_active(ab));
    assert!(!h.is_active(p));
    h.check().unwrap();
}

#[test]
fn test_split_at_line_end_is_infeasible() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();
    let c = h.point(0.0, 40.0).unwrap();

    let at_end = direction_line(bearing_from(c, 180.0), ab, Point::ORIGIN, true);
    assert!(matches!(h.execute(at_end), Err(EditError::GeometricInfeasibility(_))));
    assert!(h.is_active(ab));
}

// ── Line intersections and point reuse ──────────────────────────

#[test]
fn test_two_lines_cross_and_follow_correction() {
    let mut x = cross();
    let done = x.h.execute(two_lines(x.ab, x.cd, Point::new(50.0, 0.0))).unwrap();
    let p = done.created[0];
    assert_at(x.h.position(p), 50.0, 0.0);

    x.h.revise(x.radial, swing(10.0)).unwrap();
    assert_at(x.h.position(p), 50.0 + 50.0 * 10f64.to_radians().tan(), 0.0);
    assert_eq!(x.h.state(done.edit), Some(EditState::Recomputed));
    x.h.check().unwrap();
}

#[test]
fn test_two_lines_split_both() {
    let mut x = cross();
    let kind = EditKind::IntersectTwoLines {
        line1: x.ab,
        line2: x.cd,
        close_to: Point::new(50.0, 0.0),
        split1: true,
        split2: true,
    };

    let done = x.h.execute(kind).unwrap();
    let p = done.created[0];
    assert_eq!(done.created.len(), 5);
    assert_eq!(ends(&x.h, done.created[1]), (x.a, p));
    assert_eq!(ends(&x.h, done.created[2]), (p, x.b));
    assert!(!x.h.is_active(x.ab));
    assert!(!x.h.is_active(x.cd));
    x.h.check().unwrap();

    // The sections follow the crossing when the crossing line moves.
    x.h.revise(x.radial, swing(10.0)).unwrap();
    let moved = x.h.position(p).unwrap();
    assert!(moved.x > 55.0);
    x.h.check().unwrap();
}

#[test]
fn test_intersection_reuses_existing_point() {
    let mut x = cross();
    let m = x.h.point(50.0, 0.0).unwrap();
    let before = x.h.active_feature_count();

    let done = x.h.execute(two_lines(x.ab, x.cd, Point::new(50.0, 0.0))).unwrap();
    assert!(done.created.is_empty());
    assert_eq!(x.h.model.edit(done.edit).unwrap().outputs(), &[m]);
    assert_eq!(x.h.active_feature_count(), before);
    assert_ne!(x.h.creator(m), Some(done.edit));

    // Undoing the intersection leaves the point it borrowed alone.
    x.h.undo().unwrap();
    assert!(x.h.is_active(m));
    x.h.check().unwrap();
}

#[test]
fn test_reused_point_left_behind_fails_rollforward() {
    let mut x = cross();
    let m = x.h.point(50.0, 0.0).unwrap();
    let done = x.h.execute(two_lines(x.ab, x.cd, Point::new(50.0, 0.0))).unwrap();

    match x.h.revise(x.radial, swing(10.0)) {
        Err(EditError::Rollforward { edit, cause }) => {
            assert_eq!(edit, done.edit);
            assert!(cause.contains("moved off"), "{cause}");
        }
        other => panic!("expected a rollforward failure, got {other:?}"),
    }
    assert_at(x.h.position(m), 50.0, 0.0);
    assert_eq!(x.h.changed_edits(), vec![done.edit]);

    x.h.undo().unwrap();
    assert!(x.h.changed_edits().is_empty());
    x.h.check().unwrap();
}

// ── Observation lines ───────────────────────────────────────────

#[test]
fn test_distance_intersections_draw_observation_lines() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let mut kind = two_distances(a, 60.0, b, 80.0);
    if let EditKind::IntersectTwoDistances { add_line1, add_line2, .. } = &mut kind {
        *add_line1 = true;
        *add_line2 = true;
    }
    let done = h.execute(kind).unwrap();
    let p = done.created[0];
    assert_eq!(done.created.len(), 3);
    assert_eq!(ends(&h, done.created[1]), (a, p));
    assert_eq!(ends(&h, done.created[2]), (b, p));

    let mut kind = direction_distance(bearing_from(b, 0.0), a, 125.0);
    if let EditKind::IntersectDirectionDistance { add_direction_line, add_distance_line, .. } = &mut kind {
        *add_direction_line = true;
        *add_distance_line = true;
    }
    let dd = h.execute(kind).unwrap();
    let q = dd.created[0];
    assert_at(h.position(q), 100.0, 75.0);
    assert_eq!(ends(&h, dd.created[1]), (b, q));
    assert_eq!(ends(&h, dd.created[2]), (a, q));

    // The lines hang off the moved point after a correction.
    h.revise(dd.edit, |k| {
        if let EditKind::IntersectDirectionDistance { distance, .. } = k {
            *distance = length(110.0);
        }
    })
    .unwrap();
    let end = h.model.curve_of(dd.created[2]).unwrap().end();
    assert_abs_diff_eq!(end.y, 2100f64.sqrt(), epsilon = 1e-6);
    h.check().unwrap();
}

#[test]
fn test_line_flags_cannot_be_corrected() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let done = h.execute(two_distances(a, 60.0, b, 80.0)).unwrap();

    let err = h
        .revise(done.edit, |k| {
            if let EditKind::IntersectTwoDistances { add_line1, .. } = k {
                *add_line1 = true;
            }
        })
        .unwrap_err();
    assert!(matches!(err, EditError::Unsupported(_)));
    assert_eq!(h.edit_count(), 3);
}

// ── Directions from other observations ──────────────────────────

#[test]
fn test_angle_deflection_and_parallel_directions() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let rb = h.execute(radial(bearing_from(a, 0.0), 100.0, false)).unwrap();
    let b = rb.created[0];
    let c = h.point(50.0, 50.0).unwrap();

    let by_angle = h.create(radial(angle_from(a, b, 90.0), 10.0, false)).unwrap();
    let by_deflection = h.create(radial(deflection_from(b, a, 90.0), 10.0, false)).unwrap();
    let by_parallel = h.create(radial(parallel_from(c, a, b), 10.0, false)).unwrap();
    assert_at(h.position(by_angle), 10.0, 0.0);
    assert_at(h.position(by_deflection), 10.0, 100.0);
    assert_at(h.position(by_parallel), 50.0, 60.0);

    // Swinging the backsight turns all three.
    let report = h.revise(rb.edit, swing(90.0)).unwrap();
    assert_eq!(report.recomputed.len(), 4);
    assert_at(h.position(b), 100.0, 0.0);
    assert_at(h.position(by_angle), 0.0, -10.0);
    assert_at(h.position(by_deflection), 100.0, -10.0);
    assert_at(h.position(by_parallel), 60.0, 50.0);
    h.check().unwrap();
}

#[test]
fn test_intersection_on_measured_angle() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(0.0, 100.0).unwrap();
    let e = h.point(100.0, 0.0).unwrap();

    let p = h.create(two_directions(angle_from(a, b, 45.0), bearing_from(e, 315.0))).unwrap();
    assert_at(h.position(p), 50.0, 50.0);
}

// ── Arcs ────────────────────────────────────────────────────────

/// Quarter arc of radius 50 about the origin, clockwise from north to east.
fn quarter_arc(h: &mut TestHarness) -> (FeatureId, FeatureId, FeatureId) {
    let o = h.point(0.0, 0.0).unwrap();
    let s = h.point(0.0, 50.0).unwrap();
    let e = h.point(50.0, 0.0).unwrap();
    let arc = h.create(EditKind::NewArc { centre: o, start: s, end: e, clockwise: true }).unwrap();
    (o, e, arc)
}

#[test]
fn test_new_arc() {
    let mut h = TestHarness::new();
    let (o, _, arc) = quarter_arc(&mut h);
    assert_abs_diff_eq!(h.model.curve_of(arc).unwrap().length(), 25.0 * PI, epsilon = 1e-9);

    let s = h.point(0.0, 50.0).unwrap();
    let far = h.point(60.0, 0.0).unwrap();
    let lopsided = EditKind::NewArc { centre: o, start: s, end: far, clockwise: true };
    assert!(matches!(h.execute(lopsided), Err(EditError::GeometricInfeasibility(_))));
}

#[test]
fn test_parallel_to_arc() {
    let mut h = TestHarness::new();
    let (o, e, arc) = quarter_arc(&mut h);

    let inside = h.execute(parallel(arc, 10.0, Side::Right, None, None)).unwrap();
    assert_eq!(inside.created.len(), 3);
    assert_at(h.position(inside.created[0]), 0.0, 40.0);
    assert_at(h.position(inside.created[1]), 40.0, 0.0);
    assert_abs_diff_eq!(h.model.curve_of(inside.created[2]).unwrap().length(), 20.0 * PI, epsilon = 1e-9);

    let outside = h.execute(parallel(arc, 10.0, Side::Left, None, None)).unwrap();
    assert_at(h.position(outside.created[0]), 0.0, 60.0);

    let chord = h.line(o, e).unwrap();
    let clipped = parallel(arc, 10.0, Side::Left, Some(chord), None);
    assert!(matches!(h.execute(clipped), Err(EditError::Unsupported(_))));
}

#[test]
fn test_connection_path_with_curve() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(110.0, 100.0).unwrap();
    let legs = vec![circular_leg(100.0, true, 50.0 * PI), straight_leg(&[10.0])];

    let done = h.execute(connection_path(a, b, legs)).unwrap();
    // centre, curve end, curve, closing segment
    assert_eq!(done.created.len(), 4);
    assert_at(h.position(done.created[0]), 100.0, 0.0);
    assert_at(h.position(done.created[1]), 100.0, 100.0);
    match h.model.feature(done.created[2]).and_then(|f| f.line()) {
        Some(LineGeometry::Arc { centre, start, end, clockwise }) => {
            assert_eq!((*centre, *start, *end, *clockwise), (done.created[0], a, done.created[1], true));
        }
        other => panic!("expected an arc, got {other:?}"),
    }
    assert_eq!(ends(&h, done.created[3]), (done.created[1], b));

    let adjustment = h.model.edit(done.edit).unwrap().adjustment().unwrap();
    assert!(adjustment.misclosure < 1e-9);
    h.check().unwrap();
}

// ── Line edits ──────────────────────────────────────────────────

#[test]
fn test_extend_segment_either_end() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();

    let out = h.execute(extension(ab, true, 20.0, true)).unwrap();
    assert_eq!(out.created.len(), 2);
    assert_at(h.position(out.created[0]), 120.0, 0.0);
    assert_eq!(ends(&h, out.created[1]), (b, out.created[0]));

    let back = h.create(extension(ab, false, 20.0, false)).unwrap();
    assert_at(h.position(back), -20.0, 0.0);
    assert!(h.is_active(ab));

    assert!(matches!(h.execute(extension(ab, true, 0.0, false)), Err(EditError::InvalidInput(_))));
}

#[test]
fn test_extend_arc_along_circle() {
    let mut h = TestHarness::new();
    let (o, e, arc) = quarter_arc(&mut h);

    let out = h.execute(extension(arc, true, 10.0, true)).unwrap();
    let p = out.created[0];
    assert_at(h.position(p), 50.0 * 0.2f64.cos(), -50.0 * 0.2f64.sin());
    match h.model.feature(out.created[1]).and_then(|f| f.line()) {
        Some(LineGeometry::Arc { centre, start, end, clockwise }) => {
            assert_eq!((*centre, *start, *end, *clockwise), (o, e, p, true));
        }
        other => panic!("expected an arc, got {other:?}"),
    }
    assert_abs_diff_eq!(h.model.curve_of(out.created[1]).unwrap().length(), 10.0, epsilon = 1e-9);

    // The circle closes after another 75π metres.
    let all_round = extension(arc, true, 100.0 * PI, false);
    assert!(matches!(h.execute(all_round), Err(EditError::GeometricInfeasibility(_))));
}

#[test]
fn test_simple_split_and_correction() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();

    let done = h.execute(simple_split(ab, 30.0, false)).unwrap();
    let p = done.created[0];
    assert_eq!(done.created.len(), 3);
    assert_at(h.position(p), 30.0, 0.0);
    assert_eq!(ends(&h, done.created[1]), (a, p));
    assert_eq!(ends(&h, done.created[2]), (p, b));
    assert!(!h.is_active(ab));

    h.revise(done.edit, |k| {
        if let EditKind::SimpleLineSubdivision { from_end, .. } = k {
            *from_end = true;
        }
    })
    .unwrap();
    assert_at(h.position(p), 70.0, 0.0);
    h.check().unwrap();

    h.undo().unwrap();
    h.undo().unwrap();
    assert!(h.is_active(ab));
    assert!(!h.is_active(p));
    h.check().unwrap();
}

#[test]
fn test_simple_split_beyond_line_is_infeasible() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();

    assert!(matches!(h.execute(simple_split(ab, 100.0, false)), Err(EditError::GeometricInfeasibility(_))));
    assert!(matches!(h.execute(simple_split(ab, -5.0, false)), Err(EditError::InvalidInput(_))));
    assert!(h.is_active(ab));
}

#[test]
fn test_attach_point_and_correct_ratio() {
    let mut h = TestHarness::new();
    let a = h.point(0.0, 0.0).unwrap();
    let b = h.point(100.0, 0.0).unwrap();
    let ab = h.line(a, b).unwrap();

    let done = h.execute(attach(ab, 0.25)).unwrap();
    let p = done.created[0];
    assert_at(h.position(p), 25.0, 0.0);
    assert!(h.is_active(ab));

    h.revise(done.edit, |k| {
        if let EditKind::AttachPoint { ratio, .. } = k {
            *ratio = 0.5;
        }
    })
    .unwrap();
    assert_at(h.position(p), 50.0, 0.0);

    assert!(matches!(h.execute(attach(ab, 1.5)), Err(EditError::InvalidInput(_))));

    let (_, _, arc) = quarter_arc(&mut h);
    let mid = h.create(attach(arc, 0.5)).unwrap();
    let r = 50.0 / 2f64.sqrt();
    assert_at(h.position(mid), r, r);
}
