//! Per-kind calculations.
//!
//! A calculation reads the model and returns [`Draft`]s: the features the
//! edit should own, in a fixed order. Execute turns drafts into new
//! features; rollforward writes them over the features made the first
//! time, so the layout must not change between the two.

use cogo::intersect::{
    circle_circle, closest_to, direction_circle, direction_circle_reduced, direction_direction,
};
use cogo::parallel::{clip_to_terminal, non_degenerate, parallel_arc, parallel_arc_through};
use cogo::parallel::{parallel_by_distance, parallel_through};
use cogo::sideshot::sideshot;
use cogo::{adjust_path, proportion, Curve, PathAdjustment, TINY};
use kurbo::{Point, Vec2};

use crate::error::{infeasible, invalid, EditError, Result};
use crate::feature::{FeatureId, FeatureKind, Geometry, LineGeometry};
use crate::model::MapModel;
use crate::observation::{Distance, Leg, Offset};
use crate::operation::{EditId, EditKind};

/// End point of a drafted line: an existing point, or an earlier draft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Anchor {
    Existing(FeatureId),
    Draft(usize),
}

impl Anchor {
    pub(crate) fn resolve(self, outputs: &[FeatureId]) -> FeatureId {
        match self {
            Anchor::Existing(id) => id,
            Anchor::Draft(i) => outputs[i],
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Draft {
    Point(Point),
    /// A point that may coincide with one already in the map
    SharedPoint(Point),
    Segment {
        start: Anchor,
        end: Anchor,
    },
    Arc {
        centre: Anchor,
        start: Anchor,
        end: Anchor,
        clockwise: bool,
    },
    Text {
        anchor: Anchor,
        offset: Vec2,
        text: String,
    },
}

impl Draft {
    pub(crate) fn kind(&self) -> FeatureKind {
        match self {
            Draft::Point(_) | Draft::SharedPoint(_) => FeatureKind::Point,
            Draft::Segment { .. } | Draft::Arc { .. } => FeatureKind::Line,
            Draft::Text { .. } => FeatureKind::Text,
        }
    }

    /// Geometry of the draft once its anchors are known.
    pub(crate) fn geometry(&self, outputs: &[FeatureId]) -> Geometry {
        match self {
            Draft::Point(p) | Draft::SharedPoint(p) => Geometry::Point(*p),
            Draft::Segment { start, end } => Geometry::Line(LineGeometry::Segment {
                start: start.resolve(outputs),
                end: end.resolve(outputs),
            }),
            Draft::Arc { centre, start, end, clockwise } => Geometry::Line(LineGeometry::Arc {
                centre: centre.resolve(outputs),
                start: start.resolve(outputs),
                end: end.resolve(outputs),
                clockwise: *clockwise,
            }),
            Draft::Text { anchor, offset, text } => Geometry::Text {
                anchor: anchor.resolve(outputs),
                offset: *offset,
                text: text.clone(),
            },
        }
    }
}

/// Output of one calculation.
#[derive(Debug, Clone, Default)]
pub(crate) struct Calculation {
    pub drafts: Vec<Draft>,
    /// Branch a two-way intersection did not pick
    pub alternate: Option<Point>,
    pub adjustment: Option<PathAdjustment>,
}

impl Calculation {
    fn of(drafts: Vec<Draft>) -> Self {
        Self { drafts, ..Self::default() }
    }
}

/// Run the calculation for an edit kind against the current model.
pub(crate) fn calculate(model: &MapModel, kind: &EditKind) -> Result<Calculation> {
    match kind {
        EditKind::NewPoint { position } => Ok(Calculation::of(vec![Draft::Point(*position)])),

        EditKind::NewLine { start, end } => {
            let a = model.position_of(*start)?;
            let b = model.position_of(*end)?;
            if a.distance(b) < TINY {
                return Err(invalid(format!("line from {} to {} has no length", start, end)));
            }
            Ok(Calculation::of(vec![Draft::Segment {
                start: Anchor::Existing(*start),
                end: Anchor::Existing(*end),
            }]))
        }

        EditKind::NewArc { centre, start, end, clockwise } => {
            let c = model.position_of(*centre)?;
            let r1 = c.distance(model.position_of(*start)?);
            let r2 = c.distance(model.position_of(*end)?);
            if r1 < TINY {
                return Err(infeasible("arc has no radius"));
            }
            if (r1 - r2).abs() > model.services.point_tolerance {
                return Err(infeasible(format!(
                    "arc ends are {:.4} and {:.4} from the centre",
                    r1, r2
                )));
            }
            Ok(Calculation::of(vec![Draft::Arc {
                centre: Anchor::Existing(*centre),
                start: Anchor::Existing(*start),
                end: Anchor::Existing(*end),
                clockwise: *clockwise,
            }]))
        }

        EditKind::NewText { anchor, offset, text } => {
            model.position_of(*anchor)?;
            Ok(Calculation::of(vec![Draft::Text {
                anchor: Anchor::Existing(*anchor),
                offset: *offset,
                text: text.clone(),
            }]))
        }

        EditKind::IntersectDirectionDistance {
            direction,
            from,
            distance,
            default,
            add_direction_line,
            add_distance_line,
        } => {
            let dir = model.resolve_direction(direction)?;
            let centre = model.position_of(*from)?;
            let (radius, planar) = model.resolve_length(distance, centre)?;
            let cs = model.services.coords.as_ref();
            let solution = if planar {
                direction_circle(dir.start, dir.bearing, centre, radius)
            } else {
                direction_circle_reduced(dir.start, dir.bearing, centre, radius, cs)
            }
            .ok_or_else(|| infeasible(format!("direction does not reach {:.4} from {}", radius, from)))?;
            let p = solution.pick(*default);
            let mut drafts = vec![Draft::Point(p)];
            if *add_direction_line {
                drafts.push(observed_line(model, direction.from, p)?);
            }
            if *add_distance_line {
                drafts.push(observed_line(model, *from, p)?);
            }
            Ok(Calculation { drafts, alternate: solution.alternate(*default), adjustment: None })
        }

        EditKind::IntersectTwoDistances { from1, distance1, from2, distance2, default, add_line1, add_line2 } => {
            let c1 = model.position_of(*from1)?;
            let c2 = model.position_of(*from2)?;
            let (r1, planar1) = model.resolve_length(distance1, c1)?;
            let (r2, planar2) = model.resolve_length(distance2, c2)?;
            let no_solution = || infeasible(format!("circles about {} and {} do not meet", from1, from2));

            let approx = circle_circle(c1, r1, c2, r2).ok_or_else(no_solution)?.pick(*default);
            let cs = model.services.coords.as_ref();
            let r1 = if planar1 { r1 } else { cs.reduce(r1, c1, approx) };
            let r2 = if planar2 { r2 } else { cs.reduce(r2, c2, approx) };
            let solution = circle_circle(c1, r1, c2, r2).ok_or_else(no_solution)?;
            let p = solution.pick(*default);
            let mut drafts = vec![Draft::Point(p)];
            if *add_line1 {
                drafts.push(observed_line(model, *from1, p)?);
            }
            if *add_line2 {
                drafts.push(observed_line(model, *from2, p)?);
            }
            Ok(Calculation { drafts, alternate: solution.alternate(*default), adjustment: None })
        }

        EditKind::IntersectTwoDirections { direction1, direction2, add_line1, add_line2 } => {
            let d1 = model.resolve_direction(direction1)?;
            let d2 = model.resolve_direction(direction2)?;
            let p = direction_direction(d1.start, d1.bearing, d2.start, d2.bearing)
                .ok_or_else(|| infeasible("directions do not meet"))?;
            let mut drafts = vec![Draft::Point(p)];
            if *add_line1 {
                drafts.push(observed_line(model, direction1.from, p)?);
            }
            if *add_line2 {
                drafts.push(observed_line(model, direction2.from, p)?);
            }
            Ok(Calculation::of(drafts))
        }

        EditKind::IntersectDirectionLine { direction, line, close_to, split, add_direction_line } => {
            let dir = model.resolve_direction(direction)?;
            let curve = model.curve_of(*line)?;
            let crossings = curve.intersect_direction(dir.start, dir.bearing);
            let p = closest_to(&crossings, *close_to)
                .ok_or_else(|| infeasible(format!("direction does not cross {}", line)))?;
            let mut drafts = vec![Draft::SharedPoint(p)];
            if *add_direction_line {
                drafts.push(observed_line(model, direction.from, p)?);
            }
            if *split {
                drafts.extend(split_at_intersection(model, *line, p)?);
            }
            Ok(Calculation::of(drafts))
        }

        EditKind::IntersectTwoLines { line1, line2, close_to, split1, split2 } => {
            let a = model.curve_of(*line1)?;
            let b = model.curve_of(*line2)?;
            let p = closest_to(&a.intersect(&b), *close_to)
                .ok_or_else(|| infeasible(format!("{} and {} do not cross", line1, line2)))?;
            let mut drafts = vec![Draft::SharedPoint(p)];
            if *split1 {
                drafts.extend(split_at_intersection(model, *line1, p)?);
            }
            if *split2 {
                drafts.extend(split_at_intersection(model, *line2, p)?);
            }
            Ok(Calculation::of(drafts))
        }

        EditKind::Parallel { reference, offset, terminal1, terminal2 } => {
            parallel(model, *reference, offset, *terminal1, *terminal2)
        }

        EditKind::Radial { direction, length, add_line } => {
            let dir = model.resolve_direction(direction)?;
            let (len, planar) = model.resolve_length(length, dir.start)?;
            let p = sideshot(dir.start, dir.bearing, len, planar, model.services.coords.as_ref())
                .ok_or_else(|| invalid("radial has no length"))?;
            let mut drafts = vec![Draft::Point(p)];
            if *add_line {
                drafts.push(Draft::Segment {
                    start: Anchor::Existing(direction.from),
                    end: Anchor::Draft(0),
                });
            }
            Ok(Calculation::of(drafts))
        }

        EditKind::LineSubdivision { line, distances } => subdivide(model, *line, distances),

        EditKind::SimpleLineSubdivision { line, distance, from_end } => {
            let curve = model.curve_of(*line)?;
            let len = curve.length();
            let ground = distance.in_meters();
            if ground < TINY || ground >= len {
                return Err(infeasible(format!("{} is {:.4} long, cannot split it at {:.4}", line, len, ground)));
            }
            let along = |d: f64| if *from_end { len - d } else { d };
            let origin = if *from_end { curve.end() } else { curve.start() };
            let plan = model.services.coords.reduce(ground, origin, curve.point_at(along(ground)));
            if plan < TINY || plan >= len {
                return Err(infeasible(format!("{} is too short to split at {:.4}", line, ground)));
            }
            let mut drafts = vec![Draft::Point(curve.point_at(along(plan)))];
            drafts.extend(sections(&line_geometry(model, *line)?, &[Anchor::Draft(0)]));
            Ok(Calculation::of(drafts))
        }

        EditKind::LineExtension { line, from_end, length, add_line } => {
            let curve = model.curve_of(*line)?;
            let ground = length.in_meters();
            let origin = if *from_end { curve.end() } else { curve.start() };
            let unreachable = || infeasible(format!("{} cannot be extended by {:.4}", line, ground));
            let approx = curve.extension(*from_end, ground).ok_or_else(unreachable)?;
            let plan = model.services.coords.reduce(ground, origin, approx);
            let p = curve.extension(*from_end, plan).ok_or_else(unreachable)?;

            let mut drafts = vec![Draft::Point(p)];
            if *add_line {
                let geometry = line_geometry(model, *line)?;
                let end = Anchor::Existing(if *from_end { geometry.end() } else { geometry.start() });
                drafts.push(match geometry {
                    LineGeometry::Segment { .. } => Draft::Segment { start: end, end: Anchor::Draft(0) },
                    // The extension keeps the arc's sense, so it runs into the
                    // start or out of the end.
                    LineGeometry::Arc { centre, clockwise, .. } => {
                        let (start, end) = if *from_end { (end, Anchor::Draft(0)) } else { (Anchor::Draft(0), end) };
                        Draft::Arc { centre: Anchor::Existing(centre), start, end, clockwise }
                    }
                });
            }
            Ok(Calculation::of(drafts))
        }

        EditKind::AttachPoint { line, ratio } => {
            if !(0.0..=1.0).contains(ratio) {
                return Err(invalid(format!("position ratio {} is not between 0 and 1", ratio)));
            }
            let curve = model.curve_of(*line)?;
            Ok(Calculation::of(vec![Draft::Point(curve.point_at(ratio * curve.length()))]))
        }

        EditKind::ConnectionPath { from, to, legs } => connection_path(model, *from, *to, legs),

        EditKind::Deletion { .. } | EditKind::SetTopology { .. } => Ok(Calculation::default()),

        EditKind::Update { .. } => Err(EditError::Unsupported("updates have no calculation")),
    }
}

fn parallel(
    model: &MapModel,
    reference: FeatureId,
    offset: &Offset,
    terminal1: Option<FeatureId>,
    terminal2: Option<FeatureId>,
) -> Result<Calculation> {
    let cs = model.services.coords.as_ref();
    match model.curve_of(reference)? {
        Curve::Segment(l) => {
            let (a, b) = (l.p0, l.p1);
            let (mut start, mut end) = match offset {
                Offset::Distance { distance, side } => {
                    parallel_by_distance(a, b, side.sign() * distance.in_meters(), cs)
                }
                Offset::Point(p) => parallel_through(a, b, model.position_of(*p)?),
            }
            .ok_or_else(|| infeasible("reference line has no length"))?;

            let reach = a.distance(b);
            let (s0, e0) = (start, end);
            if let Some(t) = terminal1 {
                start = clip_to_terminal(s0, e0, &model.curve_of(t)?, reach)
                    .ok_or_else(|| infeasible(format!("parallel does not reach terminal {}", t)))?;
            }
            if let Some(t) = terminal2 {
                end = clip_to_terminal(e0, s0, &model.curve_of(t)?, reach)
                    .ok_or_else(|| infeasible(format!("parallel does not reach terminal {}", t)))?;
            }
            let (start, end) =
                non_degenerate(start, end).ok_or_else(|| infeasible("parallel collapsed to a point"))?;

            Ok(Calculation::of(vec![
                Draft::Point(start),
                Draft::Point(end),
                Draft::Segment { start: Anchor::Draft(0), end: Anchor::Draft(1) },
            ]))
        }
        Curve::Arc(arc) => {
            if terminal1.is_some() || terminal2.is_some() {
                return Err(EditError::Unsupported("terminal lines on a parallel to an arc"));
            }
            let centre = match model.require_feature(reference)?.line() {
                Some(LineGeometry::Arc { centre, .. }) => *centre,
                _ => return Err(invalid(format!("{} is not an arc", reference))),
            };
            let shifted = match offset {
                Offset::Distance { distance, side } => {
                    let plan = cs.reduce(distance.in_meters(), arc.centre, arc.start);
                    parallel_arc(&arc, side.sign() * plan)
                }
                Offset::Point(p) => parallel_arc_through(&arc, model.position_of(*p)?),
            }
            .ok_or_else(|| infeasible("parallel arc has no radius"))?;

            Ok(Calculation::of(vec![
                Draft::Point(shifted.start),
                Draft::Point(shifted.end),
                Draft::Arc {
                    centre: Anchor::Existing(centre),
                    start: Anchor::Draft(0),
                    end: Anchor::Draft(1),
                    clockwise: shifted.clockwise,
                },
            ]))
        }
    }
}

/// Segment from an observing point to a calculated one.
fn observed_line(model: &MapModel, from: FeatureId, to: Point) -> Result<Draft> {
    if model.position_of(from)?.distance(to) < TINY {
        return Err(infeasible(format!("intersection lies on {}, no line to draw", from)));
    }
    Ok(Draft::Segment { start: Anchor::Existing(from), end: Anchor::Draft(0) })
}

fn line_geometry(model: &MapModel, line: FeatureId) -> Result<LineGeometry> {
    model
        .require_feature(line)?
        .line()
        .cloned()
        .ok_or_else(|| invalid(format!("{} is not a line", line)))
}

/// Sections of a line through `points`, first to last. Arcs keep their
/// centre and sense.
fn sections(geometry: &LineGeometry, points: &[Anchor]) -> Vec<Draft> {
    let mut ends = Vec::with_capacity(points.len() + 2);
    ends.push(Anchor::Existing(geometry.start()));
    ends.extend_from_slice(points);
    ends.push(Anchor::Existing(geometry.end()));
    ends.windows(2)
        .map(|w| match *geometry {
            LineGeometry::Segment { .. } => Draft::Segment { start: w[0], end: w[1] },
            LineGeometry::Arc { centre, clockwise, .. } => Draft::Arc {
                centre: Anchor::Existing(centre),
                start: w[0],
                end: w[1],
                clockwise,
            },
        })
        .collect()
}

/// The two sections of `line` either side of the intersection (draft 0).
fn split_at_intersection(model: &MapModel, line: FeatureId, p: Point) -> Result<Vec<Draft>> {
    let curve = model.curve_of(line)?;
    let tolerance = model.services.point_tolerance.max(TINY);
    if p.distance(curve.start()) <= tolerance || p.distance(curve.end()) <= tolerance {
        return Err(infeasible(format!("intersection is at an end of {}, nothing to split", line)));
    }
    Ok(sections(&line_geometry(model, line)?, &[Anchor::Draft(0)]))
}

/// Split a line at proportioned distances. Drafts are the intermediate
/// points followed by the sections, first to last.
fn subdivide(model: &MapModel, line: FeatureId, distances: &[Distance]) -> Result<Calculation> {
    if distances.len() < 2 {
        return Err(invalid("a subdivision needs at least two distances"));
    }
    let geometry = line_geometry(model, line)?;
    let curve = model.curve_of(line)?;

    let lsf = model.services.coords.line_scale_factor(curve.start(), curve.end());
    let legs: Vec<cogo::Leg> = distances
        .iter()
        .map(|d| cogo::Leg { length: d.in_meters() * lsf, fixed: d.fixed })
        .collect();
    let lengths = proportion(&legs, curve.length())?;

    let n = lengths.len();
    let mut drafts = Vec::with_capacity(2 * n - 1);
    let mut along = 0.0;
    for len in &lengths[..n - 1] {
        along += len;
        drafts.push(Draft::Point(curve.point_at(along)));
    }
    let points: Vec<Anchor> = (0..n - 1).map(Anchor::Draft).collect();
    drafts.extend(sections(&geometry, &points));
    Ok(Calculation::of(drafts))
}

/// Points at every leg end (and curve centre) between two existing points,
/// joined by segments and arcs. The final leg ends on `to` itself.
fn connection_path(model: &MapModel, from: FeatureId, to: FeatureId, legs: &[Leg]) -> Result<Calculation> {
    if legs.is_empty() {
        return Err(invalid("a connection path needs at least one leg"));
    }
    let path_legs: Vec<_> = legs.iter().map(Leg::to_path_leg).collect();
    let adjustment = adjust_path(
        model.position_of(from)?,
        model.position_of(to)?,
        &path_legs,
        model.services.coords.as_ref(),
    )?;

    let last = adjustment.points.len().saturating_sub(1);
    let mut drafts = Vec::new();
    let mut at = Anchor::Existing(from);
    let mut points = adjustment.points.iter().enumerate();
    let next_end = |drafts: &mut Vec<Draft>, index: usize, p: Point| {
        if index == last {
            Anchor::Existing(to)
        } else {
            drafts.push(Draft::Point(p));
            Anchor::Draft(drafts.len() - 1)
        }
    };

    for leg in legs {
        match leg {
            Leg::Straight { distances, .. } => {
                for _ in distances {
                    let (index, p) = points.next().ok_or_else(|| infeasible("path ran out of points"))?;
                    let end = next_end(&mut drafts, index, p.position);
                    drafts.push(Draft::Segment { start: at, end });
                    at = end;
                }
            }
            Leg::Circular { clockwise, .. } => {
                let (_, c) = points.next().ok_or_else(|| infeasible("path ran out of points"))?;
                drafts.push(Draft::Point(c.position));
                let centre = Anchor::Draft(drafts.len() - 1);
                let (index, p) = points.next().ok_or_else(|| infeasible("path ran out of points"))?;
                let end = next_end(&mut drafts, index, p.position);
                drafts.push(Draft::Arc { centre, start: at, end, clockwise: *clockwise });
                at = end;
            }
        }
    }

    tracing::debug!(
        precision = %adjustment.precision,
        rotation = adjustment.rotation,
        scale = adjustment.scale,
        "connection path calculated"
    );

    Ok(Calculation { drafts, alternate: None, adjustment: Some(adjustment) })
}

/// Features a deletion switches off: the named ones, lines starting or
/// ending at a deleted point, and text anchored to one. Anything else that
/// still uses the batch blocks the deletion.
pub(crate) fn deletion_batch(model: &MapModel, features: &[FeatureId]) -> Result<Vec<FeatureId>> {
    let mut batch: Vec<FeatureId> = Vec::new();
    for f in features {
        if !batch.contains(f) {
            batch.push(*f);
        }
    }
    let points: Vec<FeatureId> = batch
        .iter()
        .copied()
        .filter(|f| model.feature(*f).map(|x| x.kind() == FeatureKind::Point).unwrap_or(false))
        .collect();

    for f in model.active_features() {
        if batch.contains(&f.id) {
            continue;
        }
        let attached = match &f.geometry {
            Geometry::Line(l) => points.iter().any(|p| l.touches(*p)),
            Geometry::Text { anchor, .. } => points.contains(anchor),
            Geometry::Point(_) => false,
        };
        if attached {
            batch.push(f.id);
        }
    }

    // A dependent that made a line through a deleted point goes quietly only
    // when everything it made is deleted too. Users of those features are
    // dependents of the batch in their own right.
    let goes_with_batch = |d: EditId| -> bool {
        let created = model.edit(d).map(|e| e.created()).unwrap_or_default();
        !created.is_empty() && created.iter().all(|c| batch.contains(c))
    };
    let mut blockers: Vec<EditId> = Vec::new();
    for f in &batch {
        let feature = model.require_feature(*f)?;
        for d in feature.dependents() {
            if !blockers.contains(d) && !goes_with_batch(*d) {
                blockers.push(*d);
            }
        }
    }
    if !blockers.is_empty() {
        blockers.sort();
        return Err(EditError::DependencyViolation {
            subject: format!("deletion of {:?}", features),
            dependents: blockers,
        });
    }
    Ok(batch)
}
