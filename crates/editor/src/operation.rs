//! Edit kinds and the per-edit lifecycle record.

use std::collections::BTreeSet;
use std::fmt;

use cogo::PathAdjustment;
use kurbo::{Point, Vec2};

use crate::feature::{FeatureId, FeatureKind};
use crate::observation::{Direction, Distance, Leg, Length, Offset};
use crate::update::UpdateItemCollection;

/// Sequence number of an edit. Edits only depend on lower numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditId(pub u32);

impl EditId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditState {
    Created,
    Executed,
    /// An upstream edit was corrected; geometry is stale
    Changed,
    Recomputed,
    /// Undone. Kept for history, no longer contributes to the map.
    RolledBack,
}

/// Every kind of edit, with its inputs.
#[derive(Debug, Clone, PartialEq)]
pub enum EditKind {
    NewPoint {
        position: Point,
    },
    NewLine {
        start: FeatureId,
        end: FeatureId,
    },
    NewArc {
        centre: FeatureId,
        start: FeatureId,
        end: FeatureId,
        clockwise: bool,
    },
    NewText {
        anchor: FeatureId,
        offset: Vec2,
        text: String,
    },
    /// The `add_*` flags draw lines along the observations, from each
    /// observing point to the intersection.
    IntersectDirectionDistance {
        direction: Direction,
        from: FeatureId,
        distance: Length,
        default: bool,
        add_direction_line: bool,
        add_distance_line: bool,
    },
    IntersectTwoDistances {
        from1: FeatureId,
        distance1: Length,
        from2: FeatureId,
        distance2: Length,
        default: bool,
        add_line1: bool,
        add_line2: bool,
    },
    IntersectTwoDirections {
        direction1: Direction,
        direction2: Direction,
        add_line1: bool,
        add_line2: bool,
    },
    /// With `split` the line is replaced by two sections meeting at the
    /// intersection.
    IntersectDirectionLine {
        direction: Direction,
        line: FeatureId,
        close_to: Point,
        split: bool,
        add_direction_line: bool,
    },
    IntersectTwoLines {
        line1: FeatureId,
        line2: FeatureId,
        close_to: Point,
        split1: bool,
        split2: bool,
    },
    Parallel {
        reference: FeatureId,
        offset: Offset,
        terminal1: Option<FeatureId>,
        terminal2: Option<FeatureId>,
    },
    Radial {
        direction: Direction,
        length: Length,
        add_line: bool,
    },
    LineSubdivision {
        line: FeatureId,
        distances: Vec<Distance>,
    },
    /// Split a line at one point, `distance` from its start (or its end).
    SimpleLineSubdivision {
        line: FeatureId,
        distance: Distance,
        from_end: bool,
    },
    /// A point beyond one end of a line, optionally joined to it.
    LineExtension {
        line: FeatureId,
        from_end: bool,
        length: Distance,
        add_line: bool,
    },
    /// A point on a line, `ratio` of the way from its start.
    AttachPoint {
        line: FeatureId,
        ratio: f64,
    },
    ConnectionPath {
        from: FeatureId,
        to: FeatureId,
        legs: Vec<Leg>,
    },
    Deletion {
        features: Vec<FeatureId>,
    },
    SetTopology {
        line: FeatureId,
        topological: bool,
    },
    /// A correction of an earlier edit. `changes` holds the values that
    /// were applied.
    Update {
        revised: EditId,
        changes: UpdateItemCollection,
    },
}

fn direction_inputs(d: &Direction, out: &mut Vec<(FeatureId, Option<FeatureKind>)>) {
    out.extend(d.features().into_iter().map(|f| (f, Some(FeatureKind::Point))));
}

fn length_input(l: &Length, out: &mut Vec<(FeatureId, Option<FeatureKind>)>) {
    out.extend(l.feature().map(|f| (f, Some(FeatureKind::Point))));
}

impl EditKind {
    pub fn name(&self) -> &'static str {
        match self {
            EditKind::NewPoint { .. } => "new point",
            EditKind::NewLine { .. } => "new line",
            EditKind::NewArc { .. } => "new arc",
            EditKind::NewText { .. } => "new text",
            EditKind::IntersectDirectionDistance { .. } => "direction-distance intersection",
            EditKind::IntersectTwoDistances { .. } => "distance-distance intersection",
            EditKind::IntersectTwoDirections { .. } => "direction-direction intersection",
            EditKind::IntersectDirectionLine { .. } => "direction-line intersection",
            EditKind::IntersectTwoLines { .. } => "line-line intersection",
            EditKind::Parallel { .. } => "parallel line",
            EditKind::Radial { .. } => "radial",
            EditKind::LineSubdivision { .. } => "line subdivision",
            EditKind::SimpleLineSubdivision { .. } => "simple line subdivision",
            EditKind::LineExtension { .. } => "line extension",
            EditKind::AttachPoint { .. } => "attached point",
            EditKind::ConnectionPath { .. } => "connection path",
            EditKind::Deletion { .. } => "deletion",
            EditKind::SetTopology { .. } => "topology change",
            EditKind::Update { .. } => "update",
        }
    }

    /// Whether `correct` may revise this edit.
    pub fn is_revisable(&self) -> bool {
        !matches!(
            self,
            EditKind::Deletion { .. } | EditKind::SetTopology { .. } | EditKind::Update { .. }
        )
    }

    pub fn same_kind(&self, other: &EditKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Input features with the kind each must have (`None` accepts any).
    pub fn typed_inputs(&self) -> Vec<(FeatureId, Option<FeatureKind>)> {
        use FeatureKind::{Line, Point};

        let mut out = Vec::new();
        match self {
            EditKind::NewPoint { .. } => {}
            EditKind::NewLine { start, end } => {
                out.push((*start, Some(Point)));
                out.push((*end, Some(Point)));
            }
            EditKind::NewArc { centre, start, end, .. } => {
                out.push((*centre, Some(Point)));
                out.push((*start, Some(Point)));
                out.push((*end, Some(Point)));
            }
            EditKind::NewText { anchor, .. } => out.push((*anchor, Some(Point))),
            EditKind::IntersectDirectionDistance { direction, from, distance, .. } => {
                direction_inputs(direction, &mut out);
                out.push((*from, Some(Point)));
                length_input(distance, &mut out);
            }
            EditKind::IntersectTwoDistances { from1, distance1, from2, distance2, .. } => {
                out.push((*from1, Some(Point)));
                length_input(distance1, &mut out);
                out.push((*from2, Some(Point)));
                length_input(distance2, &mut out);
            }
            EditKind::IntersectTwoDirections { direction1, direction2, .. } => {
                direction_inputs(direction1, &mut out);
                direction_inputs(direction2, &mut out);
            }
            EditKind::IntersectDirectionLine { direction, line, .. } => {
                direction_inputs(direction, &mut out);
                out.push((*line, Some(Line)));
            }
            EditKind::IntersectTwoLines { line1, line2, .. } => {
                out.push((*line1, Some(Line)));
                out.push((*line2, Some(Line)));
            }
            EditKind::Parallel { reference, offset, terminal1, terminal2 } => {
                out.push((*reference, Some(Line)));
                out.extend(offset.feature().map(|f| (f, Some(Point))));
                out.extend(terminal1.map(|f| (f, Some(Line))));
                out.extend(terminal2.map(|f| (f, Some(Line))));
            }
            EditKind::Radial { direction, length, .. } => {
                direction_inputs(direction, &mut out);
                length_input(length, &mut out);
            }
            EditKind::LineSubdivision { line, .. }
            | EditKind::SimpleLineSubdivision { line, .. }
            | EditKind::LineExtension { line, .. }
            | EditKind::AttachPoint { line, .. } => out.push((*line, Some(Line))),
            EditKind::ConnectionPath { from, to, .. } => {
                out.push((*from, Some(Point)));
                out.push((*to, Some(Point)));
            }
            EditKind::Deletion { features } => out.extend(features.iter().map(|f| (*f, None))),
            EditKind::SetTopology { line, .. } => out.push((*line, Some(Line))),
            EditKind::Update { changes, .. } => out.extend(changes.features().into_iter().map(|f| (f, None))),
        }
        out
    }

    /// Features this edit reads.
    pub fn required_features(&self) -> BTreeSet<FeatureId> {
        self.typed_inputs().into_iter().map(|(f, _)| f).collect()
    }
}

/// An edit in the history, with what it produced.
#[derive(Debug, Clone)]
pub struct Edit {
    pub id: EditId,
    pub kind: EditKind,
    pub(crate) state: EditState,
    /// One feature per calculated output, in calculation order. Includes
    /// existing points adopted by an intersection.
    pub(crate) outputs: Vec<FeatureId>,
    /// Existing points adopted instead of creating new ones
    pub(crate) reused: Vec<FeatureId>,
    /// Features this edit switched off (restored on undo)
    pub(crate) deactivated: Vec<FeatureId>,
    /// Values an update swapped out of the revised edit
    pub(crate) previous: Option<UpdateItemCollection>,
    pub(crate) previous_topology: Option<bool>,
    pub(crate) alternate: Option<Point>,
    pub(crate) adjustment: Option<PathAdjustment>,
}

impl Edit {
    pub(crate) fn new(id: EditId, kind: EditKind) -> Self {
        Self {
            id,
            kind,
            state: EditState::Created,
            outputs: Vec::new(),
            reused: Vec::new(),
            deactivated: Vec::new(),
            previous: None,
            previous_topology: None,
            alternate: None,
            adjustment: None,
        }
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    /// Executed and not undone.
    pub fn is_active(&self) -> bool {
        !matches!(self.state, EditState::Created | EditState::RolledBack)
    }

    pub fn is_changed(&self) -> bool {
        self.state == EditState::Changed
    }

    /// Features this edit created, in creation order.
    pub fn created(&self) -> Vec<FeatureId> {
        self.outputs.iter().copied().filter(|f| !self.reused.contains(f)).collect()
    }

    pub fn outputs(&self) -> &[FeatureId] {
        &self.outputs
    }

    pub fn deactivated(&self) -> &[FeatureId] {
        &self.deactivated
    }

    /// Every feature this edit is registered as a dependent of.
    pub fn required_features(&self) -> BTreeSet<FeatureId> {
        let mut set = self.kind.required_features();
        set.extend(self.reused.iter().copied());
        set.extend(self.deactivated.iter().copied());
        if let Some(previous) = &self.previous {
            set.extend(previous.features());
        }
        set
    }

    /// The solution not picked by a two-way intersection.
    pub fn alternate(&self) -> Option<Point> {
        self.alternate
    }

    /// Fit report of a connection path.
    pub fn adjustment(&self) -> Option<&PathAdjustment> {
        self.adjustment.as_ref()
    }

    /// The edit an update revises.
    pub fn revised(&self) -> Option<EditId> {
        match self.kind {
            EditKind::Update { revised, .. } => Some(revised),
            _ => None,
        }
    }
}
