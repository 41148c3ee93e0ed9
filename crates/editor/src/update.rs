//! Corrections as collections of changed fields.
//!
//! Applying an [`UpdateItemCollection`] to an edit swaps each stored value
//! with the edit's current one. The collection then holds the old values,
//! so applying it again puts the edit back the way it was.

use std::collections::BTreeSet;
use std::mem;

use kurbo::{Point, Vec2};

use crate::error::{invalid, Result};
use crate::feature::FeatureId;
use crate::observation::{Direction, Distance, Leg, Length, Offset};
use crate::operation::EditKind;

/// Value of one revisable field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Feature(FeatureId),
    MaybeFeature(Option<FeatureId>),
    Position(Point),
    Vector(Vec2),
    Text(String),
    Flag(bool),
    Length(Length),
    Direction(Direction),
    Offset(Offset),
    Distance(Distance),
    Distances(Vec<Distance>),
    Legs(Vec<Leg>),
    /// Proportion of a line's length
    Ratio(f64),
}

impl FieldValue {
    pub fn features(&self) -> Vec<FeatureId> {
        match self {
            FieldValue::Feature(f) => vec![*f],
            FieldValue::MaybeFeature(f) => f.iter().copied().collect(),
            FieldValue::Length(l) => l.feature().into_iter().collect(),
            FieldValue::Direction(d) => d.features(),
            FieldValue::Offset(o) => o.feature().into_iter().collect(),
            FieldValue::Position(_)
            | FieldValue::Vector(_)
            | FieldValue::Text(_)
            | FieldValue::Flag(_)
            | FieldValue::Distance(_)
            | FieldValue::Distances(_)
            | FieldValue::Legs(_)
            | FieldValue::Ratio(_) => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateItem {
    pub field: &'static str,
    pub value: FieldValue,
}

/// Changed fields of one edit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateItemCollection {
    items: Vec<UpdateItem>,
}

impl UpdateItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, field: &'static str, value: FieldValue) {
        self.items.push(UpdateItem { field, value });
    }

    pub fn items(&self) -> &[UpdateItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.items.iter().find(|i| i.field == field).map(|i| &i.value)
    }

    /// Field names, for logging.
    pub fn field_names(&self) -> Vec<&'static str> {
        self.items.iter().map(|i| i.field).collect()
    }

    /// Features named by any value in the collection.
    pub fn features(&self) -> BTreeSet<FeatureId> {
        self.items.iter().flat_map(|i| i.value.features()).collect()
    }

    /// Fields of `revised` that differ from `current`, holding the revised
    /// values.
    pub fn diff(current: &EditKind, revised: &EditKind) -> Result<Self> {
        if !current.same_kind(revised) {
            return Err(invalid(format!(
                "cannot revise a {} into a {}",
                current.name(),
                revised.name()
            )));
        }
        let items = fields(current)
            .into_iter()
            .zip(fields(revised))
            .filter(|(old, new)| old.value != new.value)
            .map(|(_, new)| new)
            .collect();
        Ok(Self { items })
    }

    /// Swap every value with the matching field of `kind`.
    pub fn exchange(&mut self, kind: &mut EditKind) -> Result<()> {
        let name = kind.name();
        for item in &mut self.items {
            let mut available = slots(kind);
            let slot = available
                .iter_mut()
                .find(|(field, _)| *field == item.field)
                .map(|(_, s)| s)
                .ok_or_else(|| invalid(format!("a {} has no field '{}'", name, item.field)))?;
            if !slot.swap(&mut item.value) {
                return Err(invalid(format!("wrong value type for field '{}'", item.field)));
            }
        }
        Ok(())
    }
}

/// Current value of every revisable field, in a fixed order.
pub fn fields(kind: &EditKind) -> Vec<UpdateItem> {
    let mut copy = kind.clone();
    slots(&mut copy)
        .into_iter()
        .map(|(field, slot)| UpdateItem { field, value: slot.get() })
        .collect()
}

/// Static name of a field, looked up by its spelling.
pub fn field_name(kind: &EditKind, name: &str) -> Option<&'static str> {
    fields(kind).into_iter().map(|i| i.field).find(|f| *f == name)
}

/// Mutable access to one field.
enum Slot<'a> {
    Feature(&'a mut FeatureId),
    MaybeFeature(&'a mut Option<FeatureId>),
    Position(&'a mut Point),
    Vector(&'a mut Vec2),
    Text(&'a mut String),
    Flag(&'a mut bool),
    Length(&'a mut Length),
    Direction(&'a mut Direction),
    Offset(&'a mut Offset),
    Distance(&'a mut Distance),
    Distances(&'a mut Vec<Distance>),
    Legs(&'a mut Vec<Leg>),
    Ratio(&'a mut f64),
}

impl Slot<'_> {
    fn get(&self) -> FieldValue {
        match self {
            Slot::Feature(v) => FieldValue::Feature(**v),
            Slot::MaybeFeature(v) => FieldValue::MaybeFeature(**v),
            Slot::Position(v) => FieldValue::Position(**v),
            Slot::Vector(v) => FieldValue::Vector(**v),
            Slot::Text(v) => FieldValue::Text((**v).clone()),
            Slot::Flag(v) => FieldValue::Flag(**v),
            Slot::Length(v) => FieldValue::Length(**v),
            Slot::Direction(v) => FieldValue::Direction(**v),
            Slot::Offset(v) => FieldValue::Offset(**v),
            Slot::Distance(v) => FieldValue::Distance(**v),
            Slot::Distances(v) => FieldValue::Distances((**v).clone()),
            Slot::Legs(v) => FieldValue::Legs((**v).clone()),
            Slot::Ratio(v) => FieldValue::Ratio(**v),
        }
    }

    fn swap(&mut self, value: &mut FieldValue) -> bool {
        match (self, value) {
            (Slot::Feature(s), FieldValue::Feature(v)) => mem::swap(*s, v),
            (Slot::MaybeFeature(s), FieldValue::MaybeFeature(v)) => mem::swap(*s, v),
            (Slot::Position(s), FieldValue::Position(v)) => mem::swap(*s, v),
            (Slot::Vector(s), FieldValue::Vector(v)) => mem::swap(*s, v),
            (Slot::Text(s), FieldValue::Text(v)) => mem::swap(*s, v),
            (Slot::Flag(s), FieldValue::Flag(v)) => mem::swap(*s, v),
            (Slot::Length(s), FieldValue::Length(v)) => mem::swap(*s, v),
            (Slot::Direction(s), FieldValue::Direction(v)) => mem::swap(*s, v),
            (Slot::Offset(s), FieldValue::Offset(v)) => mem::swap(*s, v),
            (Slot::Distance(s), FieldValue::Distance(v)) => mem::swap(*s, v),
            (Slot::Distances(s), FieldValue::Distances(v)) => mem::swap(*s, v),
            (Slot::Legs(s), FieldValue::Legs(v)) => mem::swap(*s, v),
            (Slot::Ratio(s), FieldValue::Ratio(v)) => mem::swap(*s, v),
            _ => return false,
        }
        true
    }
}

fn slots(kind: &mut EditKind) -> Vec<(&'static str, Slot<'_>)> {
    match kind {
        EditKind::NewPoint { position } => vec![("position", Slot::Position(position))],
        EditKind::NewLine { start, end } => {
            vec![("start", Slot::Feature(start)), ("end", Slot::Feature(end))]
        }
        EditKind::NewArc { centre, start, end, clockwise } => vec![
            ("centre", Slot::Feature(centre)),
            ("start", Slot::Feature(start)),
            ("end", Slot::Feature(end)),
            ("clockwise", Slot::Flag(clockwise)),
        ],
        EditKind::NewText { anchor, offset, text } => vec![
            ("anchor", Slot::Feature(anchor)),
            ("offset", Slot::Vector(offset)),
            ("text", Slot::Text(text)),
        ],
        EditKind::IntersectDirectionDistance {
            direction,
            from,
            distance,
            default,
            add_direction_line,
            add_distance_line,
        } => vec![
            ("direction", Slot::Direction(direction)),
            ("from", Slot::Feature(from)),
            ("distance", Slot::Length(distance)),
            ("default", Slot::Flag(default)),
            ("add_direction_line", Slot::Flag(add_direction_line)),
            ("add_distance_line", Slot::Flag(add_distance_line)),
        ],
        EditKind::IntersectTwoDistances { from1, distance1, from2, distance2, default, add_line1, add_line2 } => {
            vec![
                ("from1", Slot::Feature(from1)),
                ("distance1", Slot::Length(distance1)),
                ("from2", Slot::Feature(from2)),
                ("distance2", Slot::Length(distance2)),
                ("default", Slot::Flag(default)),
                ("add_line1", Slot::Flag(add_line1)),
                ("add_line2", Slot::Flag(add_line2)),
            ]
        }
        EditKind::IntersectTwoDirections { direction1, direction2, add_line1, add_line2 } => vec![
            ("direction1", Slot::Direction(direction1)),
            ("direction2", Slot::Direction(direction2)),
            ("add_line1", Slot::Flag(add_line1)),
            ("add_line2", Slot::Flag(add_line2)),
        ],
        EditKind::IntersectDirectionLine { direction, line, close_to, split, add_direction_line } => vec![
            ("direction", Slot::Direction(direction)),
            ("line", Slot::Feature(line)),
            ("close_to", Slot::Position(close_to)),
            ("split", Slot::Flag(split)),
            ("add_direction_line", Slot::Flag(add_direction_line)),
        ],
        EditKind::IntersectTwoLines { line1, line2, close_to, split1, split2 } => vec![
            ("line1", Slot::Feature(line1)),
            ("line2", Slot::Feature(line2)),
            ("close_to", Slot::Position(close_to)),
            ("split1", Slot::Flag(split1)),
            ("split2", Slot::Flag(split2)),
        ],
        EditKind::Parallel { reference, offset, terminal1, terminal2 } => vec![
            ("reference", Slot::Feature(reference)),
            ("offset", Slot::Offset(offset)),
            ("terminal1", Slot::MaybeFeature(terminal1)),
            ("terminal2", Slot::MaybeFeature(terminal2)),
        ],
        EditKind::Radial { direction, length, add_line } => vec![
            ("direction", Slot::Direction(direction)),
            ("length", Slot::Length(length)),
            ("add_line", Slot::Flag(add_line)),
        ],
        EditKind::LineSubdivision { line, distances } => vec![
            ("line", Slot::Feature(line)),
            ("distances", Slot::Distances(distances)),
        ],
        EditKind::SimpleLineSubdivision { line, distance, from_end } => vec![
            ("line", Slot::Feature(line)),
            ("distance", Slot::Distance(distance)),
            ("from_end", Slot::Flag(from_end)),
        ],
        EditKind::LineExtension { line, from_end, length, add_line } => vec![
            ("line", Slot::Feature(line)),
            ("from_end", Slot::Flag(from_end)),
            ("length", Slot::Distance(length)),
            ("add_line", Slot::Flag(add_line)),
        ],
        EditKind::AttachPoint { line, ratio } => {
            vec![("line", Slot::Feature(line)), ("ratio", Slot::Ratio(ratio))]
        }
        EditKind::ConnectionPath { from, to, legs } => vec![
            ("from", Slot::Feature(from)),
            ("to", Slot::Feature(to)),
            ("legs", Slot::Legs(legs)),
        ],
        EditKind::Deletion { .. } | EditKind::SetTopology { .. } | EditKind::Update { .. } => Vec::new(),
    }
}

impl From<UpdateItemCollection> for Vec<UpdateItem> {
    fn from(c: UpdateItemCollection) -> Self {
        c.items
    }
}

impl FromIterator<UpdateItem> for UpdateItemCollection {
    fn from_iter<I: IntoIterator<Item = UpdateItem>>(iter: I) -> Self {
        Self { items: iter.into_iter().collect() }
    }
}
