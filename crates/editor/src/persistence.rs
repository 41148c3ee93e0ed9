//! Edit streams: saving the history and rebuilding a model from it.
//!
//! A stream holds every active edit in sequence order. Features are named
//! by [`FeatureRef`]: the position of the creating edit in the stream and
//! the feature's place in that edit's outputs. Replay executes the records
//! again (corrections through `correct`) and rejects the whole stream on
//! the first record that does not reproduce. A correction whose cascade
//! stops on a rollforward failure reproduces too: the edits it could not
//! recompute are left changed, as they were when the stream was saved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kurbo::{Point, Vec2};
use shared::{
    DirectionKindRecord, DirectionRecord, DistanceRecord, EditRecord, EditStream, FeatureRef, FieldRecord,
    LegRecord, LengthRecord, OffsetRecord, Position, StreamEntry, UpdateItemRecord, STREAM_VERSION,
};

use crate::error::{EditError, Result};
use crate::feature::FeatureId;
use crate::model::MapModel;
use crate::observation::{Direction, DirectionKind, Distance, Leg, Length, Offset};
use crate::operation::{EditId, EditKind};
use crate::services::Services;
use crate::update::{field_name, FieldValue, UpdateItemCollection};

fn corrupt(msg: impl Into<String>) -> EditError {
    EditError::CorruptHistory(msg.into())
}

fn no_data_dir() -> EditError {
    EditError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no data directory for cedit"))
}

fn position(p: Point) -> Position {
    Position::new(p.x, p.y)
}

fn point(p: Position) -> Point {
    Point::new(p.x, p.y)
}

fn distance_record(d: &Distance) -> DistanceRecord {
    DistanceRecord { value: d.value, unit: d.unit, fixed: d.fixed }
}

fn distance(r: &DistanceRecord) -> Distance {
    Distance { value: r.value, unit: r.unit, fixed: r.fixed }
}

// ── Writing ───────────────────────────────────────────────────

/// Maps live features to stream references.
struct Writer<'a> {
    model: &'a MapModel,
    renumber: BTreeMap<EditId, u32>,
}

impl Writer<'_> {
    fn feature(&self, f: FeatureId) -> Result<FeatureRef> {
        let feature = self.model.feature(f).ok_or_else(|| corrupt(format!("{} does not exist", f)))?;
        let edit = *self
            .renumber
            .get(&feature.creator)
            .ok_or_else(|| corrupt(format!("{} was created by edit {}, which is not saved", f, feature.creator)))?;
        let item = self
            .model
            .edit(feature.creator)
            .and_then(|e| e.outputs().iter().position(|o| *o == f))
            .ok_or_else(|| corrupt(format!("{} is missing from its creator's outputs", f)))?;
        Ok(FeatureRef::new(edit, item as u32))
    }

    fn length(&self, l: &Length) -> Result<LengthRecord> {
        Ok(match l {
            Length::Distance(d) => LengthRecord::Distance { distance: distance_record(d) },
            Length::OffsetPoint(p) => LengthRecord::OffsetPoint { point: self.feature(*p)? },
        })
    }

    fn offset(&self, o: &Offset) -> Result<OffsetRecord> {
        Ok(match o {
            Offset::Distance { distance, side } => {
                OffsetRecord::Distance { distance: distance_record(distance), side: *side }
            }
            Offset::Point(p) => OffsetRecord::Point { point: self.feature(*p)? },
        })
    }

    fn direction(&self, d: &Direction) -> Result<DirectionRecord> {
        let kind = match d.kind {
            DirectionKind::Bearing(bearing) => DirectionKindRecord::Bearing { bearing },
            DirectionKind::Angle { backsight, angle } => {
                DirectionKindRecord::Angle { backsight: self.feature(backsight)?, angle }
            }
            DirectionKind::Deflection { backsight, angle } => {
                DirectionKindRecord::Deflection { backsight: self.feature(backsight)?, angle }
            }
            DirectionKind::Parallel { start, end } => {
                DirectionKindRecord::Parallel { start: self.feature(start)?, end: self.feature(end)? }
            }
        };
        Ok(DirectionRecord {
            from: self.feature(d.from)?,
            kind,
            offset: d.offset.as_ref().map(|o| self.offset(o)).transpose()?,
        })
    }

    fn field(&self, v: &FieldValue) -> Result<FieldRecord> {
        Ok(match v {
            FieldValue::Feature(f) => FieldRecord::Feature(self.feature(*f)?),
            FieldValue::MaybeFeature(f) => FieldRecord::MaybeFeature(f.map(|f| self.feature(f)).transpose()?),
            FieldValue::Position(p) => FieldRecord::Position(position(*p)),
            FieldValue::Vector(v) => FieldRecord::Vector(Position::new(v.x, v.y)),
            FieldValue::Text(t) => FieldRecord::Text(t.clone()),
            FieldValue::Flag(b) => FieldRecord::Flag(*b),
            FieldValue::Length(l) => FieldRecord::Length(self.length(l)?),
            FieldValue::Direction(d) => FieldRecord::Direction(self.direction(d)?),
            FieldValue::Offset(o) => FieldRecord::Offset(self.offset(o)?),
            FieldValue::Distance(d) => FieldRecord::Distance(distance_record(d)),
            FieldValue::Distances(d) => FieldRecord::Distances(d.iter().map(distance_record).collect()),
            FieldValue::Legs(l) => FieldRecord::Legs(l.iter().map(leg_record).collect()),
            FieldValue::Ratio(r) => FieldRecord::Ratio(*r),
        })
    }

    fn edit(&self, kind: &EditKind) -> Result<EditRecord> {
        Ok(match kind {
            EditKind::NewPoint { position: p } => EditRecord::NewPoint { position: position(*p) },
            EditKind::NewLine { start, end } => {
                EditRecord::NewLine { start: self.feature(*start)?, end: self.feature(*end)? }
            }
            EditKind::NewArc { centre, start, end, clockwise } => EditRecord::NewArc {
                centre: self.feature(*centre)?,
                start: self.feature(*start)?,
                end: self.feature(*end)?,
                clockwise: *clockwise,
            },
            EditKind::NewText { anchor, offset, text } => EditRecord::NewText {
                anchor: self.feature(*anchor)?,
                offset: Position::new(offset.x, offset.y),
                text: text.clone(),
            },
            EditKind::IntersectDirectionDistance {
                direction,
                from,
                distance,
                default,
                add_direction_line,
                add_distance_line,
            } => EditRecord::IntersectDirectionDistance {
                direction: self.direction(direction)?,
                from: self.feature(*from)?,
                distance: self.length(distance)?,
                default: *default,
                add_direction_line: *add_direction_line,
                add_distance_line: *add_distance_line,
            },
            EditKind::IntersectTwoDistances { from1, distance1, from2, distance2, default, add_line1, add_line2 } => {
                EditRecord::IntersectTwoDistances {
                    from1: self.feature(*from1)?,
                    distance1: self.length(distance1)?,
                    from2: self.feature(*from2)?,
                    distance2: self.length(distance2)?,
                    default: *default,
                    add_line1: *add_line1,
                    add_line2: *add_line2,
                }
            }
            EditKind::IntersectTwoDirections { direction1, direction2, add_line1, add_line2 } => {
                EditRecord::IntersectTwoDirections {
                    direction1: self.direction(direction1)?,
                    direction2: self.direction(direction2)?,
                    add_line1: *add_line1,
                    add_line2: *add_line2,
                }
            }
            EditKind::IntersectDirectionLine { direction, line, close_to, split, add_direction_line } => {
                EditRecord::IntersectDirectionLine {
                    direction: self.direction(direction)?,
                    line: self.feature(*line)?,
                    close_to: position(*close_to),
                    split: *split,
                    add_direction_line: *add_direction_line,
                }
            }
            EditKind::IntersectTwoLines { line1, line2, close_to, split1, split2 } => EditRecord::IntersectTwoLines {
                line1: self.feature(*line1)?,
                line2: self.feature(*line2)?,
                close_to: position(*close_to),
                split1: *split1,
                split2: *split2,
            },
            EditKind::Parallel { reference, offset, terminal1, terminal2 } => EditRecord::Parallel {
                reference: self.feature(*reference)?,
                offset: self.offset(offset)?,
                terminal1: terminal1.map(|t| self.feature(t)).transpose()?,
                terminal2: terminal2.map(|t| self.feature(t)).transpose()?,
            },
            EditKind::Radial { direction, length, add_line } => EditRecord::Radial {
                direction: self.direction(direction)?,
                length: self.length(length)?,
                add_line: *add_line,
            },
            EditKind::LineSubdivision { line, distances } => EditRecord::LineSubdivision {
                line: self.feature(*line)?,
                distances: distances.iter().map(distance_record).collect(),
            },
            EditKind::SimpleLineSubdivision { line, distance, from_end } => EditRecord::SimpleLineSubdivision {
                line: self.feature(*line)?,
                distance: distance_record(distance),
                from_end: *from_end,
            },
            EditKind::LineExtension { line, from_end, length, add_line } => EditRecord::LineExtension {
                line: self.feature(*line)?,
                from_end: *from_end,
                length: distance_record(length),
                add_line: *add_line,
            },
            EditKind::AttachPoint { line, ratio } => {
                EditRecord::AttachPoint { line: self.feature(*line)?, ratio: *ratio }
            }
            EditKind::ConnectionPath { from, to, legs } => EditRecord::ConnectionPath {
                from: self.feature(*from)?,
                to: self.feature(*to)?,
                legs: legs.iter().map(leg_record).collect(),
            },
            EditKind::Deletion { features } => EditRecord::Deletion {
                features: features.iter().map(|f| self.feature(*f)).collect::<Result<_>>()?,
            },
            EditKind::SetTopology { line, topological } => {
                EditRecord::SetTopology { line: self.feature(*line)?, topological: *topological }
            }
            EditKind::Update { revised, changes } => EditRecord::Update {
                revised: *self
                    .renumber
                    .get(revised)
                    .ok_or_else(|| corrupt(format!("update revises unsaved edit {}", revised)))?,
                changes: changes
                    .items()
                    .iter()
                    .map(|i| -> Result<UpdateItemRecord> {
                        Ok(UpdateItemRecord { field: i.field.to_string(), value: self.field(&i.value)? })
                    })
                    .collect::<Result<_>>()?,
            },
        })
    }
}

fn leg_record(l: &Leg) -> LegRecord {
    match l {
        Leg::Straight { start_angle, distances } => LegRecord::Straight {
            start_angle: *start_angle,
            distances: distances.iter().map(distance_record).collect(),
        },
        Leg::Circular { radius, clockwise, entry_angle, exit_angle, length } => LegRecord::Circular {
            radius: distance_record(radius),
            clockwise: *clockwise,
            entry_angle: *entry_angle,
            exit_angle: *exit_angle,
            length: distance_record(length),
        },
    }
}

fn leg(r: &LegRecord) -> Leg {
    match r {
        LegRecord::Straight { start_angle, distances } => Leg::Straight {
            start_angle: *start_angle,
            distances: distances.iter().map(distance).collect(),
        },
        LegRecord::Circular { radius, clockwise, entry_angle, exit_angle, length } => Leg::Circular {
            radius: distance(radius),
            clockwise: *clockwise,
            entry_angle: *entry_angle,
            exit_angle: *exit_angle,
            length: distance(length),
        },
    }
}

// ── Reading ───────────────────────────────────────────────────

/// Resolves stream references against a model being rebuilt. `index` is
/// the record being read; references may only point before it.
struct Reader<'a> {
    model: &'a MapModel,
    index: u32,
}

impl Reader<'_> {
    fn edit(&self, r: u32) -> Result<EditId> {
        if r >= self.index {
            return Err(corrupt(format!("record {} refers forward to record {}", self.index, r)));
        }
        Ok(EditId(r))
    }

    fn feature(&self, r: &FeatureRef) -> Result<FeatureId> {
        let creator = self.edit(r.edit)?;
        let edit = self
            .model
            .edit(creator)
            .ok_or_else(|| corrupt(format!("record {} refers to missing edit {}", self.index, r.edit)))?;
        let f = *edit
            .outputs()
            .get(r.item as usize)
            .ok_or_else(|| corrupt(format!("edit {} has no output {}", r.edit, r.item)))?;
        match self.model.feature(f) {
            Some(feature) if feature.creator == creator => Ok(f),
            _ => Err(corrupt(format!("output {} of edit {} was not created by it", r.item, r.edit))),
        }
    }

    fn length(&self, r: &LengthRecord) -> Result<Length> {
        Ok(match r {
            LengthRecord::Distance { distance: d } => Length::Distance(distance(d)),
            LengthRecord::OffsetPoint { point } => Length::OffsetPoint(self.feature(point)?),
        })
    }

    fn offset(&self, r: &OffsetRecord) -> Result<Offset> {
        Ok(match r {
            OffsetRecord::Distance { distance: d, side } => Offset::Distance { distance: distance(d), side: *side },
            OffsetRecord::Point { point } => Offset::Point(self.feature(point)?),
        })
    }

    fn direction(&self, r: &DirectionRecord) -> Result<Direction> {
        let kind = match &r.kind {
            DirectionKindRecord::Bearing { bearing } => DirectionKind::Bearing(*bearing),
            DirectionKindRecord::Angle { backsight, angle } => {
                DirectionKind::Angle { backsight: self.feature(backsight)?, angle: *angle }
            }
            DirectionKindRecord::Deflection { backsight, angle } => {
                DirectionKind::Deflection { backsight: self.feature(backsight)?, angle: *angle }
            }
            DirectionKindRecord::Parallel { start, end } => {
                DirectionKind::Parallel { start: self.feature(start)?, end: self.feature(end)? }
            }
        };
        Ok(Direction {
            from: self.feature(&r.from)?,
            kind,
            offset: r.offset.as_ref().map(|o| self.offset(o)).transpose()?,
        })
    }

    fn field(&self, r: &FieldRecord) -> Result<FieldValue> {
        Ok(match r {
            FieldRecord::Feature(f) => FieldValue::Feature(self.feature(f)?),
            FieldRecord::MaybeFeature(f) => FieldValue::MaybeFeature(f.as_ref().map(|f| self.feature(f)).transpose()?),
            FieldRecord::Position(p) => FieldValue::Position(point(*p)),
            FieldRecord::Vector(v) => FieldValue::Vector(Vec2::new(v.x, v.y)),
            FieldRecord::Text(t) => FieldValue::Text(t.clone()),
            FieldRecord::Flag(b) => FieldValue::Flag(*b),
            FieldRecord::Length(l) => FieldValue::Length(self.length(l)?),
            FieldRecord::Direction(d) => FieldValue::Direction(self.direction(d)?),
            FieldRecord::Offset(o) => FieldValue::Offset(self.offset(o)?),
            FieldRecord::Distance(d) => FieldValue::Distance(distance(d)),
            FieldRecord::Distances(d) => FieldValue::Distances(d.iter().map(distance).collect()),
            FieldRecord::Legs(l) => FieldValue::Legs(l.iter().map(leg).collect()),
            FieldRecord::Ratio(r) => FieldValue::Ratio(*r),
        })
    }

    /// Changes of an update record, with field names checked against the
    /// kind they apply to.
    fn changes(&self, kind: &EditKind, items: &[UpdateItemRecord]) -> Result<UpdateItemCollection> {
        let mut out = UpdateItemCollection::new();
        for item in items {
            let field = field_name(kind, &item.field)
                .ok_or_else(|| corrupt(format!("a {} has no field '{}'", kind.name(), item.field)))?;
            out.push(field, self.field(&item.value)?);
        }
        Ok(out)
    }

    fn edit_kind(&self, r: &EditRecord) -> Result<EditKind> {
        Ok(match r {
            EditRecord::NewPoint { position: p } => EditKind::NewPoint { position: point(*p) },
            EditRecord::NewLine { start, end } => {
                EditKind::NewLine { start: self.feature(start)?, end: self.feature(end)? }
            }
            EditRecord::NewArc { centre, start, end, clockwise } => EditKind::NewArc {
                centre: self.feature(centre)?,
                start: self.feature(start)?,
                end: self.feature(end)?,
                clockwise: *clockwise,
            },
            EditRecord::NewText { anchor, offset, text } => EditKind::NewText {
                anchor: self.feature(anchor)?,
                offset: Vec2::new(offset.x, offset.y),
                text: text.clone(),
            },
            EditRecord::IntersectDirectionDistance {
                direction,
                from,
                distance,
                default,
                add_direction_line,
                add_distance_line,
            } => EditKind::IntersectDirectionDistance {
                direction: self.direction(direction)?,
                from: self.feature(from)?,
                distance: self.length(distance)?,
                default: *default,
                add_direction_line: *add_direction_line,
                add_distance_line: *add_distance_line,
            },
            EditRecord::IntersectTwoDistances { from1, distance1, from2, distance2, default, add_line1, add_line2 } => {
                EditKind::IntersectTwoDistances {
                    from1: self.feature(from1)?,
                    distance1: self.length(distance1)?,
                    from2: self.feature(from2)?,
                    distance2: self.length(distance2)?,
                    default: *default,
                    add_line1: *add_line1,
                    add_line2: *add_line2,
                }
            }
            EditRecord::IntersectTwoDirections { direction1, direction2, add_line1, add_line2 } => {
                EditKind::IntersectTwoDirections {
                    direction1: self.direction(direction1)?,
                    direction2: self.direction(direction2)?,
                    add_line1: *add_line1,
                    add_line2: *add_line2,
                }
            }
            EditRecord::IntersectDirectionLine { direction, line, close_to, split, add_direction_line } => {
                EditKind::IntersectDirectionLine {
                    direction: self.direction(direction)?,
                    line: self.feature(line)?,
                    close_to: point(*close_to),
                    split: *split,
                    add_direction_line: *add_direction_line,
                }
            }
            EditRecord::IntersectTwoLines { line1, line2, close_to, split1, split2 } => EditKind::IntersectTwoLines {
                line1: self.feature(line1)?,
                line2: self.feature(line2)?,
                close_to: point(*close_to),
                split1: *split1,
                split2: *split2,
            },
            EditRecord::Parallel { reference, offset, terminal1, terminal2 } => EditKind::Parallel {
                reference: self.feature(reference)?,
                offset: self.offset(offset)?,
                terminal1: terminal1.as_ref().map(|t| self.feature(t)).transpose()?,
                terminal2: terminal2.as_ref().map(|t| self.feature(t)).transpose()?,
            },
            EditRecord::Radial { direction, length, add_line } => EditKind::Radial {
                direction: self.direction(direction)?,
                length: self.length(length)?,
                add_line: *add_line,
            },
            EditRecord::LineSubdivision { line, distances } => EditKind::LineSubdivision {
                line: self.feature(line)?,
                distances: distances.iter().map(distance).collect(),
            },
            EditRecord::SimpleLineSubdivision { line, distance: d, from_end } => EditKind::SimpleLineSubdivision {
                line: self.feature(line)?,
                distance: distance(d),
                from_end: *from_end,
            },
            EditRecord::LineExtension { line, from_end, length, add_line } => EditKind::LineExtension {
                line: self.feature(line)?,
                from_end: *from_end,
                length: distance(length),
                add_line: *add_line,
            },
            EditRecord::AttachPoint { line, ratio } => {
                EditKind::AttachPoint { line: self.feature(line)?, ratio: *ratio }
            }
            EditRecord::ConnectionPath { from, to, legs } => EditKind::ConnectionPath {
                from: self.feature(from)?,
                to: self.feature(to)?,
                legs: legs.iter().map(leg).collect(),
            },
            EditRecord::Deletion { features } => EditKind::Deletion {
                features: features.iter().map(|f| self.feature(f)).collect::<Result<_>>()?,
            },
            EditRecord::SetTopology { line, topological } => {
                EditKind::SetTopology { line: self.feature(line)?, topological: *topological }
            }
            EditRecord::Update { .. } => return Err(corrupt("an update has no edit kind of its own")),
        })
    }
}

// ── Model entry points ────────────────────────────────────────

impl MapModel {
    /// Every active edit, with corrections recorded as update records after
    /// the edits they revise.
    pub fn to_stream(&self) -> Result<EditStream> {
        let mut writer = Writer { model: self, renumber: BTreeMap::new() };
        let mut stream = EditStream::new(self.session());

        for edit in self.edits().iter().filter(|e| e.is_active()) {
            writer.renumber.insert(edit.id, stream.edits.len() as u32);

            // An edit is saved as it was first executed; its updates follow.
            let mut kind = edit.kind.clone();
            let mut updates = self.active_updates_of(edit.id);
            updates.sort_unstable_by(|a, b| b.cmp(a));
            for u in updates {
                if let Some(mut previous) = self.edit(u).and_then(|e| e.previous.clone()) {
                    previous.exchange(&mut kind)?;
                }
            }

            stream.edits.push(StreamEntry { created: edit.created().len() as u32, edit: writer.edit(&kind)? });
        }
        Ok(stream)
    }

    /// Rebuild a model by executing every record of a stream in order.
    pub fn replay(stream: &EditStream, services: Services) -> Result<MapModel> {
        if stream.version != STREAM_VERSION {
            return Err(corrupt(format!(
                "stream version {} is not supported (expected {})",
                stream.version, STREAM_VERSION
            )));
        }

        let mut model = MapModel::with_session(stream.session_id.clone(), services);
        for (i, entry) in stream.edits.iter().enumerate() {
            let at = |e: EditError| corrupt(format!("record {} ({}): {}", i, entry.edit.kind_name(), e));
            match &entry.edit {
                EditRecord::Update { revised, changes } => {
                    let (target, kind) = {
                        let reader = Reader { model: &model, index: i as u32 };
                        let target = reader.edit(*revised)?;
                        let mut kind = model.require_edit(target)?.kind.clone();
                        let mut changes = reader.changes(&kind, changes)?;
                        changes.exchange(&mut kind)?;
                        (target, kind)
                    };
                    match model.correct(target, kind) {
                        Ok(_) => {}
                        // Saved while a cascade was stuck: the update is in place
                        // and the same edits stay changed.
                        Err(EditError::Rollforward { edit, cause }) if model.edits().len() == i + 1 => {
                            tracing::warn!(record = i, edit = %edit, %cause, "replayed correction left edits changed");
                        }
                        Err(e) => return Err(at(e)),
                    }
                }
                record => {
                    let kind = Reader { model: &model, index: i as u32 }.edit_kind(record)?;
                    let executed = model.execute(kind).map_err(at)?;
                    if executed.created.len() != entry.created as usize {
                        return Err(corrupt(format!(
                            "record {} created {} features, the stream says {}",
                            i,
                            executed.created.len(),
                            entry.created
                        )));
                    }
                }
            }
            if model.edits().len() != i + 1 {
                return Err(corrupt(format!("record {} did not produce an edit", i)));
            }
        }

        model.check_integrity()?;
        tracing::info!(
            session = %model.session(),
            edits = model.edits().len(),
            features = model.features().len(),
            "replayed edit stream"
        );
        Ok(model)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let json = self.to_stream()?.to_json()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn load_from(path: &Path, services: Services) -> Result<MapModel> {
        let json = std::fs::read_to_string(path)?;
        let stream = EditStream::from_json(&json)?;
        Self::replay(&stream, services)
    }

    /// Where the working session is kept between `cedit` runs.
    pub fn autosave_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "cadastral", "cedit")
            .map(|dirs| dirs.data_dir().join("autosave.json"))
    }

    /// Save the history to the autosave file and return its path.
    pub fn autosave(&self) -> Result<PathBuf> {
        let path = Self::autosave_path().ok_or_else(no_data_dir)?;
        self.save_to(&path)?;
        tracing::debug!(path = %path.display(), edits = self.edits().len(), "autosaved");
        Ok(path)
    }

    /// Rebuild the autosaved session.
    pub fn load_autosave(services: Services) -> Result<MapModel> {
        let path = Self::autosave_path().ok_or_else(no_data_dir)?;
        Self::load_from(&path, services)
    }
}
