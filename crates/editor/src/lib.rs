//! Cadastral map editing as a replayable history of edits.
//!
//! A [`MapModel`] holds an arena of features and the ordered list of edits
//! that created them. Edits can be executed, corrected (which recomputes
//! everything downstream in sequence order) and undone.

pub mod coordinator;
pub mod error;
pub mod feature;
pub mod fixtures;
pub mod harness;
pub mod model;
pub mod observation;
pub mod operation;
pub mod persistence;
pub mod services;
pub mod settings;
pub mod update;

mod calculate;
mod lifecycle;

pub use coordinator::RecomputeReport;
pub use error::{EditError, Result};
pub use feature::{Feature, FeatureId, FeatureKind, Geometry, LineGeometry};
pub use lifecycle::Executed;
pub use model::MapModel;
pub use observation::{Direction, DirectionKind, Distance, Leg, Length, Offset};
pub use operation::{Edit, EditId, EditKind, EditState};
pub use services::{EntityCatalogue, LinearIndex, Services, SpatialIndex};
pub use update::{FieldValue, UpdateItem, UpdateItemCollection};
