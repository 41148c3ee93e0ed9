//! Error type for editing operations

use thiserror::Error;

use cogo::AdjustmentError;

use crate::operation::EditId;

/// Everything that can go wrong while executing, correcting, undoing or
/// replaying edits. None of these are retried; they go back to the caller.
#[derive(Debug, Error)]
pub enum EditError {
    /// Missing, inactive, mistyped or self-referential inputs. Raised before
    /// any state changes.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The calculation has no solution (no intersection, degenerate radius).
    #[error("no solution: {0}")]
    GeometricInfeasibility(String),

    /// An edit downstream of a correction could not be recomputed. Edits
    /// recomputed before it keep their new geometry.
    #[error("edit {edit} could not be recomputed: {cause}")]
    Rollforward { edit: EditId, cause: String },

    /// Something still depends on what the caller wants to remove.
    #[error("{subject} is still required by edits {dependents:?}")]
    DependencyViolation { subject: String, dependents: Vec<EditId> },

    #[error("adjustment failed: {0}")]
    Adjustment(#[from] AdjustmentError),

    #[error("not supported: {0}")]
    Unsupported(&'static str),

    /// A stream or graph that cannot be trusted. Loading stops.
    #[error("corrupt edit history: {0}")]
    CorruptHistory(String),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EditError>;

pub(crate) fn infeasible(msg: impl Into<String>) -> EditError {
    EditError::GeometricInfeasibility(msg.into())
}

pub(crate) fn invalid(msg: impl Into<String>) -> EditError {
    EditError::InvalidInput(msg.into())
}
