//! Proportional distribution of a misclosure over observed lengths.

use thiserror::Error;

use crate::geom::TINY;

/// Errors from subdivision and traverse adjustment
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AdjustmentError {
    #[error("no distances to adjust")]
    Empty,
    #[error("distance {index} is not positive")]
    NonPositive { index: usize },
    #[error("every distance is fixed, nothing can absorb a misclosure of {diff:.4}")]
    AllFixed { diff: f64 },
    #[error("floating distances leave no play to absorb a misclosure of {diff:.4}")]
    NoPlay { diff: f64 },
    #[error("path closes on its own start")]
    DegeneratePath,
}

/// One observed length.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Leg {
    pub length: f64,
    /// Fixed lengths pass through unchanged.
    pub fixed: bool,
}

impl Leg {
    pub fn floating(length: f64) -> Self {
        Self { length, fixed: false }
    }

    pub fn fixed(length: f64) -> Self {
        Self { length, fixed: true }
    }
}

/// Scale the floating lengths so that the total matches `target`.
///
/// `totobs` is the sum of every length and `totfix` the sum of the fixed
/// ones. The play `totobs - totfix` absorbs `target - totobs`.
pub fn proportion(legs: &[Leg], target: f64) -> Result<Vec<f64>, AdjustmentError> {
    if legs.is_empty() {
        return Err(AdjustmentError::Empty);
    }
    if let Some(index) = legs.iter().position(|l| l.length <= 0.0) {
        return Err(AdjustmentError::NonPositive { index });
    }

    let totobs: f64 = legs.iter().map(|l| l.length).sum();
    let totfix: f64 = legs.iter().filter(|l| l.fixed).map(|l| l.length).sum();
    let diff = target - totobs;

    if legs.iter().all(|l| l.fixed) {
        if diff.abs() <= TINY {
            return Ok(legs.iter().map(|l| l.length).collect());
        }
        return Err(AdjustmentError::AllFixed { diff });
    }

    let play = totobs - totfix;
    if play.abs() < TINY {
        return Err(AdjustmentError::NoPlay { diff });
    }
    let factor = (play + diff) / play;
    if factor <= 0.0 {
        return Err(AdjustmentError::NoPlay { diff });
    }

    tracing::debug!(totobs, totfix, diff, factor, "proportional adjustment");

    Ok(legs
        .iter()
        .map(|l| if l.fixed { l.length } else { l.length * factor })
        .collect())
}
