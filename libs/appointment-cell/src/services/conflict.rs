// libs/appointment-cell/src/services/conflict.rs
use tracing::debug;

use crate::error::SchedulingError;
use crate::models::TimeRange;

/// Decides whether `candidate` overlaps any of the `occupied` ranges.
///
/// Only ranges on the candidate's calendar day are considered, and the
/// comparison is half-open: a range ending exactly when the candidate starts
/// (or starting exactly when it ends) is not a conflict.
pub fn conflicts<I>(candidate: &TimeRange, occupied: I) -> Result<bool, SchedulingError>
where
    I: IntoIterator<Item = TimeRange>,
{
    ensure_valid(candidate)?;

    let clash = occupied.into_iter().find(|range| candidate.overlaps(range));
    if let Some(range) = clash {
        debug!("Candidate {} overlaps {}", candidate, range);
        return Ok(true);
    }
    Ok(false)
}

pub fn ensure_valid(range: &TimeRange) -> Result<(), SchedulingError> {
    if range.is_valid() {
        Ok(())
    } else {
        Err(SchedulingError::InvalidRange)
    }
}
