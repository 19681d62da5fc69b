// libs/appointment-cell/src/services/lifecycle.rs
use tracing::{debug, warn};

use crate::error::SchedulingError;
use crate::models::AppointmentStatus;

/// Statuses reachable from `current`. Only `Scheduled` may move, and only forward.
pub fn valid_transitions(current: AppointmentStatus) -> &'static [AppointmentStatus] {
    match current {
        AppointmentStatus::Scheduled => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_transition(current: AppointmentStatus, next: AppointmentStatus) -> Result<(), SchedulingError> {
    if !valid_transitions(current).contains(&next) {
        warn!("Invalid status transition attempted: {} -> {}", current, next);
        return Err(SchedulingError::InvalidTransition { from: current, to: next });
    }

    debug!("Status transition validated: {} -> {}", current, next);
    Ok(())
}
