// libs/appointment-cell/src/error.rs
use thiserror::Error;

use booking_queue_cell::BookingQueueError;
use shared_models::error::AppError;

use crate::models::AppointmentStatus;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchedulingError {
    #[error("Invalid time range: end time must be after start time")]
    InvalidRange,

    #[error("Slot overlaps another slot of this doctor")]
    SlotOverlap,

    #[error("Slot collides with an appointment already scheduled for this doctor; no slot created")]
    SlotBlocked,

    #[error("Patient already has an appointment at this time")]
    PatientConflict,

    #[error("Slot is already taken")]
    SlotUnavailable,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Slot belongs to another doctor")]
    NotOwner,

    #[error("Caller does not take part in this appointment")]
    Unauthorized,

    #[error("Only scheduled appointments may change status ({from} -> {to})")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Queue error: {0}")]
    Queue(String),
}

impl SchedulingError {
    pub fn slot_not_found() -> Self {
        SchedulingError::NotFound("Slot".to_string())
    }

    pub fn appointment_not_found() -> Self {
        SchedulingError::NotFound("Appointment".to_string())
    }

    /// Conflict-type rejections, as opposed to lookup or infrastructure failures.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            SchedulingError::SlotOverlap
                | SchedulingError::SlotBlocked
                | SchedulingError::PatientConflict
                | SchedulingError::SlotUnavailable
        )
    }
}

impl From<anyhow::Error> for SchedulingError {
    fn from(e: anyhow::Error) -> Self {
        SchedulingError::Store(e.to_string())
    }
}

impl From<BookingQueueError> for SchedulingError {
    fn from(e: BookingQueueError) -> Self {
        SchedulingError::Queue(e.to_string())
    }
}

impl From<SchedulingError> for AppError {
    fn from(e: SchedulingError) -> Self {
        let message = e.to_string();
        match e {
            SchedulingError::InvalidRange => AppError::ValidationError(message),
            SchedulingError::InvalidTransition { .. } => AppError::BadRequest(message),
            SchedulingError::SlotOverlap
            | SchedulingError::SlotBlocked
            | SchedulingError::PatientConflict
            | SchedulingError::SlotUnavailable => AppError::Conflict(message),
            SchedulingError::NotFound(_) => AppError::NotFound(message),
            SchedulingError::NotOwner | SchedulingError::Unauthorized => AppError::Forbidden(message),
            SchedulingError::Unauthenticated(_) => AppError::Auth(message),
            SchedulingError::Store(_) => AppError::Database(message),
            SchedulingError::Queue(_) => AppError::Internal(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_error_kinds_map_to_distinct_statuses() {
        let cases = [
            (SchedulingError::InvalidRange, StatusCode::BAD_REQUEST),
            (SchedulingError::SlotOverlap, StatusCode::CONFLICT),
            (SchedulingError::PatientConflict, StatusCode::CONFLICT),
            (SchedulingError::slot_not_found(), StatusCode::NOT_FOUND),
            (SchedulingError::NotOwner, StatusCode::FORBIDDEN),
            (SchedulingError::Unauthorized, StatusCode::FORBIDDEN),
            (SchedulingError::Unauthenticated("no patient".into()), StatusCode::UNAUTHORIZED),
            (SchedulingError::Store("timeout".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                SchedulingError::InvalidTransition {
                    from: AppointmentStatus::Cancelled,
                    to: AppointmentStatus::Completed,
                },
                StatusCode::BAD_REQUEST,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(AppError::from(error).status_code(), expected);
        }
    }

    #[test]
    fn test_queue_errors_become_queue_failures() {
        let error: SchedulingError = BookingQueueError::QueueClosed.into();
        assert!(matches!(error, SchedulingError::Queue(_)));
    }
}
