// libs/appointment-cell/src/services/mod.rs
use uuid::Uuid;

use shared_models::auth::AuthContext;

use crate::error::SchedulingError;
use crate::models::{Appointment, TimeRange};
use crate::store::SlotStore;

pub mod booking;
pub mod conflict;
pub mod events;
pub mod lifecycle;
pub mod live;
pub mod notification;
pub mod projections;
pub mod scheduler;
pub mod slots;

pub use booking::AppointmentService;
pub use events::{EventSink, SchedulingEvent};
pub use live::{LiveEvent, LiveNotificationService};
pub use notification::NotificationService;
pub use projections::{CacheTtls, SchedulingCache};
pub use scheduler::{SchedulingComponents, SchedulingService};
pub use slots::SlotService;

pub(crate) fn require_doctor(caller: &AuthContext) -> Result<Uuid, SchedulingError> {
    if caller.is_doctor() {
        Ok(caller.person_id)
    } else {
        Err(SchedulingError::Unauthenticated("caller is not a doctor".to_string()))
    }
}

pub(crate) fn require_patient(caller: &AuthContext) -> Result<Uuid, SchedulingError> {
    if caller.is_patient() {
        Ok(caller.person_id)
    } else {
        Err(SchedulingError::Unauthenticated("caller is not a patient".to_string()))
    }
}

/// Time ranges of the slots the given appointments sit on. Appointments whose
/// slot no longer exists occupy nothing.
pub(crate) async fn slot_ranges(
    slots: &dyn SlotStore,
    appointments: &[Appointment],
) -> Result<Vec<TimeRange>, SchedulingError> {
    let mut ranges = Vec::with_capacity(appointments.len());
    for appointment in appointments {
        if let Some(slot) = slots.get_by_id(appointment.slot_id).await? {
            ranges.push(slot.range());
        }
    }
    Ok(ranges)
}
