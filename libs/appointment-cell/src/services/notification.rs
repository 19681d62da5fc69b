// libs/appointment-cell/src/services/notification.rs
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot, TimeRange};
use crate::services::events::{EventSink, SchedulingEvent};
use crate::store::NotificationStore;

/// Persists notifications and fans them out to both participants.
pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    events: Arc<dyn EventSink>,
}

impl NotificationService {
    pub fn new(store: Arc<dyn NotificationStore>, events: Arc<dyn EventSink>) -> Self {
        Self { store, events }
    }

    pub async fn notify(
        &self,
        appointment: &Appointment,
        message: String,
    ) -> Result<Notification, SchedulingError> {
        let notification = self
            .store
            .insert(Notification::new(appointment.id, message))
            .await?;

        info!("Notification {} created for appointment {}", notification.id, appointment.id);

        for user_id in [appointment.doctor_id, appointment.patient_id] {
            self.events
                .push_to_user(user_id, SchedulingEvent::NotificationReceived(notification.clone()))
                .await;
        }

        Ok(notification)
    }

    pub async fn for_appointment(&self, appointment_id: Uuid) -> Result<Vec<Notification>, SchedulingError> {
        self.store.get_by_appointment(appointment_id).await
    }
}

pub fn status_changed_message(slot: &Slot, status: AppointmentStatus) -> String {
    format!(
        "Your appointment on {} at {} was {}.",
        slot.date.format("%d/%m/%Y"),
        slot.start_time.format("%H:%M"),
        status
    )
}

pub fn rescheduled_message(previous: &TimeRange, current: &TimeRange) -> String {
    format!(
        "Your appointment on {} at {} was rescheduled to {} at {}.",
        previous.date.format("%d/%m/%Y"),
        previous.start_time.format("%H:%M"),
        current.date.format("%d/%m/%Y"),
        current.start_time.format("%H:%M")
    )
}
