// libs/appointment-cell/src/services/events.rs
use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::models::{Appointment, Notification, Slot};

/// Domain events the engine emits toward participants' live connections.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchedulingEvent {
    AppointmentCreated(Appointment),
    AppointmentCancelled(Appointment),
    SlotUpdated(Slot),
    NotificationReceived(Notification),
}

impl SchedulingEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingEvent::AppointmentCreated(_) => "AppointmentCreated",
            SchedulingEvent::AppointmentCancelled(_) => "AppointmentCancelled",
            SchedulingEvent::SlotUpdated(_) => "SlotUpdated",
            SchedulingEvent::NotificationReceived(_) => "NotificationReceived",
        }
    }
}

/// Push transport. Delivery is best-effort: implementations must not fail the
/// calling operation and must not block it on a slow recipient.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn push_to_user(&self, user_id: Uuid, event: SchedulingEvent);
}
