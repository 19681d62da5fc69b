// libs/appointment-cell/src/store/mod.rs
//
// Persistence boundary of the scheduling engine. Entities refer to each other
// by id only; relations are resolved through these lookups.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot};

pub mod memory;
pub mod postgrest;

pub use memory::InMemoryStore;
pub use postgrest::PostgrestStore;

#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SchedulingError>;
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Slot>, SchedulingError>;
    async fn insert(&self, slot: Slot) -> Result<Slot, SchedulingError>;
    async fn update(&self, slot: &Slot) -> Result<(), SchedulingError>;
    async fn delete(&self, id: Uuid) -> Result<(), SchedulingError>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError>;
    async fn get_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError>;
    async fn get_by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError>;
    async fn get_by_slot(
        &self,
        slot_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError>;
    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError>;
    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<(), SchedulingError>;
}

#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<Notification, SchedulingError>;
    async fn get_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<Notification>, SchedulingError>;
}
