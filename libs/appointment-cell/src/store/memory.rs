// libs/appointment-cell/src/store/memory.rs
use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot};
use crate::store::{AppointmentStore, NotificationStore, SlotStore};

#[derive(Default)]
struct StoreState {
    slots: HashMap<Uuid, Slot>,
    appointments: HashMap<Uuid, Appointment>,
    // insertion order doubles as creation order
    notifications: Vec<Notification>,
}

/// Process-local store used when no database is configured, and by tests.
#[derive(Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn status_matches(appointment: &Appointment, status: Option<AppointmentStatus>) -> bool {
    status.map_or(true, |s| appointment.status == s)
}

#[async_trait]
impl SlotStore for InMemoryStore {
    async fn get_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SchedulingError> {
        let state = self.state.read().await;
        Ok(state
            .slots
            .values()
            .filter(|slot| slot.doctor_id == doctor_id)
            .cloned()
            .collect())
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Slot>, SchedulingError> {
        Ok(self.state.read().await.slots.get(&id).cloned())
    }

    async fn insert(&self, slot: Slot) -> Result<Slot, SchedulingError> {
        self.state.write().await.slots.insert(slot.id, slot.clone());
        Ok(slot)
    }

    async fn update(&self, slot: &Slot) -> Result<(), SchedulingError> {
        let mut state = self.state.write().await;
        match state.slots.get_mut(&slot.id) {
            Some(existing) => {
                *existing = slot.clone();
                Ok(())
            }
            None => Err(SchedulingError::slot_not_found()),
        }
    }

    async fn delete(&self, id: Uuid) -> Result<(), SchedulingError> {
        self.state.write().await.slots.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        Ok(self.state.read().await.appointments.get(&id).cloned())
    }

    async fn get_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.patient_id == patient_id && status_matches(a, status))
            .cloned()
            .collect())
    }

    async fn get_by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.doctor_id == doctor_id && status_matches(a, status))
            .cloned()
            .collect())
    }

    async fn get_by_slot(
        &self,
        slot_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let state = self.state.read().await;
        Ok(state
            .appointments
            .values()
            .filter(|a| a.slot_id == slot_id && status_matches(a, status))
            .cloned()
            .collect())
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        self.state
            .write()
            .await
            .appointments
            .insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<(), SchedulingError> {
        let mut state = self.state.write().await;
        match state.appointments.get_mut(&id) {
            Some(appointment) => {
                appointment.status = status;
                Ok(())
            }
            None => Err(SchedulingError::appointment_not_found()),
        }
    }
}

#[async_trait]
impl NotificationStore for InMemoryStore {
    async fn insert(&self, notification: Notification) -> Result<Notification, SchedulingError> {
        self.state.write().await.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn get_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<Notification>, SchedulingError> {
        let state = self.state.read().await;
        Ok(state
            .notifications
            .iter()
            .filter(|n| n.appointment_id == appointment_id)
            .cloned()
            .collect())
    }
}
