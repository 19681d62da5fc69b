// libs/appointment-cell/src/services/projections.rs
//
// Cached read projections of the scheduling store and the invalidation each
// mutation owes them.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;
use uuid::Uuid;

use cache_cell::CacheManager;
use shared_config::AppConfig;

use crate::models::{Appointment, AppointmentStatus, Slot};

pub mod keys {
    use uuid::Uuid;

    use crate::models::AppointmentStatus;

    pub const AVAILABLE_SLOTS: &str = "AvailableSlots";
    pub const SLOT: &str = "Slot";
    pub const APPOINTMENT: &str = "Appointment";
    pub const PATIENT_APPOINTMENTS: &str = "PatientAppointments";
    pub const DOCTOR_APPOINTMENTS: &str = "DoctorAppointments";

    pub fn available_slots(doctor_id: Uuid) -> String {
        format!("{}:{}", AVAILABLE_SLOTS, doctor_id)
    }

    pub fn slot(slot_id: Uuid) -> String {
        format!("{}:{}", SLOT, slot_id)
    }

    pub fn appointment(appointment_id: Uuid) -> String {
        format!("{}:{}", APPOINTMENT, appointment_id)
    }

    pub fn patient_appointments(patient_id: Uuid, status: Option<AppointmentStatus>) -> String {
        format!("{}:{}:{}", PATIENT_APPOINTMENTS, patient_id, bucket(status))
    }

    pub fn doctor_appointments(doctor_id: Uuid, status: Option<AppointmentStatus>) -> String {
        format!("{}:{}:{}", DOCTOR_APPOINTMENTS, doctor_id, bucket(status))
    }

    fn bucket(status: Option<AppointmentStatus>) -> &'static str {
        status.map_or("all", |s| s.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub available_slots: Duration,
    pub entity: Duration,
    pub appointment_list: Duration,
}

impl CacheTtls {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            available_slots: config.available_slots_ttl(),
            entity: config.entity_ttl(),
            appointment_list: config.appointment_list_ttl(),
        }
    }
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

pub struct SchedulingCache {
    cache: Arc<CacheManager>,
    ttls: CacheTtls,
}

impl SchedulingCache {
    pub fn new(cache: Arc<CacheManager>, ttls: CacheTtls) -> Self {
        Self { cache, ttls }
    }

    // ------------------------------------------------------------------ reads

    pub async fn available_slots(&self, doctor_id: Uuid) -> Option<Vec<Slot>> {
        self.cache.get(&keys::available_slots(doctor_id)).await
    }

    pub async fn store_available_slots(&self, doctor_id: Uuid, slots: &[Slot]) {
        self.cache
            .set(&keys::available_slots(doctor_id), slots, self.ttls.available_slots)
            .await;
    }

    pub async fn slot(&self, slot_id: Uuid) -> Option<Slot> {
        self.cache.get(&keys::slot(slot_id)).await
    }

    pub async fn store_slot(&self, slot: &Slot) {
        self.cache.set(&keys::slot(slot.id), slot, self.ttls.entity).await;
    }

    pub async fn appointment(&self, appointment_id: Uuid) -> Option<Appointment> {
        self.cache.get(&keys::appointment(appointment_id)).await
    }

    pub async fn store_appointment(&self, appointment: &Appointment) {
        self.cache
            .set(&keys::appointment(appointment.id), appointment, self.ttls.entity)
            .await;
    }

    pub async fn patient_appointments(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Option<Vec<Appointment>> {
        self.cache.get(&keys::patient_appointments(patient_id, status)).await
    }

    pub async fn store_patient_appointments(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
        appointments: &[Appointment],
    ) {
        self.cache
            .set(
                &keys::patient_appointments(patient_id, status),
                appointments,
                self.ttls.appointment_list,
            )
            .await;
    }

    pub async fn doctor_appointments(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Option<Vec<Appointment>> {
        self.cache.get(&keys::doctor_appointments(doctor_id, status)).await
    }

    pub async fn store_doctor_appointments(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
        appointments: &[Appointment],
    ) {
        self.cache
            .set(
                &keys::doctor_appointments(doctor_id, status),
                appointments,
                self.ttls.appointment_list,
            )
            .await;
    }

    // ----------------------------------------------------------- invalidation

    pub async fn slot_created(&self, doctor_id: Uuid) {
        self.cache.remove(&keys::available_slots(doctor_id)).await;
    }

    pub async fn slot_edited(&self, slot: &Slot) {
        debug!("Invalidating projections of edited slot {}", slot.id);
        self.cache
            .remove_all([
                keys::slot(slot.id),
                keys::available_slots(slot.doctor_id),
                keys::doctor_appointments(slot.doctor_id, Some(AppointmentStatus::Scheduled)),
                keys::doctor_appointments(slot.doctor_id, Some(AppointmentStatus::Completed)),
            ])
            .await;
    }

    pub async fn slot_deleted(&self, slot: &Slot) {
        self.cache
            .remove_all([keys::slot(slot.id), keys::available_slots(slot.doctor_id)])
            .await;
    }

    /// A new scheduled appointment also shows up in both unfiltered lists.
    pub async fn appointment_booked(&self, doctor_id: Uuid, patient_id: Uuid) {
        self.cache
            .remove_all([
                keys::available_slots(doctor_id),
                keys::patient_appointments(patient_id, Some(AppointmentStatus::Scheduled)),
                keys::patient_appointments(patient_id, None),
                keys::doctor_appointments(doctor_id, Some(AppointmentStatus::Scheduled)),
                keys::doctor_appointments(doctor_id, None),
            ])
            .await;
    }

    pub async fn status_changed(
        &self,
        appointment: &Appointment,
        previous: AppointmentStatus,
    ) {
        debug!(
            "Invalidating projections of appointment {} ({} -> {})",
            appointment.id, previous, appointment.status
        );
        let (doctor_id, patient_id) = (appointment.doctor_id, appointment.patient_id);
        self.cache
            .remove_all([
                keys::appointment(appointment.id),
                keys::patient_appointments(patient_id, Some(previous)),
                keys::patient_appointments(patient_id, Some(appointment.status)),
                keys::patient_appointments(patient_id, None),
                keys::doctor_appointments(doctor_id, Some(previous)),
                keys::doctor_appointments(doctor_id, Some(appointment.status)),
                keys::doctor_appointments(doctor_id, None),
                keys::available_slots(doctor_id),
            ])
            .await;
    }
}
