// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::{AuthContext, Role};

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot};
use crate::services::conflict::conflicts;
use crate::services::events::{EventSink, SchedulingEvent};
use crate::services::lifecycle::validate_transition;
use crate::services::notification::{status_changed_message, NotificationService};
use crate::services::projections::SchedulingCache;
use crate::services::{require_doctor, require_patient, slot_ranges};
use crate::store::{AppointmentStore, SlotStore};

/// Appointment side of the scheduling engine.
///
/// Mutating methods assume they run inside a unit of the serial work queue;
/// they re-read the store on every call and take no locks of their own.
pub struct AppointmentService {
    slots: Arc<dyn SlotStore>,
    appointments: Arc<dyn AppointmentStore>,
    notifications: Arc<NotificationService>,
    cache: Arc<SchedulingCache>,
    events: Arc<dyn EventSink>,
}

impl AppointmentService {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        notifications: Arc<NotificationService>,
        cache: Arc<SchedulingCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            slots,
            appointments,
            notifications,
            cache,
            events,
        }
    }

    // ==============================================================================
    // MUTATIONS
    // ==============================================================================

    #[instrument(skip(self))]
    pub async fn book_appointment(&self, caller: &AuthContext, slot_id: Uuid) -> Result<Appointment, SchedulingError> {
        let patient_id = require_patient(caller)?;

        let slot = self
            .slots
            .get_by_id(slot_id)
            .await?
            .ok_or_else(SchedulingError::slot_not_found)?;

        // Patient side: no overlapping appointment that still holds its slot.
        let held: Vec<Appointment> = self
            .appointments
            .get_by_patient(patient_id, None)
            .await?
            .into_iter()
            .filter(|a| a.status.holds_slot())
            .collect();
        let occupied = slot_ranges(self.slots.as_ref(), &held).await?;
        if conflicts(&slot.range(), occupied)? {
            warn!("Patient {} already has an appointment overlapping slot {}", patient_id, slot.id);
            return Err(SchedulingError::PatientConflict);
        }

        // Slot side: at most one non-cancelled appointment per slot.
        let taken = self
            .appointments
            .get_by_slot(slot.id, None)
            .await?
            .iter()
            .any(|a| a.status.holds_slot());
        if taken {
            warn!("Slot {} is already taken", slot.id);
            return Err(SchedulingError::SlotUnavailable);
        }

        let appointment = self
            .appointments
            .insert(Appointment::scheduled(&slot, patient_id))
            .await?;

        self.events
            .push_to_user(slot.doctor_id, SchedulingEvent::AppointmentCreated(appointment.clone()))
            .await;

        self.cache.appointment_booked(slot.doctor_id, patient_id).await;

        info!("Appointment {} booked on slot {} for patient {}", appointment.id, slot.id, patient_id);
        Ok(appointment)
    }

    #[instrument(skip(self))]
    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        caller: &AuthContext,
    ) -> Result<Appointment, SchedulingError> {
        let appointment = self
            .appointments
            .get_by_id(appointment_id)
            .await?
            .ok_or_else(SchedulingError::appointment_not_found)?;

        ensure_participant(caller, &appointment)?;
        validate_transition(appointment.status, new_status)?;

        // A scheduled appointment's slot always exists; deletion cancels first.
        let slot = self.slot_of(&appointment).await?;
        self.notifications
            .notify(&appointment, status_changed_message(&slot, new_status))
            .await?;

        self.appointments.update_status(appointment.id, new_status).await?;
        let updated = appointment.with_status(new_status);

        self.cache
            .status_changed(&updated, appointment.status)
            .await;

        if new_status == AppointmentStatus::Cancelled {
            // The caller's role, not the caller's identity, is left out of the push.
            if caller.role != Role::Patient {
                self.events
                    .push_to_user(updated.patient_id, SchedulingEvent::AppointmentCancelled(updated.clone()))
                    .await;
            }
            if caller.role != Role::Doctor {
                self.events
                    .push_to_user(updated.doctor_id, SchedulingEvent::AppointmentCancelled(updated.clone()))
                    .await;
            }
        }

        info!(
            "Appointment {} moved from {} to {}",
            updated.id, appointment.status, updated.status
        );
        Ok(updated)
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn get_appointment(&self, appointment_id: Uuid, caller: &AuthContext) -> Result<Appointment, SchedulingError> {
        let appointment = match self.cache.appointment(appointment_id).await {
            Some(cached) => cached,
            None => {
                let appointment = self
                    .appointments
                    .get_by_id(appointment_id)
                    .await?
                    .ok_or_else(SchedulingError::appointment_not_found)?;
                self.cache.store_appointment(&appointment).await;
                appointment
            }
        };

        ensure_participant(caller, &appointment)?;
        Ok(appointment)
    }

    pub async fn list_patient_appointments(
        &self,
        caller: &AuthContext,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let patient_id = require_patient(caller)?;

        if let Some(cached) = self.cache.patient_appointments(patient_id, status).await {
            return Ok(cached);
        }

        let appointments = self.appointments.get_by_patient(patient_id, status).await?;
        self.cache
            .store_patient_appointments(patient_id, status, &appointments)
            .await;
        Ok(appointments)
    }

    pub async fn list_doctor_appointments(
        &self,
        caller: &AuthContext,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        let doctor_id = require_doctor(caller)?;

        if let Some(cached) = self.cache.doctor_appointments(doctor_id, status).await {
            return Ok(cached);
        }

        let appointments = self.appointments.get_by_doctor(doctor_id, status).await?;
        self.cache
            .store_doctor_appointments(doctor_id, status, &appointments)
            .await;
        Ok(appointments)
    }

    pub async fn list_notifications(
        &self,
        appointment_id: Uuid,
        caller: &AuthContext,
    ) -> Result<Vec<Notification>, SchedulingError> {
        let appointment = self.get_appointment(appointment_id, caller).await?;
        self.notifications.for_appointment(appointment.id).await
    }

    async fn slot_of(&self, appointment: &Appointment) -> Result<Slot, SchedulingError> {
        self.slots.get_by_id(appointment.slot_id).await?.ok_or_else(|| {
            debug!("Appointment {} references missing slot {}", appointment.id, appointment.slot_id);
            SchedulingError::slot_not_found()
        })
    }
}

fn ensure_participant(caller: &AuthContext, appointment: &Appointment) -> Result<(), SchedulingError> {
    if !appointment.involves(caller.person_id) {
        warn!("{} is not a participant of appointment {}", caller.person_id, appointment.id);
        return Err(SchedulingError::Unauthorized);
    }
    Ok(())
}
