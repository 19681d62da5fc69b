// libs/appointment-cell/src/services/slots.rs
use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use shared_models::auth::AuthContext;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Slot, TimeRange};
use crate::services::booking::AppointmentService;
use crate::services::conflict::{conflicts, ensure_valid};
use crate::services::events::{EventSink, SchedulingEvent};
use crate::services::notification::{rescheduled_message, NotificationService};
use crate::services::projections::SchedulingCache;
use crate::services::{require_doctor, slot_ranges};
use crate::store::{AppointmentStore, SlotStore};

/// Doctor availability side of the scheduling engine.
pub struct SlotService {
    slots: Arc<dyn SlotStore>,
    appointments: Arc<dyn AppointmentStore>,
    booking: Arc<AppointmentService>,
    notifications: Arc<NotificationService>,
    cache: Arc<SchedulingCache>,
    events: Arc<dyn EventSink>,
}

impl SlotService {
    pub fn new(
        slots: Arc<dyn SlotStore>,
        appointments: Arc<dyn AppointmentStore>,
        booking: Arc<AppointmentService>,
        notifications: Arc<NotificationService>,
        cache: Arc<SchedulingCache>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            slots,
            appointments,
            booking,
            notifications,
            cache,
            events,
        }
    }

    /// Slots of `doctor_id` not held by any non-cancelled appointment, earliest first.
    pub async fn list_available_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SchedulingError> {
        if let Some(cached) = self.cache.available_slots(doctor_id).await {
            debug!("Serving available slots of doctor {} from cache", doctor_id);
            return Ok(cached);
        }

        let taken: HashSet<Uuid> = self
            .appointments
            .get_by_doctor(doctor_id, None)
            .await?
            .into_iter()
            .filter(|a| a.status.holds_slot())
            .map(|a| a.slot_id)
            .collect();

        let mut available: Vec<Slot> = self
            .slots
            .get_by_doctor(doctor_id)
            .await?
            .into_iter()
            .filter(|slot| !taken.contains(&slot.id))
            .collect();
        available.sort_by_key(|slot| (slot.date, slot.start_time));

        self.cache.store_available_slots(doctor_id, &available).await;
        Ok(available)
    }

    pub async fn get_slot(&self, slot_id: Uuid, caller: &AuthContext) -> Result<Slot, SchedulingError> {
        let doctor_id = require_doctor(caller)?;

        let slot = match self.cache.slot(slot_id).await {
            Some(cached) => cached,
            None => {
                let slot = self
                    .slots
                    .get_by_id(slot_id)
                    .await?
                    .ok_or_else(SchedulingError::slot_not_found)?;
                self.cache.store_slot(&slot).await;
                slot
            }
        };

        ensure_owner(&slot, doctor_id)?;
        Ok(slot)
    }

    #[instrument(skip(self))]
    pub async fn create_slot(&self, caller: &AuthContext, candidate: TimeRange) -> Result<Slot, SchedulingError> {
        let doctor_id = require_doctor(caller)?;
        ensure_valid(&candidate)?;

        let existing = self.slots.get_by_doctor(doctor_id).await?;
        if conflicts(&candidate, existing.iter().map(Slot::range))? {
            warn!("Slot {} overlaps an existing slot of doctor {}", candidate, doctor_id);
            return Err(SchedulingError::SlotOverlap);
        }

        let scheduled = self
            .appointments
            .get_by_doctor(doctor_id, Some(AppointmentStatus::Scheduled))
            .await?;
        let booked = slot_ranges(self.slots.as_ref(), &scheduled).await?;
        if conflicts(&candidate, booked)? {
            warn!("Slot {} collides with a scheduled appointment of doctor {}", candidate, doctor_id);
            return Err(SchedulingError::SlotBlocked);
        }

        let slot = self.slots.insert(Slot::new(doctor_id, candidate)).await?;
        self.cache.slot_created(doctor_id).await;

        info!("Slot {} created for doctor {} at {}", slot.id, doctor_id, candidate);
        Ok(slot)
    }

    #[instrument(skip(self))]
    pub async fn edit_slot(
        &self,
        slot_id: Uuid,
        caller: &AuthContext,
        new_range: TimeRange,
    ) -> Result<Slot, SchedulingError> {
        let doctor_id = require_doctor(caller)?;
        let mut slot = self.owned_slot(slot_id, doctor_id).await?;
        ensure_valid(&new_range)?;

        // Only booked time is checked, so a free slot may be moved onto another
        // free slot. The slot never conflicts with its own appointment.
        let others: Vec<Appointment> = self
            .appointments
            .get_by_doctor(doctor_id, Some(AppointmentStatus::Scheduled))
            .await?
            .into_iter()
            .filter(|a| a.slot_id != slot.id)
            .collect();
        let occupied = slot_ranges(self.slots.as_ref(), &others).await?;
        if conflicts(&new_range, occupied)? {
            warn!("Moving slot {} to {} overlaps another appointment", slot.id, new_range);
            return Err(SchedulingError::SlotOverlap);
        }

        let active = self
            .appointments
            .get_by_slot(slot.id, Some(AppointmentStatus::Scheduled))
            .await?
            .into_iter()
            .next();

        if let Some(appointment) = &active {
            let patient_others: Vec<Appointment> = self
                .appointments
                .get_by_patient(appointment.patient_id, None)
                .await?
                .into_iter()
                .filter(|a| a.status.holds_slot() && a.slot_id != slot.id)
                .collect();
            let occupied = slot_ranges(self.slots.as_ref(), &patient_others).await?;
            if conflicts(&new_range, occupied)? {
                warn!(
                    "Moving slot {} to {} double-books patient {}",
                    slot.id, new_range, appointment.patient_id
                );
                return Err(SchedulingError::PatientConflict);
            }
        }

        let previous = slot.range();
        slot.reschedule(new_range);

        if let Some(appointment) = &active {
            self.notifications
                .notify(appointment, rescheduled_message(&previous, &new_range))
                .await?;
            self.events
                .push_to_user(appointment.patient_id, SchedulingEvent::SlotUpdated(slot.clone()))
                .await;
        }

        self.slots.update(&slot).await?;
        self.cache.slot_edited(&slot).await;

        info!("Slot {} moved from {} to {}", slot.id, previous, new_range);
        Ok(slot)
    }

    /// Deletes the slot after cancelling every scheduled appointment on it.
    #[instrument(skip(self))]
    pub async fn delete_slot(&self, slot_id: Uuid, caller: &AuthContext) -> Result<Slot, SchedulingError> {
        let doctor_id = require_doctor(caller)?;
        let slot = self.owned_slot(slot_id, doctor_id).await?;

        let scheduled = self
            .appointments
            .get_by_slot(slot.id, Some(AppointmentStatus::Scheduled))
            .await?;
        for appointment in &scheduled {
            // Already inside the caller's queued unit; going through the queue again would deadlock.
            self.booking
                .transition_status(appointment.id, AppointmentStatus::Cancelled, caller)
                .await?;
        }

        self.slots.delete(slot.id).await?;
        self.cache.slot_deleted(&slot).await;

        info!(
            "Slot {} deleted by doctor {} ({} appointments cancelled)",
            slot.id,
            doctor_id,
            scheduled.len()
        );
        Ok(slot)
    }

    async fn owned_slot(&self, slot_id: Uuid, doctor_id: Uuid) -> Result<Slot, SchedulingError> {
        let slot = self
            .slots
            .get_by_id(slot_id)
            .await?
            .ok_or_else(SchedulingError::slot_not_found)?;
        ensure_owner(&slot, doctor_id)?;
        Ok(slot)
    }
}

fn ensure_owner(slot: &Slot, doctor_id: Uuid) -> Result<(), SchedulingError> {
    if slot.doctor_id != doctor_id {
        warn!("Doctor {} does not own slot {}", doctor_id, slot.id);
        return Err(SchedulingError::NotOwner);
    }
    Ok(())
}
