// libs/appointment-cell/src/services/scheduler.rs
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::error;
use uuid::Uuid;

use booking_queue_cell::SerialWorkQueue;
use cache_cell::CacheManager;
use shared_config::AppConfig;
use shared_models::auth::AuthContext;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot, TimeRange};
use crate::services::booking::AppointmentService;
use crate::services::events::EventSink;
use crate::services::notification::NotificationService;
use crate::services::projections::{CacheTtls, SchedulingCache};
use crate::services::slots::SlotService;
use crate::store::{AppointmentStore, NotificationStore, SlotStore};

/// Collaborators the engine is wired from at startup.
#[derive(Clone)]
pub struct SchedulingComponents {
    pub slots: Arc<dyn SlotStore>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub notifications: Arc<dyn NotificationStore>,
    pub cache: Arc<CacheManager>,
    pub events: Arc<dyn EventSink>,
}

impl SchedulingComponents {
    /// Uses one store for slots, appointments and notifications.
    pub fn from_store<S>(store: Arc<S>, cache: Arc<CacheManager>, events: Arc<dyn EventSink>) -> Self
    where
        S: SlotStore + AppointmentStore + NotificationStore + 'static,
    {
        Self {
            slots: store.clone(),
            appointments: store.clone(),
            notifications: store,
            cache,
            events,
        }
    }
}

/// Entry point of the scheduling engine.
///
/// Every mutation runs as a unit of work on the shared [`SerialWorkQueue`], so
/// conflict checks and the writes that depend on them never interleave.
/// Reads bypass the queue and may observe a cached projection that a queued
/// mutation is about to invalidate.
pub struct SchedulingService {
    slots: Arc<SlotService>,
    booking: Arc<AppointmentService>,
    queue: Arc<SerialWorkQueue>,
    submit_timeout: Option<Duration>,
}

impl SchedulingService {
    pub fn new(components: SchedulingComponents, queue: Arc<SerialWorkQueue>, config: &AppConfig) -> Self {
        let SchedulingComponents {
            slots,
            appointments,
            notifications,
            cache,
            events,
        } = components;

        let cache = Arc::new(SchedulingCache::new(cache, CacheTtls::from_config(config)));
        let notifications = Arc::new(NotificationService::new(notifications, Arc::clone(&events)));
        let booking = Arc::new(AppointmentService::new(
            Arc::clone(&slots),
            Arc::clone(&appointments),
            Arc::clone(&notifications),
            Arc::clone(&cache),
            Arc::clone(&events),
        ));
        let slot_service = Arc::new(SlotService::new(
            slots,
            appointments,
            Arc::clone(&booking),
            notifications,
            cache,
            events,
        ));

        Self {
            slots: slot_service,
            booking,
            queue,
            submit_timeout: config.queue_submit_timeout(),
        }
    }

    // ==============================================================================
    // QUEUED MUTATIONS
    // ==============================================================================

    pub async fn create_slot(&self, caller: AuthContext, candidate: TimeRange) -> Result<Slot, SchedulingError> {
        let slots = Arc::clone(&self.slots);
        self.enqueue("create_slot", move || async move { slots.create_slot(&caller, candidate).await })
            .await
    }

    pub async fn edit_slot(
        &self,
        slot_id: Uuid,
        caller: AuthContext,
        new_range: TimeRange,
    ) -> Result<Slot, SchedulingError> {
        let slots = Arc::clone(&self.slots);
        self.enqueue("edit_slot", move || async move {
            slots.edit_slot(slot_id, &caller, new_range).await
        })
        .await
    }

    pub async fn delete_slot(&self, slot_id: Uuid, caller: AuthContext) -> Result<Slot, SchedulingError> {
        let slots = Arc::clone(&self.slots);
        self.enqueue("delete_slot", move || async move { slots.delete_slot(slot_id, &caller).await })
            .await
    }

    pub async fn book_appointment(&self, caller: AuthContext, slot_id: Uuid) -> Result<Appointment, SchedulingError> {
        let booking = Arc::clone(&self.booking);
        self.enqueue("book_appointment", move || async move {
            booking.book_appointment(&caller, slot_id).await
        })
        .await
    }

    pub async fn transition_status(
        &self,
        appointment_id: Uuid,
        new_status: AppointmentStatus,
        caller: AuthContext,
    ) -> Result<Appointment, SchedulingError> {
        let booking = Arc::clone(&self.booking);
        self.enqueue("transition_status", move || async move {
            booking.transition_status(appointment_id, new_status, &caller).await
        })
        .await
    }

    // ==============================================================================
    // READS
    // ==============================================================================

    pub async fn list_available_slots(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SchedulingError> {
        self.slots.list_available_slots(doctor_id).await
    }

    pub async fn get_slot(&self, slot_id: Uuid, caller: &AuthContext) -> Result<Slot, SchedulingError> {
        self.slots.get_slot(slot_id, caller).await
    }

    pub async fn get_appointment(&self, appointment_id: Uuid, caller: &AuthContext) -> Result<Appointment, SchedulingError> {
        self.booking.get_appointment(appointment_id, caller).await
    }

    pub async fn list_patient_appointments(
        &self,
        caller: &AuthContext,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.booking.list_patient_appointments(caller, status).await
    }

    pub async fn list_doctor_appointments(
        &self,
        caller: &AuthContext,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.booking.list_doctor_appointments(caller, status).await
    }

    pub async fn list_notifications(
        &self,
        appointment_id: Uuid,
        caller: &AuthContext,
    ) -> Result<Vec<Notification>, SchedulingError> {
        self.booking.list_notifications(appointment_id, caller).await
    }

    pub fn queue(&self) -> &Arc<SerialWorkQueue> {
        &self.queue
    }

    async fn enqueue<F, Fut, T>(&self, operation: &'static str, work: F) -> Result<T, SchedulingError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SchedulingError>> + Send + 'static,
        T: Send + 'static,
    {
        let outcome = match self.submit_timeout {
            Some(limit) => self.queue.submit_with_timeout(work, limit).await,
            None => self.queue.submit(work).await,
        };

        match outcome {
            Ok(result) => result,
            Err(e) => {
                error!("{} did not complete on the work queue: {}", operation, e);
                Err(e.into())
            }
        }
    }
}
