// libs/appointment-cell/src/store/postgrest.rs
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};
use uuid::Uuid;

use shared_database::supabase::SupabaseClient;

use crate::error::SchedulingError;
use crate::models::{Appointment, AppointmentStatus, Notification, Slot};
use crate::store::{AppointmentStore, NotificationStore, SlotStore};

const SLOTS: &str = "/rest/v1/slots";
const APPOINTMENTS: &str = "/rest/v1/appointments";
const NOTIFICATIONS: &str = "/rest/v1/notifications";

/// Store backed by Supabase PostgREST tables `slots`, `appointments` and `notifications`.
pub struct PostgrestStore {
    supabase: Arc<SupabaseClient>,
}

impl PostgrestStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select<T: DeserializeOwned>(&self, path: String) -> Result<Vec<T>, SchedulingError> {
        debug!("Querying {}", path);
        self.supabase
            .request::<Vec<T>>(Method::GET, &path, None, None)
            .await
            .map_err(|e| {
                error!("PostgREST query failed: {}", e);
                SchedulingError::from(e)
            })
    }

    async fn select_one<T: DeserializeOwned>(&self, path: String) -> Result<Option<T>, SchedulingError> {
        Ok(self.select::<T>(path).await?.into_iter().next())
    }

    async fn insert_row<T: DeserializeOwned>(&self, table: &str, row: Value) -> Result<T, SchedulingError> {
        let rows: Vec<T> = self
            .supabase
            .request_with_headers(
                Method::POST,
                table,
                None,
                Some(row),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                error!("PostgREST insert into {} failed: {}", table, e);
                SchedulingError::from(e)
            })?;

        rows.into_iter()
            .next()
            .ok_or_else(|| SchedulingError::Store(format!("Insert into {} returned no rows", table)))
    }

    /// PATCH that must touch exactly the addressed row.
    async fn patch_row(&self, path: String, changes: Value, entity: &str) -> Result<(), SchedulingError> {
        let rows: Vec<Value> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(changes),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| {
                error!("PostgREST update of {} failed: {}", entity, e);
                SchedulingError::from(e)
            })?;

        if rows.is_empty() {
            return Err(SchedulingError::NotFound(entity.to_string()));
        }
        Ok(())
    }
}

fn status_filter(status: Option<AppointmentStatus>) -> String {
    status.map(|s| format!("&status=eq.{}", s)).unwrap_or_default()
}

#[async_trait]
impl SlotStore for PostgrestStore {
    async fn get_by_doctor(&self, doctor_id: Uuid) -> Result<Vec<Slot>, SchedulingError> {
        self.select(format!(
            "{}?doctor_id=eq.{}&order=date.asc,start_time.asc",
            SLOTS, doctor_id
        ))
        .await
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Slot>, SchedulingError> {
        self.select_one(format!("{}?id=eq.{}", SLOTS, id)).await
    }

    async fn insert(&self, slot: Slot) -> Result<Slot, SchedulingError> {
        let row = serde_json::to_value(&slot).map_err(|e| SchedulingError::Store(e.to_string()))?;
        self.insert_row(SLOTS, row).await
    }

    async fn update(&self, slot: &Slot) -> Result<(), SchedulingError> {
        let changes = json!({
            "date": slot.date,
            "start_time": slot.start_time,
            "end_time": slot.end_time,
        });
        self.patch_row(format!("{}?id=eq.{}", SLOTS, slot.id), changes, "Slot")
            .await
    }

    async fn delete(&self, id: Uuid) -> Result<(), SchedulingError> {
        let path = format!("{}?id=eq.{}", SLOTS, id);
        self.supabase
            .request::<Value>(Method::DELETE, &path, None, None)
            .await
            .map_err(|e| {
                error!("PostgREST delete of slot {} failed: {}", id, e);
                SchedulingError::from(e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for PostgrestStore {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<Appointment>, SchedulingError> {
        self.select_one(format!("{}?id=eq.{}", APPOINTMENTS, id)).await
    }

    async fn get_by_patient(
        &self,
        patient_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.select(format!(
            "{}?patient_id=eq.{}{}",
            APPOINTMENTS,
            patient_id,
            status_filter(status)
        ))
        .await
    }

    async fn get_by_doctor(
        &self,
        doctor_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.select(format!(
            "{}?doctor_id=eq.{}{}",
            APPOINTMENTS,
            doctor_id,
            status_filter(status)
        ))
        .await
    }

    async fn get_by_slot(
        &self,
        slot_id: Uuid,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<Appointment>, SchedulingError> {
        self.select(format!(
            "{}?slot_id=eq.{}{}",
            APPOINTMENTS,
            slot_id,
            status_filter(status)
        ))
        .await
    }

    async fn insert(&self, appointment: Appointment) -> Result<Appointment, SchedulingError> {
        let row = serde_json::to_value(&appointment).map_err(|e| SchedulingError::Store(e.to_string()))?;
        self.insert_row(APPOINTMENTS, row).await
    }

    async fn update_status(&self, id: Uuid, status: AppointmentStatus) -> Result<(), SchedulingError> {
        self.patch_row(
            format!("{}?id=eq.{}", APPOINTMENTS, id),
            json!({ "status": status }),
            "Appointment",
        )
        .await
    }
}

#[async_trait]
impl NotificationStore for PostgrestStore {
    async fn insert(&self, notification: Notification) -> Result<Notification, SchedulingError> {
        let row = serde_json::to_value(&notification).map_err(|e| SchedulingError::Store(e.to_string()))?;
        self.insert_row(NOTIFICATIONS, row).await
    }

    async fn get_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<Notification>, SchedulingError> {
        self.select(format!(
            "{}?appointment_id=eq.{}&order=created_at.asc",
            NOTIFICATIONS, appointment_id
        ))
        .await
    }
}
