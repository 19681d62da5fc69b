// libs/appointment-cell/src/models.rs
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ==============================================================================
// TIME RANGES & SLOTS
// ==============================================================================

/// A window of time on a single calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl TimeRange {
    pub fn new(date: NaiveDate, start_time: NaiveTime, end_time: NaiveTime) -> Self {
        Self { date, start_time, end_time }
    }

    pub fn is_valid(&self) -> bool {
        self.end_time > self.start_time
    }

    /// Half-open overlap on the same day. Touching endpoints do not overlap.
    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.date == other.date && other.start_time < self.end_time && other.end_time > self.start_time
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.date.format("%d/%m/%Y"),
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M")
        )
    }
}

/// A doctor-owned bookable time window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl Slot {
    pub fn new(doctor_id: Uuid, range: TimeRange) -> Self {
        Self {
            id: Uuid::new_v4(),
            doctor_id,
            date: range.date,
            start_time: range.start_time,
            end_time: range.end_time,
        }
    }

    pub fn range(&self) -> TimeRange {
        TimeRange::new(self.date, self.start_time, self.end_time)
    }

    pub fn reschedule(&mut self, range: TimeRange) {
        self.date = range.date;
        self.start_time = range.start_time;
        self.end_time = range.end_time;
    }
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    #[serde(alias = "agendada")]
    Scheduled,
    #[serde(alias = "finalizada")]
    Completed,
    #[serde(alias = "cancelada")]
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Scheduled)
    }

    /// Whether an appointment in this status still claims its slot.
    pub fn holds_slot(&self) -> bool {
        !matches!(self, AppointmentStatus::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "scheduled" | "agendada" => Ok(AppointmentStatus::Scheduled),
            "completed" | "finalizada" => Ok(AppointmentStatus::Completed),
            "cancelled" | "canceled" | "cancelada" => Ok(AppointmentStatus::Cancelled),
            other => Err(format!("Unknown appointment status: {}", other)),
        }
    }
}

/// A patient's claim on a slot. Never physically deleted.
///
/// The owning doctor is recorded at booking time so the appointment stays
/// attributable after its slot is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub slot_id: Uuid,
    pub doctor_id: Uuid,
    pub patient_id: Uuid,
    pub status: AppointmentStatus,
}

impl Appointment {
    pub fn scheduled(slot: &Slot, patient_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            slot_id: slot.id,
            doctor_id: slot.doctor_id,
            patient_id,
            status: AppointmentStatus::Scheduled,
        }
    }

    pub fn involves(&self, person_id: Uuid) -> bool {
        self.patient_id == person_id || self.doctor_id == person_id
    }

    pub fn with_status(&self, status: AppointmentStatus) -> Self {
        Self { status, ..self.clone() }
    }
}

// ==============================================================================
// NOTIFICATIONS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(appointment_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            appointment_id,
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}

// ==============================================================================
// REQUEST DTOs
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotRangeRequest {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl From<SlotRangeRequest> for TimeRange {
    fn from(request: SlotRangeRequest) -> Self {
        TimeRange::new(request.date, request.start_time, request.end_time)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub slot_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<AppointmentStatus>,
}
