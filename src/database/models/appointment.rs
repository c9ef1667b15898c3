use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::appointments::status::AppointmentStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub tenant_id: String,
    pub pet_id: Uuid,
    /// Owner of the pet, joined from `pets`
    pub owner_id: Uuid,
    pub vet_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub notes: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw row shape; `status` is kept as text and parsed on conversion
#[derive(Debug, Clone, FromRow)]
pub struct AppointmentRow {
    pub id: Uuid,
    pub tenant_id: String,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub vet_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: String,
    pub reason: String,
    pub notes: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AppointmentRow> for Appointment {
    type Error = crate::appointments::status::UnknownStatus;

    fn try_from(row: AppointmentRow) -> Result<Self, Self::Error> {
        Ok(Self {
            status: row.status.parse()?,
            id: row.id,
            tenant_id: row.tenant_id,
            pet_id: row.pet_id,
            owner_id: row.owner_id,
            vet_id: row.vet_id,
            start_time: row.start_time,
            end_time: row.end_time,
            reason: row.reason,
            notes: row.notes,
            checked_in_at: row.checked_in_at,
            checked_in_by: row.checked_in_by,
            started_at: row.started_at,
            completed_at: row.completed_at,
            completed_by: row.completed_by,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub tenant_id: String,
    pub pet_id: Uuid,
    pub owner_id: Uuid,
    pub vet_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AppointmentStatus,
    pub reason: String,
    pub created_by: Uuid,
}

impl NewAppointment {
    pub fn into_appointment(self, now: DateTime<Utc>) -> Appointment {
        Appointment {
            id: Uuid::new_v4(),
            tenant_id: self.tenant_id,
            pet_id: self.pet_id,
            owner_id: self.owner_id,
            vet_id: self.vet_id,
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            reason: self.reason,
            notes: None,
            checked_in_at: None,
            checked_in_by: None,
            started_at: None,
            completed_at: None,
            completed_by: None,
            created_by: Some(self.created_by),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Columns written together with a status change. `None` leaves a column untouched.
#[derive(Debug, Clone)]
pub struct TransitionPatch {
    pub status: AppointmentStatus,
    pub updated_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub checked_in_at: Option<DateTime<Utc>>,
    pub checked_in_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub completed_by: Option<Uuid>,
}

impl TransitionPatch {
    pub fn new(status: AppointmentStatus, updated_at: DateTime<Utc>) -> Self {
        Self {
            status,
            updated_at,
            notes: None,
            checked_in_at: None,
            checked_in_by: None,
            started_at: None,
            completed_at: None,
            completed_by: None,
        }
    }

    pub fn apply(&self, appointment: &mut Appointment) {
        appointment.status = self.status;
        appointment.updated_at = self.updated_at;
        if let Some(notes) = &self.notes {
            appointment.notes = Some(notes.clone());
        }
        if self.checked_in_at.is_some() {
            appointment.checked_in_at = self.checked_in_at;
            appointment.checked_in_by = self.checked_in_by;
        }
        if self.started_at.is_some() {
            appointment.started_at = self.started_at;
        }
        if self.completed_at.is_some() {
            appointment.completed_at = self.completed_at;
            appointment.completed_by = self.completed_by;
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentFilter {
    pub status: Option<AppointmentStatus>,
    /// Restrict to appointments starting on this UTC day
    pub date: Option<NaiveDate>,
    pub limit: u32,
    pub offset: u32,
}

impl AppointmentFilter {
    pub fn matches(&self, appointment: &Appointment) -> bool {
        if let Some(status) = self.status {
            if appointment.status != status {
                return false;
            }
        }
        if let Some(date) = self.date {
            if appointment.start_time.date_naive() != date {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T: Serialize> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: u32,
    pub offset: u32,
}
