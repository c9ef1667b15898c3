use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::appointments::status::AppointmentStatus;
use crate::database::manager::DatabaseError;
use crate::database::models::{Appointment, AppointmentFilter, NewAppointment, Pet, Profile, TransitionPatch};

/// Persistence seam for the appointment lifecycle.
///
/// Every appointment lookup is scoped by tenant: an id that exists under a
/// different tenant resolves to `None`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn ping(&self) -> Result<(), DatabaseError>;

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DatabaseError>;

    async fn find_pet(&self, tenant_id: &str, pet_id: Uuid) -> Result<Option<Pet>, DatabaseError>;

    async fn find_appointment(&self, tenant_id: &str, id: Uuid) -> Result<Option<Appointment>, DatabaseError>;

    /// One page of a clinic's appointments ordered by start time, plus the unpaged total
    async fn list_appointments(
        &self,
        tenant_id: &str,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), DatabaseError>;

    async fn list_owner_appointments(&self, tenant_id: &str, owner_id: Uuid) -> Result<Vec<Appointment>, DatabaseError>;

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, DatabaseError>;

    /// Write `patch` only if the stored status still equals `expected`.
    /// Returns `None` when no row matched (missing, other tenant, or status changed).
    async fn apply_transition(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &TransitionPatch,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// Move an appointment in time, guarded the same way as `apply_transition`
    async fn reschedule(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DatabaseError>;

    /// True if a live (not cancelled / no-show) appointment of the tenant intersects `[start, end)`
    async fn has_overlap(
        &self,
        tenant_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        vet_id: Option<Uuid>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DatabaseError>;

    /// Appointments across all tenants in `status` whose start is before `started_before`
    async fn find_overdue(
        &self,
        status: AppointmentStatus,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Appointment>, DatabaseError>;
}
