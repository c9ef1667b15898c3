use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::appointments::status::AppointmentStatus;
use crate::database::manager::{DatabaseError, QueryTimer};
use crate::database::models::appointment::AppointmentRow;
use crate::database::models::{Appointment, AppointmentFilter, NewAppointment, Pet, Profile, TransitionPatch};
use crate::database::store::AppointmentStore;

/// Columns of an appointment joined with its pet's owner. Sources must be aliased `a` and `p`.
const APPOINTMENT_COLUMNS: &str = r#"
    a.id, a.tenant_id, a.pet_id, p.owner_id, a.vet_id, a.start_time, a.end_time,
    a.status, a.reason, a.notes, a.checked_in_at, a.checked_in_by, a.started_at,
    a.completed_at, a.completed_by, a.created_by, a.created_at, a.updated_at
"#;

/// Statuses that no longer occupy a slot in the schedule
const FREE_SLOT_STATUSES: [&str; 2] = ["cancelled", "no_show"];

pub struct PgStore {
    pool: PgPool,
    timer: QueryTimer,
}

impl PgStore {
    pub fn new(pool: PgPool, timer: QueryTimer) -> Self {
        Self { pool, timer }
    }

    fn convert(row: AppointmentRow) -> Result<Appointment, DatabaseError> {
        let id = row.id;
        Appointment::try_from(row).map_err(|e| DatabaseError::CorruptRow(format!("appointment {}: {}", id, e)))
    }

    fn convert_all(rows: Vec<AppointmentRow>) -> Result<Vec<Appointment>, DatabaseError> {
        rows.into_iter().map(Self::convert).collect()
    }
}

#[async_trait]
impl AppointmentStore for PgStore {
    async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DatabaseError> {
        let row = self
            .timer
            .track(
                "profiles",
                "select",
                sqlx::query("SELECT id, tenant_id, role, full_name FROM profiles WHERE id = $1")
                    .bind(user_id)
                    .fetch_optional(&self.pool),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let role: String = row.try_get("role")?;
        Ok(Some(Profile {
            id: row.try_get("id")?,
            tenant_id: row.try_get("tenant_id")?,
            role: role.parse().map_err(DatabaseError::CorruptRow)?,
            full_name: row.try_get("full_name")?,
        }))
    }

    async fn find_pet(&self, tenant_id: &str, pet_id: Uuid) -> Result<Option<Pet>, DatabaseError> {
        let pet = self
            .timer
            .track(
                "pets",
                "select",
                sqlx::query_as::<_, Pet>(
                    "SELECT id, tenant_id, owner_id, name, species FROM pets WHERE id = $1 AND tenant_id = $2",
                )
                .bind(pet_id)
                .bind(tenant_id)
                .fetch_optional(&self.pool),
            )
            .await?;
        Ok(pet)
    }

    async fn find_appointment(&self, tenant_id: &str, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM appointments a JOIN pets p ON p.id = a.pet_id WHERE a.id = $1 AND a.tenant_id = $2",
            APPOINTMENT_COLUMNS
        );
        let row = self
            .timer
            .track(
                "appointments",
                "select",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(id)
                    .bind(tenant_id)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Self::convert).transpose()
    }

    async fn list_appointments(
        &self,
        tenant_id: &str,
        filter: &AppointmentFilter,
    ) -> Result<(Vec<Appointment>, i64), DatabaseError> {
        let predicate = r#"
            a.tenant_id = $1
            AND ($2::text IS NULL OR a.status = $2)
            AND ($3::date IS NULL OR (a.start_time AT TIME ZONE 'UTC')::date = $3)
        "#;
        let status = filter.status.map(|s| s.as_str().to_string());

        let list_sql = format!(
            "SELECT {} FROM appointments a JOIN pets p ON p.id = a.pet_id WHERE {} ORDER BY a.start_time ASC LIMIT $4 OFFSET $5",
            APPOINTMENT_COLUMNS, predicate
        );
        let count_sql = format!("SELECT COUNT(*) FROM appointments a WHERE {}", predicate);

        let rows = self
            .timer
            .track(
                "appointments",
                "select",
                sqlx::query_as::<_, AppointmentRow>(&list_sql)
                    .bind(tenant_id)
                    .bind(&status)
                    .bind(filter.date)
                    .bind(filter.limit as i64)
                    .bind(filter.offset as i64)
                    .fetch_all(&self.pool),
            )
            .await?;

        let (total,): (i64,) = self
            .timer
            .track(
                "appointments",
                "count",
                sqlx::query_as(&count_sql)
                    .bind(tenant_id)
                    .bind(&status)
                    .bind(filter.date)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok((Self::convert_all(rows)?, total))
    }

    async fn list_owner_appointments(&self, tenant_id: &str, owner_id: Uuid) -> Result<Vec<Appointment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM appointments a JOIN pets p ON p.id = a.pet_id WHERE a.tenant_id = $1 AND p.owner_id = $2 ORDER BY a.start_time DESC",
            APPOINTMENT_COLUMNS
        );
        let rows = self
            .timer
            .track(
                "appointments",
                "select",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(tenant_id)
                    .bind(owner_id)
                    .fetch_all(&self.pool),
            )
            .await?;
        Self::convert_all(rows)
    }

    async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, DatabaseError> {
        let appointment = new.into_appointment(Utc::now());
        let sql = format!(
            r#"
            WITH a AS (
                INSERT INTO appointments (
                    id, tenant_id, pet_id, vet_id, start_time, end_time, status, reason,
                    created_by, created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
                RETURNING *
            )
            SELECT {} FROM a JOIN pets p ON p.id = a.pet_id
            "#,
            APPOINTMENT_COLUMNS
        );
        let row = self
            .timer
            .track(
                "appointments",
                "insert",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(appointment.id)
                    .bind(&appointment.tenant_id)
                    .bind(appointment.pet_id)
                    .bind(appointment.vet_id)
                    .bind(appointment.start_time)
                    .bind(appointment.end_time)
                    .bind(appointment.status.as_str())
                    .bind(&appointment.reason)
                    .bind(appointment.created_by)
                    .bind(appointment.created_at)
                    .fetch_one(&self.pool),
            )
            .await?;
        Self::convert(row)
    }

    async fn apply_transition(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        patch: &TransitionPatch,
    ) -> Result<Option<Appointment>, DatabaseError> {
        // The status guard in the WHERE clause makes the check-and-set a single statement
        let sql = format!(
            r#"
            WITH a AS (
                UPDATE appointments SET
                    status = $4,
                    updated_at = $5,
                    notes = COALESCE($6, notes),
                    checked_in_at = COALESCE($7, checked_in_at),
                    checked_in_by = COALESCE($8, checked_in_by),
                    started_at = COALESCE($9, started_at),
                    completed_at = COALESCE($10, completed_at),
                    completed_by = COALESCE($11, completed_by)
                WHERE id = $1 AND tenant_id = $2 AND status = $3
                RETURNING *
            )
            SELECT {} FROM a JOIN pets p ON p.id = a.pet_id
            "#,
            APPOINTMENT_COLUMNS
        );
        let row = self
            .timer
            .track(
                "appointments",
                "update",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(id)
                    .bind(tenant_id)
                    .bind(expected.as_str())
                    .bind(patch.status.as_str())
                    .bind(patch.updated_at)
                    .bind(&patch.notes)
                    .bind(patch.checked_in_at)
                    .bind(patch.checked_in_by)
                    .bind(patch.started_at)
                    .bind(patch.completed_at)
                    .bind(patch.completed_by)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Self::convert).transpose()
    }

    async fn reschedule(
        &self,
        tenant_id: &str,
        id: Uuid,
        expected: AppointmentStatus,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Result<Option<Appointment>, DatabaseError> {
        let sql = format!(
            r#"
            WITH a AS (
                UPDATE appointments SET start_time = $4, end_time = $5, updated_at = $6
                WHERE id = $1 AND tenant_id = $2 AND status = $3
                RETURNING *
            )
            SELECT {} FROM a JOIN pets p ON p.id = a.pet_id
            "#,
            APPOINTMENT_COLUMNS
        );
        let row = self
            .timer
            .track(
                "appointments",
                "update",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(id)
                    .bind(tenant_id)
                    .bind(expected.as_str())
                    .bind(start_time)
                    .bind(end_time)
                    .bind(updated_at)
                    .fetch_optional(&self.pool),
            )
            .await?;
        row.map(Self::convert).transpose()
    }

    async fn has_overlap(
        &self,
        tenant_id: &str,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        vet_id: Option<Uuid>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, DatabaseError> {
        let free: Vec<String> = FREE_SLOT_STATUSES.iter().map(|s| s.to_string()).collect();
        let (exists,): (bool,) = self
            .timer
            .track(
                "appointments",
                "overlap",
                sqlx::query_as(
                    r#"
                    SELECT EXISTS (
                        SELECT 1 FROM appointments
                        WHERE tenant_id = $1
                        AND start_time < $3
                        AND end_time > $2
                        AND NOT (status = ANY($4))
                        AND ($5::uuid IS NULL OR vet_id = $5)
                        AND ($6::uuid IS NULL OR id <> $6)
                    )
                    "#,
                )
                .bind(tenant_id)
                .bind(start_time)
                .bind(end_time)
                .bind(&free)
                .bind(vet_id)
                .bind(exclude_id)
                .fetch_one(&self.pool),
            )
            .await?;
        Ok(exists)
    }

    async fn find_overdue(
        &self,
        status: AppointmentStatus,
        started_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Appointment>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM appointments a JOIN pets p ON p.id = a.pet_id WHERE a.status = $1 AND a.start_time < $2 ORDER BY a.start_time ASC LIMIT $3",
            APPOINTMENT_COLUMNS
        );
        let rows = self
            .timer
            .track(
                "appointments",
                "select",
                sqlx::query_as::<_, AppointmentRow>(&sql)
                    .bind(status.as_str())
                    .bind(started_before)
                    .bind(limit as i64)
                    .fetch_all(&self.pool),
            )
            .await?;
        Self::convert_all(rows)
    }
}
