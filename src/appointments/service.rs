//! Appointment lifecycle operations.
//!
//! Every status write goes through [`AppointmentService::transition`]: load
//! under the actor's tenant, authorize, check the edge against the transition
//! table, then write with an optimistic guard on the status that was read.
//! Nothing is written unless every step passes.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{AppointmentError, AppointmentResult};
use super::status::AppointmentStatus;
use crate::auth::{authorize, Action, Resource};
use crate::config::AppConfig;
use crate::database::models::{Appointment, AppointmentFilter, NewAppointment, Page, Profile, TransitionPatch};
use crate::database::AppointmentStore;
use crate::rate_limit::{LimitKind, RateLimiter};
use crate::revalidate::{appointment_paths, Revalidator};

const CONFLICT_MESSAGE: &str = "La cita fue modificada por otra operación. Recarga e intenta de nuevo.";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub pet_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub reason: String,
    #[serde(default)]
    pub vet_id: Option<Uuid>,
}

/// Clinic schedule query after parsing; `limit` is clamped by the service
#[derive(Debug, Clone, Default)]
pub struct ClinicQuery {
    pub status: Option<AppointmentStatus>,
    pub date: Option<NaiveDate>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnerAppointments {
    pub upcoming: Vec<Appointment>,
    pub past: Vec<Appointment>,
}

/// Outcome of a system-initiated transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemTransition {
    Applied,
    /// The appointment left the expected status before the write
    Skipped,
}

#[derive(Clone)]
pub struct AppointmentService {
    store: Arc<dyn AppointmentStore>,
    revalidator: Arc<dyn Revalidator>,
    rate_limiter: Arc<RateLimiter>,
    config: Arc<AppConfig>,
}

impl AppointmentService {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        revalidator: Arc<dyn Revalidator>,
        rate_limiter: Arc<RateLimiter>,
        config: Arc<AppConfig>,
    ) -> Self {
        Self {
            store,
            revalidator,
            rate_limiter,
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn AppointmentStore> {
        &self.store
    }

    /// Move an appointment to `requested` on behalf of a staff member of `acting_tenant_id`
    pub async fn update_status(
        &self,
        actor: &Profile,
        appointment_id: Uuid,
        requested: &str,
        acting_tenant_id: &str,
    ) -> AppointmentResult<Appointment> {
        // Capability and tenant are settled before anything about the appointment is revealed
        authorize(actor, Resource::clinic(acting_tenant_id), Action::ChangeStatus)?;

        let target: AppointmentStatus = requested
            .parse()
            .map_err(|e: super::status::UnknownStatus| AppointmentError::invalid_field("newStatus", e.to_string()))?;

        self.transition(actor, appointment_id, target, Action::ChangeStatus, |_, patch| Ok(patch))
            .await
    }

    pub async fn confirm(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        self.transition(actor, id, AppointmentStatus::Confirmed, Action::ChangeStatus, |_, patch| Ok(patch))
            .await
    }

    pub async fn check_in(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        self.transition(actor, id, AppointmentStatus::CheckedIn, Action::ChangeStatus, |_, mut patch| {
            patch.checked_in_at = Some(patch.updated_at);
            patch.checked_in_by = Some(actor.id);
            Ok(patch)
        })
        .await
    }

    pub async fn start(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        self.transition(actor, id, AppointmentStatus::InProgress, Action::ChangeStatus, |_, mut patch| {
            patch.started_at = Some(patch.updated_at);
            Ok(patch)
        })
        .await
    }

    pub async fn complete(&self, actor: &Profile, id: Uuid, notes: Option<&str>) -> AppointmentResult<Appointment> {
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        self.transition(actor, id, AppointmentStatus::Completed, Action::ChangeStatus, |current, mut patch| {
            patch.completed_at = Some(patch.updated_at);
            patch.completed_by = Some(actor.id);
            if let Some(notes) = notes {
                patch.notes = Some(append_note(current.notes.as_deref(), &format!("[Notas de cierre] {}", notes)));
            }
            Ok(patch)
        })
        .await
    }

    pub async fn mark_no_show(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        self.transition(actor, id, AppointmentStatus::NoShow, Action::ChangeStatus, |current, mut patch| {
            patch.notes = Some(append_note(current.notes.as_deref(), "[No se presentó]"));
            Ok(patch)
        })
        .await
    }

    /// Cancel by staff or by the owning client. Clients cannot cancel past appointments.
    pub async fn cancel(&self, actor: &Profile, id: Uuid, reason: Option<&str>) -> AppointmentResult<Appointment> {
        let reason = reason.map(str::trim).filter(|r| !r.is_empty());
        self.transition(actor, id, AppointmentStatus::Cancelled, Action::Cancel, |current, mut patch| {
            if !actor.is_staff() && current.start_time < patch.updated_at {
                return Err(AppointmentError::validation("No se puede cancelar una cita pasada"));
            }
            let note = match reason {
                Some(reason) => format!("[Cancelado] {}", reason),
                None if !actor.is_staff() => "[Cancelado por el cliente]".to_string(),
                None => "[Cancelado]".to_string(),
            };
            patch.notes = Some(append_note(current.notes.as_deref(), &note));
            Ok(patch)
        })
        .await
    }

    /// Move a live appointment to `date` `time` (UTC), keeping its duration and status
    pub async fn reschedule(
        &self,
        actor: &Profile,
        id: Uuid,
        date: &str,
        time: &str,
    ) -> AppointmentResult<Appointment> {
        let current = self.load(actor, id).await?;
        authorize(actor, Resource::appointment(&current), Action::Reschedule)?;

        if current.status.is_terminal() {
            return Err(AppointmentError::validation("Esta cita no puede ser reprogramada"));
        }

        let new_start = parse_slot(date, time)?;
        let now = Utc::now();
        if new_start < now {
            return Err(AppointmentError::validation("La nueva fecha debe ser en el futuro"));
        }
        let new_end = new_start + (current.end_time - current.start_time);

        if self
            .store
            .has_overlap(&current.tenant_id, new_start, new_end, current.vet_id, Some(current.id))
            .await?
        {
            return Err(AppointmentError::Conflict(
                "El horario seleccionado no está disponible. Por favor elige otro.".to_string(),
            ));
        }

        let updated = self
            .store
            .reschedule(&current.tenant_id, current.id, current.status, new_start, new_end, now)
            .await?
            .ok_or_else(|| AppointmentError::Conflict(CONFLICT_MESSAGE.to_string()))?;

        self.revalidate(&updated.tenant_id);
        if self.config.security.enable_audit_logging {
            tracing::info!(
                target: "audit",
                tenant = %updated.tenant_id,
                actor = %actor.id,
                appointment = %updated.id,
                from = %current.start_time,
                to = %updated.start_time,
                "appointment rescheduled"
            );
        }
        Ok(updated)
    }

    /// Create an appointment. Staff bookings are `scheduled`, client requests are `pending`.
    pub async fn book(&self, actor: &Profile, request: BookingRequest) -> AppointmentResult<Appointment> {
        if !actor.is_staff() {
            self.rate_limiter
                .check(LimitKind::Booking, &format!("user:{}", actor.id))
                .await?;
        }

        let pet = self
            .store
            .find_pet(&actor.tenant_id, request.pet_id)
            .await?
            .ok_or(AppointmentError::PetNotFound)?;
        authorize(actor, Resource::pet(&pet), Action::Book)?;

        let reason = request.reason.trim();
        if reason.is_empty() {
            return Err(AppointmentError::invalid_field("reason", "El motivo de la cita es requerido"));
        }
        if request.start_time < Utc::now() {
            return Err(AppointmentError::invalid_field(
                "startTime",
                "No se puede agendar citas en fechas pasadas",
            ));
        }
        if request.end_time <= request.start_time {
            return Err(AppointmentError::invalid_field(
                "endTime",
                "La hora de fin debe ser posterior a la hora de inicio",
            ));
        }
        if let Some(vet_id) = request.vet_id {
            let assignable = self
                .store
                .find_profile(vet_id)
                .await?
                .map_or(false, |vet| vet.tenant_id == pet.tenant_id && vet.is_staff());
            if !assignable {
                return Err(AppointmentError::invalid_field(
                    "vetId",
                    "El veterinario seleccionado no pertenece a esta clínica",
                ));
            }
        }
        if self
            .store
            .has_overlap(&pet.tenant_id, request.start_time, request.end_time, request.vet_id, None)
            .await?
        {
            return Err(AppointmentError::Conflict("Este horario ya está ocupado".to_string()));
        }

        let status = if actor.is_staff() {
            AppointmentStatus::Scheduled
        } else {
            AppointmentStatus::Pending
        };

        let created = self
            .store
            .insert_appointment(NewAppointment {
                tenant_id: pet.tenant_id.clone(),
                pet_id: pet.id,
                owner_id: pet.owner_id,
                vet_id: request.vet_id,
                start_time: request.start_time,
                end_time: request.end_time,
                status,
                reason: reason.to_string(),
                created_by: actor.id,
            })
            .await?;

        self.revalidate(&created.tenant_id);
        if self.config.security.enable_audit_logging {
            tracing::info!(
                target: "audit",
                tenant = %created.tenant_id,
                actor = %actor.id,
                appointment = %created.id,
                status = %created.status,
                "appointment booked"
            );
        }
        Ok(created)
    }

    pub async fn get(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        let appointment = self.load(actor, id).await?;
        authorize(actor, Resource::appointment(&appointment), Action::View)?;
        Ok(appointment)
    }

    pub async fn list_clinic(&self, actor: &Profile, query: ClinicQuery) -> AppointmentResult<Page<Appointment>> {
        authorize(actor, Resource::clinic(&actor.tenant_id), Action::ListClinic)?;

        let filter = AppointmentFilter {
            status: query.status,
            date: query.date,
            limit: self.config.page_size(query.limit),
            offset: query.offset.unwrap_or(0),
        };
        let (items, total) = self.store.list_appointments(&actor.tenant_id, &filter).await?;

        Ok(Page {
            items,
            total,
            limit: filter.limit,
            offset: filter.offset,
        })
    }

    /// The acting client's own appointments split around now
    pub async fn list_owner(&self, actor: &Profile) -> AppointmentResult<OwnerAppointments> {
        let now = Utc::now();
        let all = self
            .store
            .list_owner_appointments(&actor.tenant_id, actor.id)
            .await?;

        let (mut upcoming, mut past): (Vec<_>, Vec<_>) = all
            .into_iter()
            .partition(|a| a.start_time >= now && a.status != AppointmentStatus::Cancelled);
        upcoming.sort_by_key(|a| a.start_time);
        past.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        Ok(OwnerAppointments { upcoming, past })
    }

    /// Status change with no acting user, used by scheduled sweeps.
    /// The edge is still checked against the table.
    pub async fn system_transition(
        &self,
        current: &Appointment,
        patch: TransitionPatch,
        job: &str,
    ) -> AppointmentResult<SystemTransition> {
        current
            .status
            .validate_transition(patch.status)
            .map_err(AppointmentError::validation)?;

        match self
            .store
            .apply_transition(&current.tenant_id, current.id, current.status, &patch)
            .await?
        {
            Some(updated) => {
                self.revalidate(&updated.tenant_id);
                if self.config.security.enable_audit_logging {
                    tracing::info!(
                        target: "audit",
                        tenant = %updated.tenant_id,
                        actor = job,
                        appointment = %updated.id,
                        from = %current.status,
                        to = %updated.status,
                        "appointment status changed"
                    );
                }
                Ok(SystemTransition::Applied)
            }
            None => Ok(SystemTransition::Skipped),
        }
    }

    async fn load(&self, actor: &Profile, id: Uuid) -> AppointmentResult<Appointment> {
        self.store
            .find_appointment(&actor.tenant_id, id)
            .await?
            .ok_or(AppointmentError::NotFound)
    }

    async fn transition<F>(
        &self,
        actor: &Profile,
        id: Uuid,
        target: AppointmentStatus,
        action: Action,
        build: F,
    ) -> AppointmentResult<Appointment>
    where
        F: FnOnce(&Appointment, TransitionPatch) -> AppointmentResult<TransitionPatch>,
    {
        let current = self.load(actor, id).await?;
        authorize(actor, Resource::appointment(&current), action)?;

        current
            .status
            .validate_transition(target)
            .map_err(AppointmentError::validation)?;

        let patch = build(&current, TransitionPatch::new(target, Utc::now()))?;

        let updated = self
            .store
            .apply_transition(&current.tenant_id, current.id, current.status, &patch)
            .await?
            .ok_or_else(|| {
                tracing::warn!(
                    appointment = %current.id,
                    expected = %current.status,
                    "Status changed concurrently; write discarded"
                );
                AppointmentError::Conflict(CONFLICT_MESSAGE.to_string())
            })?;

        self.revalidate(&updated.tenant_id);
        if self.config.security.enable_audit_logging {
            tracing::info!(
                target: "audit",
                tenant = %updated.tenant_id,
                actor = %actor.id,
                role = %actor.role,
                appointment = %updated.id,
                from = %current.status,
                to = %updated.status,
                "appointment status changed"
            );
        }
        Ok(updated)
    }

    fn revalidate(&self, tenant_id: &str) {
        for path in appointment_paths(tenant_id) {
            self.revalidator.revalidate(tenant_id, &path);
        }
    }
}

fn append_note(existing: Option<&str>, note: &str) -> String {
    match existing {
        Some(existing) if !existing.is_empty() => format!("{}\n{}", existing, note),
        _ => note.to_string(),
    }
}

fn parse_slot(date: &str, time: &str) -> AppointmentResult<DateTime<Utc>> {
    let invalid = || AppointmentError::validation("Fecha u hora inválida");

    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| invalid())?;
    let time = NaiveTime::parse_from_str(time.trim(), "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(time.trim(), "%H:%M:%S"))
        .map_err(|_| invalid())?;

    Ok(date.and_time(time).and_utc())
}
