//! Scheduled batch jobs triggered over HTTP by an external cron.
//!
//! Each invocation is a single pass with no retries; anything that fails is
//! reported, marks the pass unsuccessful, and is picked up by the next invocation.

use std::time::Instant;

use axum::{
    extract::State,
    http::HeaderMap,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use crate::app::AppState;
use crate::appointments::{
    AppointmentError, AppointmentResult, AppointmentService, AppointmentStatus, SystemTransition,
};
use crate::config::LifecycleConfig;
use crate::database::models::{Appointment, TransitionPatch};
use crate::error::ApiError;

pub const NO_SHOW_JOB: &str = "no-show-sweep";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepStats {
    pub total: usize,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepFailure {
    pub appointment_id: Uuid,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepReport {
    pub success: bool,
    pub message: String,
    pub stats: SweepStats,
    pub errors: Vec<SweepFailure>,
}

enum Outcome {
    Succeeded,
    Skipped,
    Failed(SweepFailure),
}

/// Mark confirmed appointments that started more than the grace period ago as `no_show`
pub async fn run_no_show_sweep(
    service: &AppointmentService,
    lifecycle: &LifecycleConfig,
    now: DateTime<Utc>,
) -> AppointmentResult<SweepReport> {
    let started = Instant::now();
    let cutoff = Duration::try_minutes(i64::from(lifecycle.no_show_grace_minutes))
        .and_then(|grace| now.checked_sub_signed(grace))
        .ok_or_else(|| AppointmentError::validation("Periodo de gracia fuera de rango"))?;

    tracing::info!("[{}] Starting cron job", NO_SHOW_JOB);
    let overdue = service
        .store()
        .find_overdue(AppointmentStatus::Confirmed, cutoff, lifecycle.sweep_batch_size)
        .await?;

    let mut stats = SweepStats {
        total: overdue.len(),
        ..Default::default()
    };

    if overdue.is_empty() {
        stats.duration_ms = started.elapsed().as_millis() as u64;
        return Ok(SweepReport {
            success: true,
            message: "No items to process".to_string(),
            stats,
            errors: Vec::new(),
        });
    }
    tracing::info!("[{}] Found {} items to process", NO_SHOW_JOB, overdue.len());

    let outcomes: Vec<Outcome> = stream::iter(overdue)
        .map(|appointment| mark_no_show(service, appointment, now))
        .buffer_unordered(lifecycle.sweep_concurrency.max(1))
        .collect()
        .await;

    let mut errors = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Succeeded => {
                stats.processed += 1;
                stats.succeeded += 1;
            }
            Outcome::Skipped => stats.skipped += 1,
            Outcome::Failed(failure) => {
                stats.processed += 1;
                stats.failed += 1;
                errors.push(failure);
            }
        }
    }
    stats.duration_ms = started.elapsed().as_millis() as u64;

    let message = format!(
        "Processed {}/{} items ({} succeeded, {} failed, {} skipped)",
        stats.processed, stats.total, stats.succeeded, stats.failed, stats.skipped
    );
    if stats.failed > 0 {
        tracing::warn!("[{}] {}", NO_SHOW_JOB, message);
    } else {
        tracing::info!("[{}] {}", NO_SHOW_JOB, message);
    }

    Ok(SweepReport {
        success: stats.failed == 0,
        message,
        stats,
        errors,
    })
}

async fn mark_no_show(service: &AppointmentService, appointment: Appointment, now: DateTime<Utc>) -> Outcome {
    let mut patch = TransitionPatch::new(AppointmentStatus::NoShow, now);
    patch.notes = Some(match appointment.notes.as_deref() {
        Some(existing) if !existing.is_empty() => format!("{}\n[No se presentó]", existing),
        _ => "[No se presentó]".to_string(),
    });

    match service.system_transition(&appointment, patch, NO_SHOW_JOB).await {
        Ok(SystemTransition::Applied) => Outcome::Succeeded,
        Ok(SystemTransition::Skipped) => Outcome::Skipped,
        Err(e) => {
            tracing::error!("[{}] Failed to process {}: {}", NO_SHOW_JOB, appointment.id, e);
            Outcome::Failed(SweepFailure {
                appointment_id: appointment.id,
                error: e.to_string(),
            })
        }
    }
}

fn cron_authorized(headers: &HeaderMap, secret: Option<&str>) -> bool {
    let Some(secret) = secret.filter(|s| !s.is_empty()) else {
        return false;
    };
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map_or(false, |token| token == secret)
}

/// POST /api/cron/no-show-sweep
pub async fn no_show_sweep(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !cron_authorized(&headers, state.config.security.cron_secret.as_deref()) {
        tracing::warn!("Unauthorized cron attempt for {}", NO_SHOW_JOB);
        return ApiError::unauthorized("Unauthorized").into_response();
    }

    match run_no_show_sweep(&state.appointments, &state.config.lifecycle, Utc::now()).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!("[{}] Cron job failed: {}", NO_SHOW_JOB, e);
            ApiError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::database::models::{AppointmentFilter, NewAppointment, Pet, Profile};
    use crate::database::{AppointmentStore, DatabaseError, MemoryStore};
    use crate::rate_limit::RateLimiter;
    use crate::revalidate::RecordingRevalidator;
    use axum::http::HeaderValue;
    use std::sync::Arc;

    async fn seed(store: &MemoryStore, status: AppointmentStatus, start: DateTime<Utc>) -> Appointment {
        let appointment = NewAppointment {
            tenant_id: "adris".to_string(),
            pet_id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            vet_id: None,
            start_time: start,
            end_time: start + Duration::minutes(30),
            status,
            reason: "Consulta".to_string(),
            created_by: Uuid::new_v4(),
        }
        .into_appointment(start);
        store.put_appointment(appointment.clone()).await;
        appointment
    }

    fn service(store: Arc<MemoryStore>) -> AppointmentService {
        AppointmentService::new(
            store,
            Arc::new(RecordingRevalidator::new()),
            Arc::new(RateLimiter::new(false)),
            Arc::new(AppConfig::development()),
        )
    }

    #[tokio::test]
    async fn sweep_marks_only_overdue_confirmed() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let overdue = seed(&store, AppointmentStatus::Confirmed, now - Duration::hours(2)).await;
        let within_grace = seed(&store, AppointmentStatus::Confirmed, now - Duration::minutes(10)).await;
        let checked_in = seed(&store, AppointmentStatus::CheckedIn, now - Duration::hours(2)).await;

        let service = service(store.clone());
        let report = run_no_show_sweep(&service, &AppConfig::development().lifecycle, now)
            .await
            .unwrap();

        assert_eq!(report.stats.total, 1);
        assert_eq!(report.stats.succeeded, 1);
        assert!(report.errors.is_empty());

        let swept = store.appointment(overdue.id).await.unwrap();
        assert_eq!(swept.status, AppointmentStatus::NoShow);
        assert_eq!(swept.notes.as_deref(), Some("[No se presentó]"));
        assert_eq!(
            store.appointment(within_grace.id).await.unwrap().status,
            AppointmentStatus::Confirmed
        );
        assert_eq!(
            store.appointment(checked_in.id).await.unwrap().status,
            AppointmentStatus::CheckedIn
        );
    }

    #[tokio::test]
    async fn empty_sweep_reports_nothing_to_do() {
        let store = Arc::new(MemoryStore::new());
        let report = run_no_show_sweep(&service(store), &AppConfig::development().lifecycle, Utc::now())
            .await
            .unwrap();
        assert_eq!(report.message, "No items to process");
        assert_eq!(report.stats.total, 0);
    }

    /// Reads from memory, every status write fails
    struct FailingWrites(MemoryStore);

    #[async_trait::async_trait]
    impl AppointmentStore for FailingWrites {
        async fn ping(&self) -> Result<(), DatabaseError> {
            self.0.ping().await
        }

        async fn find_profile(&self, user_id: Uuid) -> Result<Option<Profile>, DatabaseError> {
            self.0.find_profile(user_id).await
        }

        async fn find_pet(&self, tenant_id: &str, pet_id: Uuid) -> Result<Option<Pet>, DatabaseError> {
            self.0.find_pet(tenant_id, pet_id).await
        }

        async fn find_appointment(&self, tenant_id: &str, id: Uuid) -> Result<Option<Appointment>, DatabaseError> {
            self.0.find_appointment(tenant_id, id).await
        }

        async fn list_appointments(
            &self,
            tenant_id: &str,
            filter: &AppointmentFilter,
        ) -> Result<(Vec<Appointment>, i64), DatabaseError> {
            self.0.list_appointments(tenant_id, filter).await
        }

        async fn list_owner_appointments(
            &self,
            tenant_id: &str,
            owner_id: Uuid,
        ) -> Result<Vec<Appointment>, DatabaseError> {
            self.0.list_owner_appointments(tenant_id, owner_id).await
        }

        async fn insert_appointment(&self, new: NewAppointment) -> Result<Appointment, DatabaseError> {
            self.0.insert_appointment(new).await
        }

        async fn apply_transition(
            &self,
            _tenant_id: &str,
            _id: Uuid,
            _expected: AppointmentStatus,
            _patch: &TransitionPatch,
        ) -> Result<Option<Appointment>, DatabaseError> {
            Err(DatabaseError::CorruptRow("write rejected".to_string()))
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
            self.0
                .reschedule(tenant_id, id, expected, start_time, end_time, updated_at)
                .await
        }

        async fn has_overlap(
            &self,
            tenant_id: &str,
            start_time: DateTime<Utc>,
            end_time: DateTime<Utc>,
            vet_id: Option<Uuid>,
            exclude_id: Option<Uuid>,
        ) -> Result<bool, DatabaseError> {
            self.0
                .has_overlap(tenant_id, start_time, end_time, vet_id, exclude_id)
                .await
        }

        async fn find_overdue(
            &self,
            status: AppointmentStatus,
            started_before: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<Appointment>, DatabaseError> {
            self.0.find_overdue(status, started_before, limit).await
        }
    }

    #[tokio::test]
    async fn failed_writes_mark_the_pass_unsuccessful() {
        let memory = MemoryStore::new();
        let now = Utc::now();
        let overdue = seed(&memory, AppointmentStatus::Confirmed, now - Duration::hours(2)).await;
        let store = Arc::new(FailingWrites(memory));

        let service = AppointmentService::new(
            store.clone(),
            Arc::new(RecordingRevalidator::new()),
            Arc::new(RateLimiter::new(false)),
            Arc::new(AppConfig::development()),
        );
        let report = run_no_show_sweep(&service, &AppConfig::development().lifecycle, now)
            .await
            .unwrap();

        assert!(!report.success);
        assert_eq!(report.stats.total, 1);
        assert_eq!(report.stats.processed, 1);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].appointment_id, overdue.id);
        assert_eq!(
            store.0.appointment(overdue.id).await.unwrap().status,
            AppointmentStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn upcoming_appointments_are_never_swept() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        let upcoming = seed(&store, AppointmentStatus::Confirmed, now + Duration::minutes(30)).await;

        let mut lifecycle = AppConfig::development().lifecycle;
        lifecycle.no_show_grace_minutes = 0;
        let report = run_no_show_sweep(&service(store.clone()), &lifecycle, now).await.unwrap();

        assert_eq!(report.stats.total, 0);
        assert_eq!(
            store.appointment(upcoming.id).await.unwrap().status,
            AppointmentStatus::Confirmed
        );
    }

    #[tokio::test]
    async fn huge_grace_period_sweeps_nothing() {
        let store = Arc::new(MemoryStore::new());
        let now = Utc::now();
        seed(&store, AppointmentStatus::Confirmed, now - Duration::days(365)).await;

        let mut lifecycle = AppConfig::development().lifecycle;
        lifecycle.no_show_grace_minutes = u32::MAX;
        let report = run_no_show_sweep(&service(store), &lifecycle, now).await.unwrap();

        assert!(report.success);
        assert_eq!(report.stats.total, 0);
    }

    #[test]
    fn cron_secret_is_required() {
        let mut headers = HeaderMap::new();
        assert!(!cron_authorized(&headers, Some("s3cret")));

        headers.insert("authorization", HeaderValue::from_static("Bearer s3cret"));
        assert!(cron_authorized(&headers, Some("s3cret")));
        assert!(!cron_authorized(&headers, Some("other")));
        assert!(!cron_authorized(&headers, None));
        assert!(!cron_authorized(&headers, Some("")));
    }
}
