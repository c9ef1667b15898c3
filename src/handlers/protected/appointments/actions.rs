// Workflow actions on a single appointment. Each maps onto one edge (or set
// of edges) of the status table and returns the updated appointment.
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    Json,
};
use serde::Deserialize;

use super::{json_body, optional_json_body, parse_appointment_id};
use crate::app::AppState;
use crate::database::models::Appointment;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

#[derive(Debug, Default, Deserialize)]
pub struct NotesBody {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelBody {
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleBody {
    /// `YYYY-MM-DD`
    pub date: String,
    /// `HH:MM`
    pub time: String,
}

/// POST /api/appointments/:id/confirm
pub async fn confirm(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    Ok(ApiResponse::success(state.appointments.confirm(&ctx.actor, id).await?))
}

/// POST /api/appointments/:id/check-in
pub async fn check_in(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    Ok(ApiResponse::success(state.appointments.check_in(&ctx.actor, id).await?))
}

/// POST /api/appointments/:id/start
pub async fn start(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    Ok(ApiResponse::success(state.appointments.start(&ctx.actor, id).await?))
}

/// POST /api/appointments/:id/complete - optional `{ notes }`
pub async fn complete(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<NotesBody>, JsonRejection>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    let body = optional_json_body(body)?;
    let appointment = state
        .appointments
        .complete(&ctx.actor, id, body.notes.as_deref())
        .await?;
    Ok(ApiResponse::success(appointment))
}

/// POST /api/appointments/:id/no-show
pub async fn no_show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    Ok(ApiResponse::success(state.appointments.mark_no_show(&ctx.actor, id).await?))
}

/// POST /api/appointments/:id/cancel - optional `{ reason }`
pub async fn cancel(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<CancelBody>, JsonRejection>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    let body = optional_json_body(body)?;
    let appointment = state
        .appointments
        .cancel(&ctx.actor, id, body.reason.as_deref())
        .await?;
    Ok(ApiResponse::success(appointment))
}

/// POST /api/appointments/:id/reschedule - `{ date, time }`
pub async fn reschedule(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    body: Result<Json<RescheduleBody>, JsonRejection>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    let body = json_body(body)?;
    let appointment = state
        .appointments
        .reschedule(&ctx.actor, id, &body.date, &body.time)
        .await?;
    Ok(ApiResponse::success(appointment))
}
