use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};

use super::json_body;
use crate::app::AppState;
use crate::appointments::BookingRequest;
use crate::database::models::Appointment;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

/// POST /api/appointments - book a visit for a pet
pub async fn create(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<BookingRequest>, JsonRejection>,
) -> ApiResult<Appointment> {
    let request = json_body(body)?;
    let appointment = state.appointments.book(&ctx.actor, request).await?;
    Ok(ApiResponse::created(appointment))
}
