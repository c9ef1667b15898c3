use axum::extract::{Extension, Path, State};

use super::parse_appointment_id;
use crate::app::AppState;
use crate::database::models::Appointment;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

/// GET /api/appointments/:id
pub async fn show(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> ApiResult<Appointment> {
    let id = parse_appointment_id("id", &id)?;
    let appointment = state.appointments.get(&ctx.actor, id).await?;
    Ok(ApiResponse::success(appointment))
}
