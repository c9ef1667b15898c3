use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    Json,
};
use serde::Deserialize;

use super::{json_body, parse_appointment_id};
use crate::app::AppState;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeRequest {
    pub appointment_id: String,
    pub new_status: String,
    pub tenant_id: String,
}

/// POST /api/appointments/status - `{ appointmentId, newStatus, tenantId }` -> `{ success: true }`
pub async fn update_status(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<StatusChangeRequest>, JsonRejection>,
) -> ApiResult<()> {
    let body = json_body(body)?;
    let appointment_id = parse_appointment_id("appointmentId", &body.appointment_id)?;

    state
        .appointments
        .update_status(&ctx.actor, appointment_id, &body.new_status, &body.tenant_id)
        .await?;

    Ok(ApiResponse::ok())
}
