use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::appointments::OwnerAppointments;
use crate::middleware::{ApiResponse, ApiResult, RequestContext};

/// GET /api/portal/appointments - the acting client's upcoming and past visits
pub async fn appointments(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<OwnerAppointments> {
    let appointments = state.appointments.list_owner(&ctx.actor).await?;
    Ok(ApiResponse::success(appointments))
}
