use axum::extract::{Extension, State};

use crate::app::AppState;
use crate::auth::{authorize, Action, Resource};
use crate::middleware::{ApiResponse, ApiResult, RequestContext};
use crate::monitoring::ErrorRateSummary;

/// GET /api/monitoring/error-rates
pub async fn error_rates(
    State(state): State<AppState>,
    Extension(ctx): Extension<RequestContext>,
) -> ApiResult<ErrorRateSummary> {
    authorize(&ctx.actor, Resource::clinic(&ctx.actor.tenant_id), Action::ViewMonitoring)?;

    Ok(ApiResponse::success(state.monitor.tracker.summary()))
}
