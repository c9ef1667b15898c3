use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::auth::AuthUser;
use crate::app::AppState;
use crate::database::models::Profile;
use crate::error::ApiError;

/// Per-request context built at the boundary and handed to every handler
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub actor: Profile,
    pub request_id: Option<String>,
}

/// Resolves the JWT subject to its clinic profile. Runs after `jwt_auth_middleware`.
pub async fn request_context_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("No autorizado"))?;

    let actor = state
        .store
        .find_profile(auth_user.user_id)
        .await?
        .ok_or_else(|| {
            tracing::warn!("No profile for authenticated user {}", auth_user.user_id);
            ApiError::forbidden("Perfil no encontrado")
        })?;

    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    tracing::debug!(
        user = %actor.id,
        tenant = %actor.tenant_id,
        role = %actor.role,
        request_id = request_id.as_deref().unwrap_or("-"),
        "Request context resolved"
    );

    request.extensions_mut().insert(RequestContext { actor, request_id });

    Ok(next.run(request).await)
}
