use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::app::AppState;

/// GET / - service info
pub async fn root() -> impl IntoResponse {
    Json(json!({
        "success": true,
        "data": {
            "name": "vete-api",
            "version": env!("CARGO_PKG_VERSION"),
            "description": "Appointment lifecycle API for veterinary clinics",
            "endpoints": {
                "health": "/health (public)",
                "appointments": "/api/appointments[/:id] (staff, or owning client for a single appointment)",
                "status": "/api/appointments/status (staff)",
                "actions": "/api/appointments/:id/{confirm,check-in,start,complete,no-show,cancel,reschedule}",
                "portal": "/api/portal/appointments (client)",
                "monitoring": "/api/monitoring/error-rates (admin)",
                "cron": "/api/cron/no-show-sweep (cron secret)",
            }
        }
    }))
}

/// GET /health - store connectivity
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = chrono::Utc::now();

    match state.store.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok"
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "error": "Servicio temporalmente no disponible",
                    "code": "SERVICE_UNAVAILABLE",
                    "data": {
                        "status": "degraded",
                        "timestamp": now,
                    }
                })),
            )
        }
    }
}
