use std::sync::Arc;

use axum::{
    http::{HeaderName, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::appointments::AppointmentService;
use crate::config::AppConfig;
use crate::cron;
use crate::database::AppointmentStore;
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, request_context_middleware};
use crate::monitoring::{error_rate_middleware, Monitor};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::revalidate::Revalidator;

/// Process-wide dependencies, cloned into every request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AppointmentStore>,
    pub appointments: AppointmentService,
    pub rate_limiter: Arc<RateLimiter>,
    pub monitor: Monitor,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn AppointmentStore>, revalidator: Arc<dyn Revalidator>) -> Self {
        let config = Arc::new(config);
        let rate_limiter = Arc::new(RateLimiter::new(config.api.enable_rate_limiting));
        let appointments =
            AppointmentService::new(store.clone(), revalidator, rate_limiter.clone(), config.clone());
        let monitor = Monitor::new(&config.monitoring);

        Self {
            config,
            store,
            appointments,
            rate_limiter,
            monitor,
        }
    }

    /// Background cleanup for the in-memory limiter and error-rate windows
    pub fn spawn_background_tasks(&self) {
        self.rate_limiter.clone().spawn_cleanup();
        self.monitor.spawn_cleanup();
    }
}

pub fn app(state: AppState) -> Router {
    let request_id = HeaderName::from_static("x-request-id");

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .route("/api/cron/no-show-sweep", post(cron::no_show_sweep))
        // Protected API
        .merge(protected_routes(state.clone()))
        // Global middleware; the last layer added runs first
        .layer(from_fn_with_state(state.clone(), error_rate_middleware))
        .layer(RequestBodyLimitLayer::new(state.config.api.max_request_size_bytes))
        .layer(cors_layer(&state.config))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .with_state(state)
}

fn protected_routes(state: AppState) -> Router<AppState> {
    use protected::{appointments, monitoring, portal};

    Router::new()
        .route("/api/appointments", get(appointments::list).post(appointments::create))
        .route("/api/appointments/status", post(appointments::update_status))
        .route("/api/appointments/:id", get(appointments::show))
        .route("/api/appointments/:id/confirm", post(appointments::confirm))
        .route("/api/appointments/:id/check-in", post(appointments::check_in))
        .route("/api/appointments/:id/start", post(appointments::start))
        .route("/api/appointments/:id/complete", post(appointments::complete))
        .route("/api/appointments/:id/no-show", post(appointments::no_show))
        .route("/api/appointments/:id/cancel", post(appointments::cancel))
        .route("/api/appointments/:id/reschedule", post(appointments::reschedule))
        .route("/api/portal/appointments", get(portal::appointments))
        .route("/api/monitoring/error-rates", get(monitoring::error_rates))
        // JWT -> profile -> rate limit
        .route_layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .route_layer(from_fn_with_state(state.clone(), request_context_middleware))
        .route_layer(from_fn_with_state(state, jwt_auth_middleware))
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if !config.security.enable_cors {
        return CorsLayer::new();
    }

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.security.cors_origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();
    layer.allow_origin(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::revalidate::RecordingRevalidator;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use tower::ServiceExt;

    fn router(tweak: impl FnOnce(&mut AppConfig)) -> Router {
        let mut config = AppConfig::development();
        tweak(&mut config);
        let state = AppState::new(
            config,
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingRevalidator::new()),
        );
        app(state)
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected_before_auth() {
        let app = router(|c| c.api.max_request_size_bytes = 64);
        let response = app
            .oneshot(
                Request::post("/api/appointments")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header(header::CONTENT_LENGTH, "4096")
                    .body(Body::from(vec![b' '; 4096]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn preflight_allows_configured_origin() {
        let app = router(|c| {
            c.security.enable_cors = true;
            c.security.cors_origins = vec!["https://adris.vet".to_string()];
        });
        let response = app
            .oneshot(
                Request::options("/api/appointments/status")
                    .header(header::ORIGIN, "https://adris.vet")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "https://adris.vet"
        );
    }

    #[tokio::test]
    async fn request_id_is_generated_when_absent() {
        let response = router(|_| {})
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
    }
}
