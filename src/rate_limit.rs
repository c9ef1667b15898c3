//! In-process sliding-window rate limiting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    http::{HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::app::AppState;
use crate::error::ApiError;
use crate::middleware::RequestContext;

/// Timestamps older than this are always discarded by the cleanup task
const IDLE_RETENTION: Duration = Duration::from_secs(10 * 60);
const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LimitKind {
    Auth,
    Search,
    Write,
    Booking,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct LimitPolicy {
    pub max_requests: u32,
    pub window: Duration,
    message: &'static str,
}

impl LimitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitKind::Auth => "auth",
            LimitKind::Search => "search",
            LimitKind::Write => "write",
            LimitKind::Booking => "booking",
            LimitKind::Default => "default",
        }
    }

    pub fn policy(&self) -> LimitPolicy {
        const MINUTE: Duration = Duration::from_secs(60);
        match self {
            LimitKind::Auth => LimitPolicy {
                max_requests: 5,
                window: MINUTE,
                message: "Demasiadas solicitudes. Intente de nuevo en",
            },
            LimitKind::Search => LimitPolicy {
                max_requests: 30,
                window: MINUTE,
                message: "Demasiadas búsquedas. Intente de nuevo en",
            },
            LimitKind::Write => LimitPolicy {
                max_requests: 20,
                window: MINUTE,
                message: "Demasiadas solicitudes. Intente de nuevo en",
            },
            LimitKind::Booking => LimitPolicy {
                max_requests: 5,
                window: Duration::from_secs(60 * 60),
                message: "Demasiadas solicitudes de reserva. Intente de nuevo en",
            },
            LimitKind::Default => LimitPolicy {
                max_requests: 60,
                window: MINUTE,
                message: "Demasiadas solicitudes. Intente de nuevo en",
            },
        }
    }

    /// Limit applied to a request that has no more specific kind
    pub fn for_method(method: &Method) -> Self {
        if method == Method::GET || method == Method::HEAD {
            LimitKind::Default
        } else {
            LimitKind::Write
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} {retry_after} segundos.")]
pub struct RateLimitExceeded {
    pub message: &'static str,
    pub limit: u32,
    /// Whole seconds until the oldest counted request leaves the window
    pub retry_after: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitAllowance {
    pub limit: u32,
    pub remaining: u32,
}

#[derive(Debug)]
struct Window {
    timestamps: Vec<Instant>,
    span: Duration,
}

/// Sliding-window counter keyed by `ratelimit:<kind>:<identifier>`
#[derive(Debug)]
pub struct RateLimiter {
    enabled: bool,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn key(kind: LimitKind, identifier: &str) -> String {
        format!("ratelimit:{}:{}", kind.as_str(), identifier)
    }

    pub async fn check(&self, kind: LimitKind, identifier: &str) -> Result<RateLimitAllowance, RateLimitExceeded> {
        self.check_at(kind, identifier, Instant::now()).await
    }

    pub async fn check_at(
        &self,
        kind: LimitKind,
        identifier: &str,
        now: Instant,
    ) -> Result<RateLimitAllowance, RateLimitExceeded> {
        let policy = kind.policy();
        if !self.enabled {
            return Ok(RateLimitAllowance {
                limit: policy.max_requests,
                remaining: policy.max_requests,
            });
        }

        let mut windows = self.windows.lock().await;
        let window = windows.entry(Self::key(kind, identifier)).or_insert_with(|| Window {
            timestamps: Vec::new(),
            span: policy.window,
        });

        window
            .timestamps
            .retain(|ts| now.saturating_duration_since(*ts) < policy.window);

        if window.timestamps.len() as u32 >= policy.max_requests {
            let oldest = window.timestamps.iter().min().copied().unwrap_or(now);
            let elapsed = now.saturating_duration_since(oldest);
            let wait = policy.window.saturating_sub(elapsed);
            let retry_after = wait.as_millis().div_ceil(1000).max(1) as u64;

            tracing::warn!(kind = kind.as_str(), identifier, retry_after, "Rate limit exceeded");
            return Err(RateLimitExceeded {
                message: policy.message,
                limit: policy.max_requests,
                retry_after,
            });
        }

        window.timestamps.push(now);
        Ok(RateLimitAllowance {
            limit: policy.max_requests,
            remaining: policy.max_requests - window.timestamps.len() as u32,
        })
    }

    /// Drop timestamps that no window can count any more, then empty keys
    pub async fn cleanup_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| {
            let keep_for = window.span.max(IDLE_RETENTION);
            window
                .timestamps
                .retain(|ts| now.saturating_duration_since(*ts) < keep_for);
            !window.timestamps.is_empty()
        });
        before - windows.len()
    }

    pub async fn tracked_keys(&self) -> usize {
        self.windows.lock().await.len()
    }

    pub fn spawn_cleanup(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let removed = self.cleanup_at(Instant::now()).await;
                if removed > 0 {
                    tracing::debug!(removed, "Rate limit cleanup");
                }
            }
        })
    }
}

/// `user:<id>` for an authenticated actor, otherwise `ip:<addr>` from proxy headers
pub fn client_identifier(headers: &HeaderMap, user_id: Option<uuid::Uuid>) -> String {
    if let Some(id) = user_id {
        return format!("user:{}", id);
    }

    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    format!("ip:{}", forwarded.or(real_ip).unwrap_or("unknown"))
}

impl From<RateLimitExceeded> for ApiError {
    fn from(err: RateLimitExceeded) -> Self {
        ApiError::rate_limited(err.to_string(), err.limit, err.retry_after)
    }
}

/// Rate limit middleware for authenticated routes. Runs after profile resolution.
pub async fn rate_limit_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.rate_limiter.is_enabled() {
        return next.run(request).await;
    }

    let user_id = request.extensions().get::<RequestContext>().map(|ctx| ctx.actor.id);
    let identifier = client_identifier(request.headers(), user_id);
    let kind = LimitKind::for_method(request.method());

    match state.rate_limiter.check(kind, &identifier).await {
        Ok(allowance) => {
            let mut response = next.run(request).await;
            response
                .headers_mut()
                .insert("x-ratelimit-remaining", HeaderValue::from(allowance.remaining));
            response
        }
        Err(exceeded) => ApiError::from(exceeded).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sixth_auth_attempt_in_a_minute_is_limited() {
        let limiter = RateLimiter::new(true);
        let start = Instant::now();

        for i in 0..5 {
            let allowance = limiter
                .check_at(LimitKind::Auth, "ip:10.0.0.1", start + Duration::from_secs(i))
                .await
                .unwrap();
            assert_eq!(allowance.remaining, 4 - i as u32);
        }

        let err = limiter
            .check_at(LimitKind::Auth, "ip:10.0.0.1", start + Duration::from_secs(10))
            .await
            .unwrap_err();
        assert_eq!(err.limit, 5);
        assert_eq!(err.retry_after, 50);
        assert_eq!(err.to_string(), "Demasiadas solicitudes. Intente de nuevo en 50 segundos.");
    }

    #[tokio::test]
    async fn window_slides() {
        let limiter = RateLimiter::new(true);
        let start = Instant::now();
        for _ in 0..5 {
            limiter.check_at(LimitKind::Auth, "user:a", start).await.unwrap();
        }
        assert!(limiter.check_at(LimitKind::Auth, "user:a", start).await.is_err());
        assert!(limiter
            .check_at(LimitKind::Auth, "user:a", start + Duration::from_secs(61))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn kinds_and_identifiers_are_independent() {
        let limiter = RateLimiter::new(true);
        let now = Instant::now();
        for _ in 0..5 {
            limiter.check_at(LimitKind::Booking, "user:a", now).await.unwrap();
        }
        assert!(limiter.check_at(LimitKind::Booking, "user:a", now).await.is_err());
        assert!(limiter.check_at(LimitKind::Booking, "user:b", now).await.is_ok());
        assert!(limiter.check_at(LimitKind::Write, "user:a", now).await.is_ok());
    }

    #[tokio::test]
    async fn disabled_limiter_never_limits() {
        let limiter = RateLimiter::new(false);
        let now = Instant::now();
        for _ in 0..100 {
            assert!(limiter.check_at(LimitKind::Auth, "ip:x", now).await.is_ok());
        }
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[tokio::test]
    async fn cleanup_keeps_booking_history_for_the_full_hour() {
        let limiter = RateLimiter::new(true);
        let start = Instant::now();
        limiter.check_at(LimitKind::Write, "user:a", start).await.unwrap();
        limiter.check_at(LimitKind::Booking, "user:a", start).await.unwrap();

        let removed = limiter.cleanup_at(start + Duration::from_secs(11 * 60)).await;
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked_keys().await, 1);

        limiter.cleanup_at(start + Duration::from_secs(61 * 60)).await;
        assert_eq!(limiter.tracked_keys().await, 0);
    }

    #[test]
    fn identifier_prefers_user_then_forwarded_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identifier(&headers, None), "ip:unknown");

        headers.insert("x-real-ip", HeaderValue::from_static("10.1.1.1"));
        assert_eq!(client_identifier(&headers, None), "ip:10.1.1.1");

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.2"));
        assert_eq!(client_identifier(&headers, None), "ip:203.0.113.9");

        let user = uuid::Uuid::new_v4();
        assert_eq!(client_identifier(&headers, Some(user)), format!("user:{}", user));
    }

    #[test]
    fn key_format() {
        assert_eq!(RateLimiter::key(LimitKind::Search, "ip:1.2.3.4"), "ratelimit:search:ip:1.2.3.4");
    }
}
