//! Error-rate tracking for every HTTP response, with threshold alerts.

pub mod alerts;
pub mod error_rate;

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

pub use alerts::{Alert, AlertSender, AlertSeverity};
pub use error_rate::{normalize_path, EndpointHealth, ErrorRateSummary, ErrorRateTracker};

use crate::app::AppState;

/// Tracker plus the channel its alerts leave through
#[derive(Debug, Clone)]
pub struct Monitor {
    pub tracker: Arc<ErrorRateTracker>,
    pub alerts: AlertSender,
}

impl Monitor {
    pub fn new(config: &crate::config::MonitoringConfig) -> Self {
        Self {
            tracker: Arc::new(ErrorRateTracker::new(config)),
            alerts: AlertSender::new(config.alert_webhook_url.clone()),
        }
    }

    pub fn record(&self, method: &str, path: &str, status: u16) {
        if let Some(alert) = self.tracker.record(method, path, status) {
            let sender = self.alerts.clone();
            tokio::spawn(async move {
                sender.send(&alert).await;
            });
        }
    }

    pub fn spawn_cleanup(&self) -> tokio::task::JoinHandle<()> {
        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tracker.window().max(std::time::Duration::from_secs(1)));
            loop {
                interval.tick().await;
                let removed = tracker.prune_at(Instant::now());
                if removed > 0 {
                    tracing::debug!(removed, "Expired error-rate windows dropped");
                }
            }
        })
    }
}

pub async fn error_rate_middleware(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;
    state.monitor.record(&method, &path, response.status().as_u16());
    response
}
