use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use super::alerts::{Alert, AlertSeverity};
use crate::config::MonitoringConfig;

const RECENT_ERRORS_KEPT: usize = 10;

#[derive(Debug, Clone)]
struct EndpointWindow {
    endpoint: String,
    method: String,
    total_requests: u64,
    error_count: u64,
    window_start: Instant,
    recent_errors: Vec<u16>,
    alert_sent: bool,
}

impl EndpointWindow {
    fn new(method: &str, endpoint: String, now: Instant) -> Self {
        Self {
            endpoint,
            method: method.to_string(),
            total_requests: 0,
            error_count: 0,
            window_start: now,
            recent_errors: Vec::new(),
            alert_sent: false,
        }
    }

    fn error_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.error_count as f64 / self.total_requests as f64
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointHealth {
    Healthy,
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub endpoint: String,
    pub method: String,
    pub total_requests: u64,
    pub error_count: u64,
    pub error_rate: f64,
    pub status: EndpointHealth,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<u16>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryTotals {
    pub total_endpoints: usize,
    pub healthy_endpoints: usize,
    pub warning_endpoints: usize,
    pub critical_endpoints: usize,
    pub total_requests: u64,
    pub total_errors: u64,
    pub overall_error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorRateSummary {
    pub timestamp: DateTime<Utc>,
    pub endpoints: Vec<EndpointSummary>,
    pub totals: SummaryTotals,
}

/// Per-endpoint error ratios over a fixed window, keyed by `METHOD:normalized-path`
#[derive(Debug)]
pub struct ErrorRateTracker {
    threshold: f64,
    min_requests: u64,
    window: Duration,
    alerting_enabled: bool,
    windows: Mutex<HashMap<String, EndpointWindow>>,
}

impl ErrorRateTracker {
    pub fn new(config: &MonitoringConfig) -> Self {
        Self {
            threshold: config.error_rate_threshold,
            min_requests: config.min_requests_for_alert,
            window: Duration::from_secs(config.window_secs),
            alerting_enabled: config.alerting_enabled,
            windows: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn record(&self, method: &str, path: &str, status: u16) -> Option<Alert> {
        self.record_at(method, path, status, Instant::now())
    }

    /// Count one response. Returns the alert to deliver when this request
    /// pushes the window over the threshold for the first time.
    pub fn record_at(&self, method: &str, path: &str, status: u16, now: Instant) -> Option<Alert> {
        let method = method.to_uppercase();
        let endpoint = normalize_path(path);
        let key = format!("{}:{}", method, endpoint);

        let mut windows = self.windows.lock().ok()?;
        let window = windows
            .entry(key)
            .or_insert_with(|| EndpointWindow::new(&method, endpoint.clone(), now));
        if now.saturating_duration_since(window.window_start) > self.window {
            *window = EndpointWindow::new(&method, endpoint, now);
        }

        window.total_requests += 1;
        if status >= 400 {
            window.error_count += 1;
            window.recent_errors.push(status);
            if window.recent_errors.len() > RECENT_ERRORS_KEPT {
                window.recent_errors.remove(0);
            }
        }

        tracing::debug!(
            method = %window.method,
            endpoint = %window.endpoint,
            status,
            error_rate = window.error_rate(),
            total_requests = window.total_requests,
            "Request recorded for error rate tracking"
        );

        self.check_threshold(window)
    }

    fn check_threshold(&self, window: &mut EndpointWindow) -> Option<Alert> {
        let rate = window.error_rate();
        if !self.alerting_enabled
            || window.alert_sent
            || window.total_requests < self.min_requests
            || rate <= self.threshold
        {
            return None;
        }
        window.alert_sent = true;

        let severity = if rate > self.threshold * 2.0 {
            AlertSeverity::Critical
        } else {
            AlertSeverity::Error
        };
        let recent: Vec<String> = window.recent_errors.iter().map(|c| c.to_string()).collect();

        Some(Alert {
            kind: "high_error_rate",
            job: format!("API {} {}", window.method, window.endpoint),
            message: format!(
                "Tasa de error alta: {:.1}% ({}/{} requests)",
                rate * 100.0,
                window.error_count,
                window.total_requests
            ),
            details: json!({
                "endpoint": window.endpoint,
                "method": window.method,
                "error_rate": format!("{:.1}%", rate * 100.0),
                "error_count": window.error_count,
                "total_requests": window.total_requests,
                "recent_status_codes": recent.join(", "),
                "window_minutes": (self.window.as_secs() as f64 / 60.0).round() as u64,
                "threshold": format!("{:.0}%", self.threshold * 100.0),
            }),
            severity,
        })
    }

    pub fn summary(&self) -> ErrorRateSummary {
        self.summary_at(Instant::now())
    }

    pub fn summary_at(&self, now: Instant) -> ErrorRateSummary {
        let mut active: Vec<EndpointWindow> = self
            .windows
            .lock()
            .map(|windows| {
                windows
                    .values()
                    .filter(|w| now.saturating_duration_since(w.window_start) <= self.window)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        active.sort_by(|a, b| b.error_rate().total_cmp(&a.error_rate()));

        let endpoints: Vec<EndpointSummary> = active
            .iter()
            .map(|w| {
                let rate = w.error_rate();
                let status = if rate > self.threshold {
                    EndpointHealth::Critical
                } else if rate > self.threshold * 0.5 {
                    EndpointHealth::Warning
                } else {
                    EndpointHealth::Healthy
                };
                EndpointSummary {
                    endpoint: w.endpoint.clone(),
                    method: w.method.clone(),
                    total_requests: w.total_requests,
                    error_count: w.error_count,
                    error_rate: rate,
                    status,
                    last_error: w.recent_errors.last().copied(),
                }
            })
            .collect();

        let count = |health: EndpointHealth| endpoints.iter().filter(|e| e.status == health).count();
        let total_requests: u64 = endpoints.iter().map(|e| e.total_requests).sum();
        let total_errors: u64 = endpoints.iter().map(|e| e.error_count).sum();

        ErrorRateSummary {
            timestamp: Utc::now(),
            totals: SummaryTotals {
                total_endpoints: endpoints.len(),
                healthy_endpoints: count(EndpointHealth::Healthy),
                warning_endpoints: count(EndpointHealth::Warning),
                critical_endpoints: count(EndpointHealth::Critical),
                total_requests,
                total_errors,
                overall_error_rate: if total_requests > 0 {
                    total_errors as f64 / total_requests as f64
                } else {
                    0.0
                },
            },
            endpoints,
        }
    }

    /// Forget windows idle for two full windows
    pub fn prune_at(&self, now: Instant) -> usize {
        let Ok(mut windows) = self.windows.lock() else {
            return 0;
        };
        let before = windows.len();
        windows.retain(|_, w| now.saturating_duration_since(w.window_start) <= self.window * 2);
        before - windows.len()
    }

    pub fn reset(&self) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.clear();
        }
    }
}

/// Collapse id-like path segments so one route maps to one key.
/// Long alphanumeric segments count as ids only when they carry a digit.
pub fn normalize_path(path: &str) -> String {
    let path = path.split('?').next().unwrap_or_default();
    path.split('/')
        .map(|segment| if is_id_segment(segment) { ":id" } else { segment })
        .collect::<Vec<_>>()
        .join("/")
}

fn is_id_segment(segment: &str) -> bool {
    if segment.is_empty() {
        return false;
    }
    Uuid::parse_str(segment).is_ok()
        || segment.bytes().all(|b| b.is_ascii_digit())
        || (segment.len() >= 8
            && segment.bytes().all(|b| b.is_ascii_alphanumeric())
            && segment.bytes().any(|b| b.is_ascii_digit()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker() -> ErrorRateTracker {
        ErrorRateTracker::new(&MonitoringConfig {
            error_rate_threshold: 0.10,
            min_requests_for_alert: 10,
            window_secs: 300,
            alerting_enabled: true,
            alert_webhook_url: None,
        })
    }

    #[test]
    fn normalizes_id_segments() {
        assert_eq!(
            normalize_path("/api/appointments/6f1c2a4e-9d1b-4c3a-8f2e-1a2b3c4d5e6f/confirm"),
            "/api/appointments/:id/confirm"
        );
        assert_eq!(normalize_path("/api/pets/42?x=1"), "/api/pets/:id");
        assert_eq!(normalize_path("/api/clinic/abcd1234ef"), "/api/clinic/:id");
        assert_eq!(normalize_path("/api/appointments/status"), "/api/appointments/status");
    }

    #[test]
    fn alerts_once_per_window_above_threshold() {
        let tracker = tracker();
        let now = Instant::now();

        for _ in 0..7 {
            assert!(tracker.record_at("get", "/api/appointments", 200, now).is_none());
        }
        for _ in 0..2 {
            assert!(tracker.record_at("GET", "/api/appointments", 500, now).is_none());
        }
        // 10th request: 3/10 = 30% > 2 * 10%
        let alert = tracker.record_at("GET", "/api/appointments", 503, now).unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.job, "API GET /api/appointments");
        assert_eq!(alert.details["recent_status_codes"], json!("500, 500, 503"));

        assert!(tracker.record_at("GET", "/api/appointments", 500, now).is_none());
    }

    #[test]
    fn below_minimum_volume_never_alerts() {
        let tracker = tracker();
        let now = Instant::now();
        for _ in 0..9 {
            assert!(tracker.record_at("POST", "/api/appointments", 500, now).is_none());
        }
    }

    #[test]
    fn summary_classifies_endpoints() {
        let tracker = tracker();
        let now = Instant::now();
        for i in 0..20 {
            tracker.record_at("GET", "/health", 200, now);
            let status = if i < 2 { 404 } else { 200 };
            tracker.record_at("GET", "/api/portal/appointments", status, now);
            let status = if i < 10 { 500 } else { 200 };
            tracker.record_at("POST", "/api/appointments/status", status, now);
        }

        let summary = tracker.summary_at(now);
        assert_eq!(summary.totals.total_endpoints, 3);
        assert_eq!(summary.totals.healthy_endpoints, 1);
        assert_eq!(summary.totals.warning_endpoints, 1);
        assert_eq!(summary.totals.critical_endpoints, 1);
        assert_eq!(summary.totals.total_errors, 12);
        assert_eq!(summary.endpoints[0].endpoint, "/api/appointments/status");
        assert_eq!(summary.endpoints[0].last_error, Some(500));
    }

    #[test]
    fn windows_expire() {
        let tracker = tracker();
        let start = Instant::now();
        tracker.record_at("GET", "/health", 500, start);

        let later = start + Duration::from_secs(301);
        assert_eq!(tracker.summary_at(later).totals.total_endpoints, 0);

        assert_eq!(tracker.prune_at(later), 0);
        assert_eq!(tracker.prune_at(start + Duration::from_secs(601)), 1);
    }
}
