//! Cache-invalidation signals emitted after lifecycle writes.

use std::sync::Mutex;

/// Receiver of `revalidate` signals keyed by tenant and route
pub trait Revalidator: Send + Sync {
    fn revalidate(&self, tenant_id: &str, path: &str);
}

/// Emits each signal as a tracing event for the front-end cache to pick up
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRevalidator;

impl Revalidator for TracingRevalidator {
    fn revalidate(&self, tenant_id: &str, path: &str) {
        tracing::debug!(target: "revalidate", tenant = tenant_id, path, "revalidate");
    }
}

/// Keeps every signal in memory
#[derive(Debug, Default)]
pub struct RecordingRevalidator {
    signals: Mutex<Vec<(String, String)>>,
}

impl RecordingRevalidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<(String, String)> {
        self.signals.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl Revalidator for RecordingRevalidator {
    fn revalidate(&self, tenant_id: &str, path: &str) {
        if let Ok(mut signals) = self.signals.lock() {
            signals.push((tenant_id.to_string(), path.to_string()));
        }
    }
}

/// Views that show an appointment: the clinic schedule and the client's portal
pub fn appointment_paths(tenant_id: &str) -> [String; 3] {
    [
        format!("/{}/dashboard/appointments", tenant_id),
        format!("/{}/portal/appointments", tenant_id),
        format!("/{}/portal/dashboard", tenant_id),
    ]
}
