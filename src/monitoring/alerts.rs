use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Warning,
    Error,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub job: String,
    pub message: String,
    pub details: Value,
    pub severity: AlertSeverity,
}

/// Delivers alerts to the configured webhook; without one they only reach the log
#[derive(Debug, Clone)]
pub struct AlertSender {
    client: reqwest::Client,
    webhook_url: Option<String>,
}

impl AlertSender {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { client, webhook_url }
    }

    pub async fn send(&self, alert: &Alert) {
        tracing::warn!(
            target: "alerts",
            kind = alert.kind,
            severity = ?alert.severity,
            job = %alert.job,
            "{}",
            alert.message
        );

        let Some(url) = &self.webhook_url else {
            return;
        };

        match self.client.post(url).json(alert).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                tracing::error!("Alert webhook returned {}", response.status());
            }
            Err(e) => {
                tracing::error!("Alert webhook failed: {}", e);
            }
        }
    }
}
