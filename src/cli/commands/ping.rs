use std::time::{Duration, Instant};

use serde_json::{json, Value};

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;

pub async fn handle(url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| {
        let config = AppConfig::from_env();
        format!("http://{}:{}", config.server.host, config.server.port)
    });
    let endpoint = format!("{}/health", base.trim_end_matches('/'));

    let client = reqwest::Client::builder().timeout(Duration::from_secs(5)).build()?;
    let started = Instant::now();

    let response = match client.get(&endpoint).send().await {
        Ok(response) => response,
        Err(e) => {
            output_error(output_format, &format!("{} unreachable: {}", endpoint, e), Some("UNREACHABLE"))?;
            anyhow::bail!("server unreachable");
        }
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    let elapsed_ms = started.elapsed().as_millis() as u64;

    if status.is_success() {
        output_success(
            output_format,
            &format!("{} healthy ({} ms)", base, elapsed_ms),
            Some(json!({ "status": status.as_u16(), "elapsed_ms": elapsed_ms, "health": body })),
        )
    } else {
        output_error(output_format, &format!("{} returned {}", endpoint, status), Some("UNHEALTHY"))?;
        anyhow::bail!("server unhealthy")
    }
}
