use std::sync::Arc;

use chrono::Utc;
use clap::Subcommand;

use crate::app::AppState;
use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config::AppConfig;
use crate::cron::run_no_show_sweep;
use crate::database::DatabaseManager;
use crate::revalidate::TracingRevalidator;

#[derive(Subcommand)]
pub enum SweepCommands {
    #[command(about = "Mark overdue confirmed appointments as no-show")]
    NoShows,
}

pub async fn handle(cmd: SweepCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SweepCommands::NoShows => {
            let config = AppConfig::from_env();
            let store = DatabaseManager::open_store(&config.database).await?;
            let state = AppState::new(config, store, Arc::new(TracingRevalidator));

            let report = run_no_show_sweep(&state.appointments, &state.config.lifecycle, Utc::now()).await?;
            for failure in &report.errors {
                tracing::warn!("{}: {}", failure.appointment_id, failure.error);
            }

            if !report.success {
                output_error(output_format, &report.message, Some("SWEEP_FAILED"))?;
                anyhow::bail!("{} of {} appointments could not be marked", report.stats.failed, report.stats.total);
            }

            output_success(output_format, &report.message, Some(serde_json::to_value(&report.stats)?))
        }
    }
}
