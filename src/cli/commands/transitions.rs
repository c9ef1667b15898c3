use serde_json::json;

use crate::appointments::AppointmentStatus;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

pub async fn handle(output_format: OutputFormat) -> anyhow::Result<()> {
    match output_format {
        OutputFormat::Json => {
            let table: serde_json::Map<String, serde_json::Value> = AppointmentStatus::ALL
                .iter()
                .map(|status| (status.as_str().to_string(), json!(status.allowed_transitions())))
                .collect();
            output_success(output_format, "Appointment status transitions", Some(json!({ "transitions": table })))
        }
        OutputFormat::Text => {
            print!("{}", render_table());
            Ok(())
        }
    }
}

fn render_table() -> String {
    let mut out = format!("{:<12} {}\n", "FROM", "ALLOWED TO");
    for status in AppointmentStatus::ALL {
        let targets: Vec<&str> = status.allowed_transitions().iter().map(|s| s.as_str()).collect();
        let targets = if targets.is_empty() {
            "(terminal)".to_string()
        } else {
            targets.join(", ")
        };
        out.push_str(&format!("{:<12} {}\n", status.as_str(), targets));
    }
    out
}
