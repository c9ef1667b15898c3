use clap::Subcommand;
use serde_json::json;
use uuid::Uuid;

use crate::auth::{generate_jwt, Claims};
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::AppConfig;

#[derive(Subcommand)]
pub enum TokenCommands {
    #[command(about = "Mint a bearer token signed with AUTH_JWT_SECRET")]
    Issue {
        #[arg(long, help = "Auth user id (profiles.id)")]
        user: Uuid,
        #[arg(long, help = "Email claim")]
        email: Option<String>,
        #[arg(long, help = "Lifetime in hours (defaults to the configured expiry)")]
        hours: Option<u64>,
    },
}

pub async fn handle(cmd: TokenCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        TokenCommands::Issue { user, email, hours } => {
            let config = AppConfig::from_env();
            let hours = hours.unwrap_or(config.security.jwt_expiry_hours);
            let claims = Claims::new(user, email, hours);
            let token = generate_jwt(&config.security.jwt_secret, &claims)?;

            match output_format {
                OutputFormat::Json => output_success(
                    output_format,
                    "Token issued",
                    Some(json!({ "token": token, "expires_at": claims.exp })),
                ),
                OutputFormat::Text => {
                    println!("{}", token);
                    Ok(())
                }
            }
        }
    }
}
