pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Parser)]
#[command(name = "vete")]
#[command(about = "vete - operator tooling for the appointment lifecycle API")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Bearer token helpers for local testing")]
    Token {
        #[command(subcommand)]
        cmd: commands::token::TokenCommands,
    },

    #[command(about = "Print the appointment status transition table")]
    Transitions,

    #[command(about = "Run scheduled sweeps once against the configured store")]
    Sweep {
        #[command(subcommand)]
        cmd: commands::sweep::SweepCommands,
    },

    #[command(about = "Check a running server's /health endpoint")]
    Ping {
        #[arg(long, help = "Server base URL (defaults to http://<VETE_API_HOST>:<VETE_API_PORT>)")]
        url: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Token { cmd } => commands::token::handle(cmd, output_format).await,
        Commands::Transitions => commands::transitions::handle(output_format).await,
        Commands::Sweep { cmd } => commands::sweep::handle(cmd, output_format).await,
        Commands::Ping { url } => commands::ping::handle(url, output_format).await,
    }
}
