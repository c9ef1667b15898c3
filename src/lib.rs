pub mod app;
pub mod appointments;
pub mod auth;
pub mod cli;
pub mod config;
pub mod cron;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod monitoring;
pub mod rate_limit;
pub mod revalidate;

pub use app::{app, AppState};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default directives.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("vete_api=info,tower_http=info,audit=info"));

    // A second init (tests, CLI subcommands) is harmless
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
