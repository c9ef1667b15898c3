use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub monitoring: MonitoringConfig,
    pub lifecycle: LifecycleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub backend: StoreBackend,
    #[serde(skip_serializing)]
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
    pub enable_slow_query_warning: bool,
    pub slow_query_threshold_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_request_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(skip_serializing)]
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    #[serde(skip_serializing)]
    pub cron_secret: Option<String>,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Error rate (0-1) above which an endpoint is critical and alerts fire
    pub error_rate_threshold: f64,
    pub min_requests_for_alert: u64,
    pub window_secs: u64,
    pub alerting_enabled: bool,
    pub alert_webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Minutes after start before a confirmed appointment counts as a no-show
    pub no_show_grace_minutes: u32,
    pub sweep_batch_size: u32,
    pub sweep_concurrency: usize,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("VETE_API_HOST") {
            self.server.host = v;
        }
        if let Some(port) = env::var("VETE_API_PORT")
            .ok()
            .or_else(|| env::var("PORT").ok())
            .and_then(|s| s.parse::<u16>().ok())
        {
            self.server.port = port;
        }

        // Database overrides
        match env::var("VETE_STORE").as_deref() {
            Ok("memory") => self.database.backend = StoreBackend::Memory,
            Ok("postgres") => self.database.backend = StoreBackend::Postgres,
            _ => {}
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }
        if let Ok(v) = env::var("DATABASE_ENABLE_SLOW_QUERY_WARNING") {
            self.database.enable_slow_query_warning = v.parse().unwrap_or(self.database.enable_slow_query_warning);
        }
        if let Ok(v) = env::var("DATABASE_SLOW_QUERY_THRESHOLD_MS") {
            self.database.slow_query_threshold_ms = v.parse().unwrap_or(self.database.slow_query_threshold_ms);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Ok(v) = env::var("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("CRON_SECRET") {
            self.security.cron_secret = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        // Monitoring overrides
        if let Ok(v) = env::var("MONITORING_ERROR_RATE_THRESHOLD") {
            self.monitoring.error_rate_threshold = v.parse().unwrap_or(self.monitoring.error_rate_threshold);
        }
        if let Ok(v) = env::var("MONITORING_MIN_REQUESTS_FOR_ALERT") {
            self.monitoring.min_requests_for_alert = v.parse().unwrap_or(self.monitoring.min_requests_for_alert);
        }
        if let Ok(v) = env::var("MONITORING_WINDOW_SECS") {
            self.monitoring.window_secs = v.parse().unwrap_or(self.monitoring.window_secs);
        }
        if let Ok(v) = env::var("MONITORING_ALERTING_ENABLED") {
            self.monitoring.alerting_enabled = v.parse().unwrap_or(self.monitoring.alerting_enabled);
        }
        if let Ok(v) = env::var("MONITORING_ALERT_WEBHOOK_URL") {
            self.monitoring.alert_webhook_url = Some(v).filter(|s| !s.trim().is_empty());
        }

        // Lifecycle overrides
        if let Ok(v) = env::var("LIFECYCLE_NO_SHOW_GRACE_MINUTES") {
            match parse_grace_minutes(&v) {
                Some(minutes) => self.lifecycle.no_show_grace_minutes = minutes,
                None => tracing::warn!(
                    value = %v,
                    "Ignoring LIFECYCLE_NO_SHOW_GRACE_MINUTES; expected a non-negative number of minutes"
                ),
            }
        }
        if let Ok(v) = env::var("LIFECYCLE_SWEEP_BATCH_SIZE") {
            self.lifecycle.sweep_batch_size = v.parse().unwrap_or(self.lifecycle.sweep_batch_size);
        }
        if let Ok(v) = env::var("LIFECYCLE_SWEEP_CONCURRENCY") {
            self.lifecycle.sweep_concurrency = v.parse().unwrap_or(self.lifecycle.sweep_concurrency);
        }

        self
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 100,
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                default_page_size: 50,
                max_page_size: 1000,
                max_request_size_bytes: 1024 * 1024, // 1MB
            },
            security: SecurityConfig {
                jwt_secret: "dev-secret-change-me".to_string(),
                jwt_expiry_hours: 24 * 7, // 1 week
                cron_secret: None,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string()],
                enable_audit_logging: true,
            },
            monitoring: MonitoringConfig {
                error_rate_threshold: 0.10,
                min_requests_for_alert: 10,
                window_secs: 5 * 60,
                alerting_enabled: false,
                alert_webhook_url: None,
            },
            lifecycle: LifecycleConfig {
                no_show_grace_minutes: 30,
                sweep_batch_size: 200,
                sweep_concurrency: 5,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::development();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.database.run_migrations = true;
        config.database.slow_query_threshold_ms = 500;
        config.api.enable_rate_limiting = true;
        config.api.max_page_size = 500;
        config.security.jwt_secret = String::new();
        config.security.jwt_expiry_hours = 24;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config.monitoring.alerting_enabled = true;
        config
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                backend: StoreBackend::Postgres,
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: false,
                enable_slow_query_warning: true,
                slow_query_threshold_ms: 500,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                default_page_size: 50,
                max_page_size: 100,
                max_request_size_bytes: 256 * 1024,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 4,
                cron_secret: None,
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                enable_audit_logging: true,
            },
            monitoring: MonitoringConfig {
                error_rate_threshold: 0.10,
                min_requests_for_alert: 10,
                window_secs: 5 * 60,
                alerting_enabled: true,
                alert_webhook_url: None,
            },
            lifecycle: LifecycleConfig {
                no_show_grace_minutes: 30,
                sweep_batch_size: 200,
                sweep_concurrency: 5,
            },
        }
    }

    /// Clamp a requested page size into `1..=max_page_size`
    pub fn page_size(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.api.default_page_size)
            .clamp(1, self.api.max_page_size.max(1))
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment, Environment::Production)
    }
}

/// Grace periods are whole, non-negative minutes
fn parse_grace_minutes(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_minutes_must_be_non_negative() {
        assert_eq!(parse_grace_minutes(" 45 "), Some(45));
        assert_eq!(parse_grace_minutes("0"), Some(0));
        assert_eq!(parse_grace_minutes("-60"), None);
        assert_eq!(parse_grace_minutes("9223372036854775807"), None);
        assert_eq!(parse_grace_minutes("soon"), None);
    }

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert!(!config.api.enable_rate_limiting);
        assert_eq!(config.api.max_page_size, 1000);
        assert_eq!(config.lifecycle.no_show_grace_minutes, 30);
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert!(config.api.enable_rate_limiting);
        assert_eq!(config.api.max_page_size, 100);
        assert!(config.security.jwt_secret.is_empty());
        assert!(config.is_production());
    }

    #[test]
    fn page_size_is_clamped() {
        let config = AppConfig::production();
        assert_eq!(config.page_size(None), 50);
        assert_eq!(config.page_size(Some(0)), 1);
        assert_eq!(config.page_size(Some(5000)), 100);
    }
}
