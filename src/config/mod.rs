//! Configuration management for Tenantry Core

use anyhow::{Context, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server host
    pub http_host: String,
    /// HTTP server port
    pub http_port: u16,
    /// Database configuration
    pub database: DatabaseConfig,
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Tenant resolution policy
    pub tenancy: TenancyConfig,
    /// Subscription provisioning defaults
    pub subscription: SubscriptionConfig,
    /// SMS ledger mutation settings
    pub ledger: LedgerConfig,
    /// Logging and metrics
    pub telemetry: TelemetryConfig,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub access_token_ttl_secs: i64,
}

#[derive(Debug, Clone)]
pub struct TenancyConfig {
    /// Let superusers and staff pick any tenant through the selector
    pub admin_bypass: bool,
    /// Request header carrying an explicit tenant selector
    pub selector_header: String,
    /// Cookie carrying the session key whose stored selector is consulted
    pub session_cookie: String,
}

impl Default for TenancyConfig {
    fn default() -> Self {
        Self {
            admin_bypass: true,
            selector_header: "x-tenant-id".to_string(),
            session_cookie: "sessionid".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    /// Length of the trial granted at tenant creation
    pub trial_days: i64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self { trial_days: 14 }
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Attempts made for a ledger mutation before a conflict is surfaced
    pub max_retries: u32,
    /// Base delay between attempts, multiplied by the attempt number
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_backoff_ms: 25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// "json" or "pretty"
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_format: "pretty".to_string(),
            metrics_enabled: true,
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|s| matches!(s.to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let tenancy_defaults = TenancyConfig::default();
        let ledger_defaults = LedgerConfig::default();

        Ok(Self {
            http_host: env::var("HTTP_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("HTTP_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid HTTP_PORT")?,
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").context("DATABASE_URL is required")?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .unwrap_or_else(|_| "2".to_string())
                    .parse()
                    .unwrap_or(2),
            },
            jwt: JwtConfig {
                secret: env::var("JWT_SECRET").context("JWT_SECRET is required")?,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "tenantry".to_string()),
                access_token_ttl_secs: env::var("JWT_ACCESS_TOKEN_TTL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            tenancy: TenancyConfig {
                admin_bypass: env_flag("TENANCY_ADMIN_BYPASS", tenancy_defaults.admin_bypass),
                selector_header: env::var("TENANCY_SELECTOR_HEADER")
                    .map(|s| s.to_lowercase())
                    .unwrap_or(tenancy_defaults.selector_header),
                session_cookie: env::var("TENANCY_SESSION_COOKIE")
                    .unwrap_or(tenancy_defaults.session_cookie),
            },
            subscription: SubscriptionConfig {
                trial_days: env::var("SUBSCRIPTION_TRIAL_DAYS")
                    .unwrap_or_else(|_| "14".to_string())
                    .parse()
                    .context("Invalid SUBSCRIPTION_TRIAL_DAYS")?,
            },
            ledger: LedgerConfig {
                max_retries: env::var("LEDGER_MAX_RETRIES")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(ledger_defaults.max_retries)
                    .max(1),
                retry_backoff_ms: env::var("LEDGER_RETRY_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(ledger_defaults.retry_backoff_ms),
            },
            telemetry: TelemetryConfig {
                log_format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
                metrics_enabled: env_flag("METRICS_ENABLED", true),
            },
        })
    }

    /// Get HTTP server address
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http_host, self.http_port)
    }
}
