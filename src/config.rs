use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_DATABASE_URL: &str = "sqlite://procure_pay.db?mode=rwc";
const DEFAULT_INVOICE_NUMBER_PREFIX: &str = "SINV";
const DEFAULT_PAYMENT_REFERENCE_PREFIX: &str = "PAY";
const DEFAULT_REFERENCE_RETRY_BUDGET: u32 = 5;
const DEFAULT_IDEMPOTENCY_KEY_MAX_LEN: usize = 255;
const DEFAULT_AUDIT_TIMEOUT_MS: u64 = 500;
const DEFAULT_DISPATCH_TIMEOUT_MS: u64 = 5_000;

/// Settings of the procurement-to-pay engine itself.
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProcurementConfig {
    /// Prefix of sequential supplier invoice numbers (`<PREFIX>-<YEAR>-<SEQ>`)
    #[serde(default = "default_invoice_number_prefix")]
    #[validate(length(min = 1, max = 16), custom = "validate_prefix")]
    pub invoice_number_prefix: String,

    /// Prefix of generated supplier payment references
    #[serde(default = "default_payment_reference_prefix")]
    #[validate(length(min = 1, max = 16), custom = "validate_prefix")]
    pub payment_reference_prefix: String,

    /// Random payment references tried before falling back to a timestamp tag
    #[serde(default = "default_reference_retry_budget")]
    #[validate(range(min = 1, max = 20))]
    pub reference_retry_budget: u32,

    /// Longest accepted client idempotency key
    #[serde(default = "default_idempotency_key_max_len")]
    #[validate(range(min = 16, max = 1024))]
    pub idempotency_key_max_len: usize,

    /// Upper bound on a single audit sink delivery
    #[serde(default = "default_audit_timeout_ms")]
    #[validate(range(min = 1))]
    pub audit_timeout_ms: u64,

    /// Upper bound on a single document dispatch (render + send)
    #[serde(default = "default_dispatch_timeout_ms")]
    #[validate(range(min = 1))]
    pub dispatch_timeout_ms: u64,
}

impl Default for ProcurementConfig {
    fn default() -> Self {
        Self {
            invoice_number_prefix: default_invoice_number_prefix(),
            payment_reference_prefix: default_payment_reference_prefix(),
            reference_retry_budget: default_reference_retry_budget(),
            idempotency_key_max_len: default_idempotency_key_max_len(),
            audit_timeout_ms: default_audit_timeout_ms(),
            dispatch_timeout_ms: default_dispatch_timeout_ms(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    #[validate(length(min = 1))]
    pub database_url: String,

    /// Maximum number of pooled connections
    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 1000))]
    pub db_max_connections: u32,

    /// Minimum number of pooled connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    #[serde(default)]
    #[validate]
    pub procurement: ProcurementConfig,
}

impl AppConfig {
    /// Builds a configuration for the given database with every other setting at its default.
    pub fn new(database_url: String, environment: String) -> Self {
        Self {
            database_url,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            procurement: ProcurementConfig::default(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Checks relationships between fields that the derive cannot express.
    pub fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("min_exceeds_max");
            err.message = Some("db_min_connections must not exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.is_production() && self.database_url.starts_with("sqlite:") {
            let mut err = ValidationError::new("sqlite_in_production");
            err.message = Some("production deployments require PostgreSQL".into());
            errors.add("database_url", err);
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

fn validate_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        Ok(())
    } else {
        let mut err = ValidationError::new("invalid_prefix");
        err.message = Some("prefix must contain only A-Z and 0-9".into());
        Err(err)
    }
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_min_connections() -> u32 {
    1
}

fn default_db_connect_timeout_secs() -> u64 {
    30
}

fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_db_idle_timeout_secs() -> u64 {
    600
}

fn default_invoice_number_prefix() -> String {
    DEFAULT_INVOICE_NUMBER_PREFIX.to_string()
}

fn default_payment_reference_prefix() -> String {
    DEFAULT_PAYMENT_REFERENCE_PREFIX.to_string()
}

fn default_reference_retry_budget() -> u32 {
    DEFAULT_REFERENCE_RETRY_BUDGET
}

fn default_idempotency_key_max_len() -> usize {
    DEFAULT_IDEMPOTENCY_KEY_MAX_LEN
}

fn default_audit_timeout_ms() -> u64 {
    DEFAULT_AUDIT_TIMEOUT_MS
}

fn default_dispatch_timeout_ms() -> u64 {
    DEFAULT_DISPATCH_TIMEOUT_MS
}

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration load error: {0}")]
    Load(#[from] ConfigError),
    #[error("Configuration validation error: {0}")]
    Validation(#[from] ValidationErrors),
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("procure_pay={},sea_orm=warn,sqlx=warn", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let filter = EnvFilter::new(filter_directive);
    if json {
        let _ = fmt().with_env_filter(filter).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("database_url", DEFAULT_DATABASE_URL)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    app_config.validate_additional_constraints().map_err(|e| {
        error!("Configuration constraint validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        assert!(cfg.validate().is_ok());
        assert!(cfg.validate_additional_constraints().is_ok());
        assert_eq!(cfg.procurement.invoice_number_prefix, "SINV");
        assert_eq!(cfg.procurement.reference_retry_budget, 5);
    }

    #[test]
    fn lowercase_prefix_is_rejected() {
        let mut cfg = AppConfig::new("sqlite::memory:".into(), "test".into());
        cfg.procurement.invoice_number_prefix = "sinv".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn sqlite_is_rejected_in_production() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "production".into());
        let errors = cfg.validate_additional_constraints().unwrap_err();
        assert!(errors.field_errors().contains_key("database_url"));
    }

    #[test]
    fn min_connections_cannot_exceed_max() {
        let mut cfg = AppConfig::new("postgres://localhost/p2p".into(), "test".into());
        cfg.db_min_connections = 20;
        cfg.db_max_connections = 5;
        assert!(cfg.validate_additional_constraints().is_err());
    }
}
