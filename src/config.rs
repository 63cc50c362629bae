use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError, ValidationErrors};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_PAGE_SIZE: u64 = 10;
const DEFAULT_MAX_PAGE_SIZE: u64 = 100;
const DEV_DEFAULT_JWT_SECRET: &str =
    "development-only-secret-for-bengkel-inventory-do-not-deploy-1234567890";

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL (postgres:// or sqlite://)
    #[validate(length(min = 1))]
    pub database_url: String,

    /// HMAC secret used to sign identity tokens
    #[validate(length(min = 32), custom = "validate_jwt_secret")]
    pub jwt_secret: String,

    /// Token lifetime in seconds (5min - 7d)
    #[validate(range(min = 300, max = 604800))]
    pub jwt_expiration: u64,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

    /// Server host address
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment (development, test, staging, production)
    #[validate(length(min = 1))]
    pub environment: String,

    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Allow permissive CORS outside development
    #[serde(default)]
    pub cors_allow_any_origin: bool,

    #[serde(default = "default_db_max_connections")]
    #[validate(range(min = 1, max = 200))]
    pub db_max_connections: u32,

    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,

    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,

    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Page size used when a list request omits or zeroes `limit`
    #[serde(default = "default_page_size")]
    #[validate(range(min = 1))]
    pub default_page_size: u64,

    /// Upper bound applied to client supplied `limit`
    #[serde(default = "default_max_page_size")]
    #[validate(range(min = 1, max = 1000))]
    pub max_page_size: u64,

    /// Per-request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Admin account created at startup when no user owns this email
    #[serde(default)]
    pub bootstrap_admin_email: Option<String>,

    #[serde(default)]
    pub bootstrap_admin_password: Option<String>,

    #[serde(default = "default_bootstrap_admin_name")]
    pub bootstrap_admin_name: String,
}

impl AppConfig {
    /// Builds a config with defaults for every optional setting.
    pub fn new(
        database_url: String,
        jwt_secret: String,
        jwt_expiration: u64,
        host: String,
        port: u16,
        environment: String,
    ) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            cors_allow_any_origin: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
            request_timeout_secs: default_request_timeout_secs(),
            bootstrap_admin_email: None,
            bootstrap_admin_password: None,
            bootstrap_admin_name: default_bootstrap_admin_name(),
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn is_development(&self) -> bool {
        matches!(
            self.environment.to_ascii_lowercase().as_str(),
            "development" | "dev" | "test"
        )
    }

    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_deref()
            .map(|raw| raw.split(',').any(|o| !o.trim().is_empty()))
            .unwrap_or(false)
    }

    pub fn should_allow_permissive_cors(&self) -> bool {
        self.is_development() || self.cors_allow_any_origin
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Bootstrap admin credentials, if both email and password are configured
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.bootstrap_admin_email, &self.bootstrap_admin_password) {
            (Some(email), Some(password)) if !email.trim().is_empty() => {
                Some((email.as_str(), password.as_str()))
            }
            _ => None,
        }
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if !self.should_allow_permissive_cors() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some(
                "Set APP__CORS_ALLOWED_ORIGINS for non-development environments or explicitly opt-in via APP__CORS_ALLOW_ANY_ORIGIN=true".into(),
            );
            errors.add("cors_allowed_origins", err);
        }

        if !self.is_development() && self.jwt_secret.trim() == DEV_DEFAULT_JWT_SECRET {
            let mut err = ValidationError::new("jwt_secret_default_dev");
            err.message = Some(
                "The bundled development JWT secret must not be used outside development. Set APP__JWT_SECRET to a unique, secure value."
                    .into(),
            );
            errors.add("jwt_secret", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if self.default_page_size > self.max_page_size {
            let mut err = ValidationError::new("default_page_size");
            err.message = Some("default_page_size cannot exceed max_page_size".into());
            errors.add("default_page_size", err);
        }

        if self.bootstrap_admin_email.is_some() != self.bootstrap_admin_password.is_some() {
            let mut err = ValidationError::new("bootstrap_admin");
            err.message = Some(
                "bootstrap_admin_email and bootstrap_admin_password must be set together".into(),
            );
            errors.add("bootstrap_admin_email", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Runs derive-based and cross-field validation.
    pub fn validate_all(&self) -> Result<(), ValidationErrors> {
        self.validate()?;
        self.validate_additional_constraints()
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_auth_issuer() -> String {
    "bengkel-inventory".to_string()
}

fn default_auth_audience() -> String {
    "bengkel-inventory-api".to_string()
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
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

fn default_page_size() -> u64 {
    DEFAULT_PAGE_SIZE
}

fn default_max_page_size() -> u64 {
    DEFAULT_MAX_PAGE_SIZE
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_bootstrap_admin_name() -> String {
    "Administrator".to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_jwt_secret(secret: &str) -> Result<(), ValidationError> {
    let trimmed = secret.trim();

    if trimmed.len() < 32 {
        let mut err = ValidationError::new("jwt_secret");
        err.message = Some("JWT secret must be at least 32 characters".into());
        return Err(err);
    }

    if let Some(first) = trimmed.chars().next() {
        if trimmed.chars().all(|c| c == first) {
            let mut err = ValidationError::new("jwt_secret");
            err.message = Some("JWT secret cannot be a repeated character sequence".into());
            return Err(err);
        }
    }

    let unique_chars: std::collections::HashSet<char> = trimmed.chars().collect();
    if unique_chars.len() < 10 {
        let mut err = ValidationError::new("jwt_secret");
        err.message =
            Some("JWT secret must have at least 10 unique characters for adequate entropy".into());
        return Err(err);
    }

    Ok(())
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("bengkel_inventory={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    let builder = fmt().with_env_filter(EnvFilter::new(filter_directive));
    if json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
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
    load_config_from(Path::new(CONFIG_DIR))
}

/// Same as [`load_config`] but reads files from `config_dir`.
pub fn load_config_from(config_dir: &Path) -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            config_dir.display()
        );
    }

    let mut builder = Config::builder()
        .set_default("database_url", "sqlite://bengkel.db?mode=rwc")?
        .set_default("jwt_expiration", 86_400)?
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT)?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(&run_env)).required(false));

    // The bundled secret only exists so `cargo run` works out of the box; validation
    // rejects it everywhere else.
    if run_env == DEFAULT_ENV {
        builder = builder.set_default("jwt_secret", DEV_DEFAULT_JWT_SECRET)?;
    }

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    if config.get_string("jwt_secret").is_err() {
        error!("JWT secret is not configured. Set APP__JWT_SECRET to a random string of at least 32 characters.");
        return Err(AppConfigError::Load(ConfigError::NotFound(
            "jwt_secret is required but not configured. Set APP__JWT_SECRET environment variable."
                .into(),
        )));
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate_all().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
