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
const DEFAULT_CURRENCY: &str = "ARS";
const DEFAULT_CATALOG_PAGE_SIZE: u64 = 12;
const DEFAULT_STOCK_ALERT_POLL_SECS: u64 = 300;
const DEFAULT_DISCOUNT_PRIORITY: &str = "product,category,customer,global";

const DEFAULT_WHATSAPP_PHONE: &str = "5491155550000";
const DEFAULT_WHATSAPP_HANDLE: &str = "@materialesya";
const DEFAULT_CONTACT_EMAIL: &str = "ventas@materialesya.com.ar";
const DEFAULT_CONTACT_ADDRESS: &str = "Av. San Martín 1234, Buenos Aires";
const DEFAULT_MAP_LAT: f64 = -34.6037;
const DEFAULT_MAP_LNG: f64 = -58.3816;

/// Public contact details shown on the storefront and used for the WhatsApp handoff.
///
/// Every field falls back to a built-in default when it is not configured.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContactConfig {
    /// Phone number used for the `wa.me` deep link (any formatting, digits are extracted)
    #[serde(default = "default_whatsapp_phone")]
    pub whatsapp_phone: String,

    #[serde(default = "default_whatsapp_handle")]
    pub whatsapp_handle: String,

    #[serde(default = "default_contact_email")]
    pub email: String,

    #[serde(default = "default_contact_address")]
    pub address: String,

    #[serde(default = "default_map_lat")]
    pub map_lat: f64,

    #[serde(default = "default_map_lng")]
    pub map_lng: f64,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            whatsapp_phone: default_whatsapp_phone(),
            whatsapp_handle: default_whatsapp_handle(),
            email: default_contact_email(),
            address: default_contact_address(),
            map_lat: default_map_lat(),
            map_lng: default_map_lng(),
        }
    }
}

impl ContactConfig {
    /// Digits of the WhatsApp phone number, as required by `wa.me` links
    pub fn whatsapp_digits(&self) -> String {
        self.whatsapp_phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect()
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
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

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Polling period of the stock alert monitor, 0 disables it
    #[serde(default = "default_stock_alert_poll_secs")]
    pub stock_alert_poll_secs: u64,

    /// Products per catalog page
    #[serde(default = "default_catalog_page_size")]
    #[validate(range(min = 1, max = 200))]
    pub catalog_page_size: u64,

    /// Currency code shown on orders
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub currency: String,

    /// Discount scopes from most to least specific; the first matching discount wins
    #[serde(default = "default_discount_priority")]
    #[validate(custom = "validate_discount_priority")]
    pub discount_priority: String,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(range(min = 1))]
    pub event_channel_capacity: usize,

    /// Directory for storefront session files; sessions stay in memory when unset
    #[serde(default)]
    pub session_dir: Option<String>,

    /// Storefront contact details
    #[serde(default)]
    pub contact: ContactConfig,
}

impl AppConfig {
    /// Creates a new configuration with defaults for everything but the essentials
    pub fn new(database_url: String, host: String, port: u16, environment: String) -> Self {
        Self {
            database_url,
            host,
            port,
            environment,
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            stock_alert_poll_secs: default_stock_alert_poll_secs(),
            catalog_page_size: default_catalog_page_size(),
            currency: default_currency(),
            discount_priority: default_discount_priority(),
            event_channel_capacity: default_event_channel_capacity(),
            session_dir: None,
            contact: ContactConfig::default(),
        }
    }

    /// Gets database URL reference
    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    /// Checks if running in production environment
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Checks if running in development environment
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Returns true if explicit CORS origins are configured
    pub fn has_cors_allowed_origins(&self) -> bool {
        self.cors_allowed_origins
            .as_ref()
            .map(|raw| raw.split(',').any(|origin| !origin.trim().is_empty()))
            .unwrap_or(false)
    }

    /// Discount specificity order parsed from `discount_priority`
    pub fn discount_policy(
        &self,
    ) -> Result<crate::services::pricing::DiscountPolicy, crate::errors::ServiceError> {
        crate::services::pricing::DiscountPolicy::parse(&self.discount_priority)
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    /// Whether the backing store is configured at all.
    ///
    /// A blank URL means the backend credentials are missing; callers short-circuit
    /// with a configuration error instead of attempting a connection.
    pub fn ensure_backend_configured(&self) -> Result<(), crate::errors::ServiceError> {
        if self.database_url.trim().is_empty() {
            return Err(crate::errors::ServiceError::Configuration(
                "database_url is not set; configure APP__DATABASE_URL".to_string(),
            ));
        }
        Ok(())
    }

    fn validate_additional_constraints(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.is_production() && !self.has_cors_allowed_origins() {
            let mut err = ValidationError::new("cors_allowed_origins_required");
            err.message = Some("Set APP__CORS_ALLOWED_ORIGINS in production".into());
            errors.add("cors_allowed_origins", err);
        }

        if self.db_min_connections > self.db_max_connections {
            let mut err = ValidationError::new("db_min_connections");
            err.message = Some("db_min_connections cannot exceed db_max_connections".into());
            errors.add("db_min_connections", err);
        }

        if errors.errors().is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
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

fn default_stock_alert_poll_secs() -> u64 {
    DEFAULT_STOCK_ALERT_POLL_SECS
}

fn default_catalog_page_size() -> u64 {
    DEFAULT_CATALOG_PAGE_SIZE
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_discount_priority() -> String {
    DEFAULT_DISCOUNT_PRIORITY.to_string()
}

fn default_event_channel_capacity() -> usize {
    1024
}

fn default_whatsapp_phone() -> String {
    DEFAULT_WHATSAPP_PHONE.to_string()
}
fn default_whatsapp_handle() -> String {
    DEFAULT_WHATSAPP_HANDLE.to_string()
}
fn default_contact_email() -> String {
    DEFAULT_CONTACT_EMAIL.to_string()
}
fn default_contact_address() -> String {
    DEFAULT_CONTACT_ADDRESS.to_string()
}
fn default_map_lat() -> f64 {
    DEFAULT_MAP_LAT
}
fn default_map_lng() -> f64 {
    DEFAULT_MAP_LNG
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

fn validate_discount_priority(raw: &str) -> Result<(), ValidationError> {
    crate::services::pricing::DiscountPolicy::parse(raw)
        .map(|_| ())
        .map_err(|e| {
            let mut err = ValidationError::new("discount_priority");
            err.message = Some(e.to_string().into());
            err
        })
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let default_directive = format!("materialesya_api={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .json()
            .try_init();
    } else {
        let _ = fmt()
            .with_env_filter(EnvFilter::new(filter_directive))
            .try_init();
    }
}

/// Loads configuration from built-in defaults, `config/` files and `APP__*` env vars
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    load_config_from(Path::new(CONFIG_DIR), &run_env)
}

/// Same as [`load_config`] but with an explicit config directory and profile
pub fn load_config_from(config_dir: &Path, run_env: &str) -> Result<AppConfig, AppConfigError> {
    if !config_dir.exists() {
        info!(
            "Config directory '{}' not found; using built-in defaults and environment",
            config_dir.display()
        );
    }

    let config = Config::builder()
        .set_default("database_url", "sqlite://materialesya.db?mode=rwc")?
        .set_default("host", "0.0.0.0")?
        .set_default("port", i64::from(DEFAULT_PORT))?
        .set_default("environment", run_env)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::from(config_dir.join("default")).required(false))
        .add_source(File::from(config_dir.join(run_env)).required(false))
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

    info!("Configuration loaded successfully");
    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn base_config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            8080,
            "production".into(),
        )
    }

    #[test]
    fn production_requires_cors_origins() {
        let cfg = base_config();
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn production_with_origins_passes() {
        let mut cfg = base_config();
        cfg.cors_allowed_origins = Some("https://materialesya.com.ar".into());
        assert!(cfg.validate_additional_constraints().is_ok());
    }

    #[test]
    fn min_connections_above_max_is_rejected() {
        let mut cfg = base_config();
        cfg.environment = "development".into();
        cfg.db_min_connections = 20;
        assert!(cfg.validate_additional_constraints().is_err());
    }

    #[test]
    fn blank_database_url_is_a_configuration_error() {
        let mut cfg = base_config();
        cfg.database_url = "  ".into();
        assert!(matches!(
            cfg.ensure_backend_configured(),
            Err(crate::errors::ServiceError::Configuration(_))
        ));
    }

    #[test]
    fn contact_defaults_apply_when_section_missing() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("test.toml"),
            "database_url = \"sqlite::memory:\"\nhost = \"127.0.0.1\"\n",
        )
        .unwrap();

        let cfg = load_config_from(dir.path(), "test").unwrap();
        assert_eq!(cfg.contact.email, DEFAULT_CONTACT_EMAIL);
        assert_eq!(cfg.catalog_page_size, 12);
        assert_eq!(cfg.currency, "ARS");
    }

    #[test]
    fn contact_section_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("test.toml"),
            r#"
database_url = "sqlite::memory:"
host = "127.0.0.1"

[contact]
whatsapp_phone = "+54 9 11 4444-1234"
"#,
        )
        .unwrap();

        let cfg = load_config_from(dir.path(), "test").unwrap();
        assert_eq!(cfg.contact.whatsapp_digits(), "5491144441234");
        assert_eq!(cfg.contact.address, DEFAULT_CONTACT_ADDRESS);
    }

    #[test]
    fn invalid_log_level_fails_validation() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("test.toml"),
            "database_url = \"sqlite::memory:\"\nhost = \"127.0.0.1\"\nlog_level = \"loud\"\n",
        )
        .unwrap();

        let result = load_config_from(dir.path(), "test");
        assert!(matches!(result, Err(AppConfigError::Validation(_))));
    }

    #[test]
    fn unknown_discount_scope_fails_validation() {
        let mut cfg = base_config();
        cfg.discount_priority = "product,brand".into();
        assert!(cfg.validate().is_err());

        cfg.discount_priority = "customer, product".into();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.discount_policy().unwrap().scopes().len(), 2);
    }
}
