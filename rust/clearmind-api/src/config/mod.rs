//! Configuration management for ClearMind API.
//!
//! Values are layered in this order, later sources winning:
//!
//! 1. built-in defaults
//! 2. `config/clearmind-api.{yaml,toml,json}` and `config/clearmind.{...}`
//! 3. `CLEARMIND__SECTION__KEY` environment variables
//! 4. well-known variables (`DATABASE_PATH`, `JWT_SECRET`, `OWNER_OPEN_ID`,
//!    `OPENAI_API_KEY`, `OPENAI_BASE_URL`)
//!
//! ```rust,ignore
//! use clearmind_api::config::AppConfig;
//!
//! let config = AppConfig::load()?; // validated
//! ```

pub mod error;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Session tokens and ownership.
    #[serde(default)]
    pub auth: AuthConfig,
    /// SQLite store location.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Per-user request limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Presence tracking.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Global search.
    #[serde(default)]
    pub search: SearchConfig,
    /// Writing assistant backend.
    #[serde(default)]
    pub assistant: AssistantConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate configuration.
    ///
    /// Use [`Self::load_unchecked`] to skip validation.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(None)
    }

    /// Like [`Self::load`], with an extra config file layered over the
    /// default locations.
    pub fn load_from(file: Option<&str>) -> anyhow::Result<Self> {
        let config = Self::load_unchecked_from(file)?;

        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;

        Ok(config)
    }

    /// Load configuration without validation.
    pub fn load_unchecked() -> anyhow::Result<Self> {
        Self::load_unchecked_from(None)
    }

    fn load_unchecked_from(file: Option<&str>) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();

        let mut builder = config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            .set_default("database.path", "data/clearmind.db")?
            .set_default("assistant.model", "gpt-4o-mini")?
            .add_source(config::File::with_name("config/clearmind-api").required(false))
            .add_source(config::File::with_name("config/clearmind").required(false));
        if let Some(file) = file {
            builder = builder.add_source(config::File::with_name(file));
        }
        let config = builder
            .add_source(
                config::Environment::with_prefix("CLEARMIND")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = config.try_deserialize()?;

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            app_config.database.path = path;
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            app_config.auth.jwt_secret = Some(secret);
        }
        if let Ok(secret) = std::env::var("LOGIN_SECRET") {
            app_config.auth.login_secret = Some(secret);
        }
        if let Ok(owner) = std::env::var("OWNER_OPEN_ID") {
            app_config.auth.owner_open_id = Some(owner);
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            app_config.assistant.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            app_config.assistant.base_url = url;
        }

        Ok(app_config)
    }

    /// In-memory configuration used by tests and local tooling.
    #[must_use]
    pub fn for_tests() -> Self {
        let mut config = Self::default();
        config.database.path = ":memory:".to_string();
        config.auth.jwt_secret = Some("test-secret-with-enough-length".to_string());
        config.auth.login_secret = Some("test-login-secret-for-identity".to_string());
        config.rate_limit.enabled = false;
        config
    }

    /// Returns the login assertion secret, empty when unset.
    pub fn login_secret(&self) -> &str {
        self.auth.login_secret.as_deref().unwrap_or_default()
    }

    /// Returns the JWT secret, empty when unset.
    pub fn jwt_secret(&self) -> &str {
        self.auth.jwt_secret.as_deref().unwrap_or_default()
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// Allowed CORS origins; empty means any.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
            cors_origins: Vec::new(),
        }
    }
}

/// Session and ownership configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 signing secret for session tokens.
    pub jwt_secret: Option<String>,
    /// Secret shared with the OAuth bridge; login assertions must be signed
    /// with it.
    #[serde(default)]
    pub login_secret: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default = "default_token_expiry")]
    pub token_expiry_secs: u64,
    /// Name of the session cookie.
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Open id that is granted the admin role on login.
    pub owner_open_id: Option<String>,
}

fn default_token_expiry() -> u64 {
    // one year, matching the long-lived browser session
    365 * 24 * 60 * 60
}

fn default_cookie_name() -> String {
    crate::COOKIE_NAME.to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            login_secret: None,
            token_expiry_secs: default_token_expiry(),
            cookie_name: default_cookie_name(),
            owner_open_id: None,
        }
    }
}

/// Store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "data/clearmind.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Per-user rate limiting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_rate_limit")]
    pub per_minute: u32,
    #[serde(default = "default_rate_burst")]
    pub burst: u32,
}

fn default_true() -> bool {
    true
}

fn default_rate_limit() -> u32 {
    600
}

fn default_rate_burst() -> u32 {
    60
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            per_minute: default_rate_limit(),
            burst: default_rate_burst(),
        }
    }
}

/// Presence tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Presences idle longer than this are evicted.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// How often the sweeper runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Buffered messages per page room before slow receivers lag.
    #[serde(default = "default_room_capacity")]
    pub room_capacity: usize,
}

fn default_idle_timeout() -> u64 {
    300
}

fn default_sweep_interval() -> u64 {
    60
}

fn default_room_capacity() -> usize {
    256
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            sweep_interval_secs: default_sweep_interval(),
            room_capacity: default_room_capacity(),
        }
    }
}

/// Global search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,
    #[serde(default = "default_search_max")]
    pub max_limit: usize,
}

fn default_search_limit() -> usize {
    50
}

fn default_search_max() -> usize {
    200
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            max_limit: default_search_max(),
        }
    }
}

/// OpenAI-compatible chat completions backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default = "default_assistant_url")]
    pub base_url: String,
    pub api_key: Option<String>,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_assistant_timeout")]
    pub timeout_secs: u64,
}

fn default_assistant_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_assistant_timeout() -> u64 {
    45
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: default_assistant_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_assistant_timeout(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn defaults_match_documented_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.auth.cookie_name, "clearmind_session");
        assert_eq!(config.realtime.idle_timeout_secs, 300);
        assert_eq!(config.realtime.sweep_interval_secs, 60);
        assert_eq!(config.search.default_limit, 50);
    }

    #[test]
    #[serial]
    fn well_known_variables_override_file_values() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            std::env::set_var("JWT_SECRET", "from-env-secret");
            std::env::set_var("LOGIN_SECRET", "from-env-login-secret");
            std::env::set_var("DATABASE_PATH", ":memory:");
        }
        let config = AppConfig::load_unchecked().unwrap();
        assert_eq!(config.jwt_secret(), "from-env-secret");
        assert_eq!(config.login_secret(), "from-env-login-secret");
        assert_eq!(config.database.path, ":memory:");
        // SAFETY: see above.
        unsafe {
            std::env::remove_var("JWT_SECRET");
            std::env::remove_var("LOGIN_SECRET");
            std::env::remove_var("DATABASE_PATH");
        }
    }

    #[test]
    #[serial]
    fn prefixed_variables_reach_nested_sections() {
        // SAFETY: serialized with every other test touching the environment.
        unsafe {
            std::env::set_var("CLEARMIND__SEARCH__DEFAULT_LIMIT", "25");
        }
        let config = AppConfig::load_unchecked().unwrap();
        assert_eq!(config.search.default_limit, 25);
        // SAFETY: see above.
        unsafe {
            std::env::remove_var("CLEARMIND__SEARCH__DEFAULT_LIMIT");
        }
    }
}
