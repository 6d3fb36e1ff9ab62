//! Startup validation for ClearMind API configuration.

use super::AppConfig;
use super::error::{ConfigResult, ConfigurationError};

/// Minimum secret length accepted at startup.
const MIN_SECRET_LEN: usize = 16;

/// Checks the loaded configuration and reports every problem at once.
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the whole configuration.
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();

        for check in [
            Self::validate_server(config),
            Self::validate_auth(config),
            Self::validate_database(config),
            Self::validate_rate_limit(config),
            Self::validate_realtime(config),
            Self::validate_search(config),
        ] {
            match check {
                Ok(()) => {}
                Err(ConfigurationError::Multiple(errs)) => errors.extend(errs),
                Err(e) => errors.push(e),
            }
        }

        ConfigurationError::collect(errors)
    }

    pub fn validate_server(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();
        if config.server.port == 0 {
            errors.push(ConfigurationError::invalid(
                "server.port is 0",
                "Set CLEARMIND__SERVER__PORT or pass --port with a non-zero value",
            ));
        }
        if config.server.timeout_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "server.timeout_secs is 0",
                "Set CLEARMIND__SERVER__TIMEOUT_SECS to at least 1",
            ));
        }
        ConfigurationError::collect(errors)
    }

    pub fn validate_auth(config: &AppConfig) -> ConfigResult<()> {
        let errors = [
            Self::check_secret(
                config.auth.jwt_secret.as_deref(),
                "auth.jwt_secret",
                "JWT_SECRET",
                "Signing and verifying session tokens",
            ),
            Self::check_secret(
                config.auth.login_secret.as_deref(),
                "auth.login_secret",
                "LOGIN_SECRET",
                "Verifying identity assertions from the OAuth bridge",
            ),
        ];
        ConfigurationError::collect(errors.into_iter().filter_map(Result::err).collect())
    }

    fn check_secret(
        value: Option<&str>,
        setting: &str,
        env_var: &str,
        context: &str,
    ) -> ConfigResult<()> {
        match value {
            None | Some("") => Err(ConfigurationError::missing_required(setting, context, env_var)),
            Some(secret) if secret.len() < MIN_SECRET_LEN => Err(ConfigurationError::invalid(
                format!("{setting} is only {} characters", secret.len()),
                format!("Set {env_var} to a random value of at least {MIN_SECRET_LEN} characters"),
            )),
            Some(_) => Ok(()),
        }
    }

    pub fn validate_database(config: &AppConfig) -> ConfigResult<()> {
        if config.database.path.trim().is_empty() {
            return Err(ConfigurationError::invalid(
                "database.path is empty",
                "Set DATABASE_PATH to a file path or ':memory:'",
            ));
        }
        Ok(())
    }

    pub fn validate_rate_limit(config: &AppConfig) -> ConfigResult<()> {
        let limits = &config.rate_limit;
        if limits.enabled && (limits.per_minute == 0 || limits.burst == 0) {
            return Err(ConfigurationError::invalid(
                format!(
                    "rate_limit.per_minute={} and rate_limit.burst={} must both be positive",
                    limits.per_minute, limits.burst
                ),
                "Set CLEARMIND__RATE_LIMIT__ENABLED=false to disable limiting instead",
            ));
        }
        Ok(())
    }

    pub fn validate_realtime(config: &AppConfig) -> ConfigResult<()> {
        let realtime = &config.realtime;
        let mut errors = Vec::new();
        if realtime.sweep_interval_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "realtime.sweep_interval_secs is 0",
                "Set CLEARMIND__REALTIME__SWEEP_INTERVAL_SECS to at least 1",
            ));
        }
        if realtime.idle_timeout_secs < realtime.sweep_interval_secs {
            errors.push(ConfigurationError::incompatible(
                format!("realtime.idle_timeout_secs={}", realtime.idle_timeout_secs),
                format!("realtime.sweep_interval_secs={}", realtime.sweep_interval_secs),
                "The idle timeout must not be shorter than the sweep interval. \
                Set CLEARMIND__REALTIME__IDLE_TIMEOUT_SECS to a larger value.",
            ));
        }
        if realtime.room_capacity == 0 {
            errors.push(ConfigurationError::invalid(
                "realtime.room_capacity is 0",
                "Set CLEARMIND__REALTIME__ROOM_CAPACITY to at least 1",
            ));
        }
        ConfigurationError::collect(errors)
    }

    pub fn validate_search(config: &AppConfig) -> ConfigResult<()> {
        let search = &config.search;
        if search.default_limit == 0 || search.default_limit > search.max_limit {
            return Err(ConfigurationError::invalid(
                format!(
                    "search.default_limit={} must be between 1 and search.max_limit={}",
                    search.default_limit, search.max_limit
                ),
                "Set CLEARMIND__SEARCH__DEFAULT_LIMIT below CLEARMIND__SEARCH__MAX_LIMIT",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_valid() {
        ConfigValidator::validate(&AppConfig::for_tests()).unwrap();
    }

    #[test]
    fn missing_secret_is_reported() {
        let mut config = AppConfig::for_tests();
        config.auth.jwt_secret = None;
        let msg = ConfigValidator::validate(&config).unwrap_err().to_string();
        assert!(msg.contains("JWT_SECRET"));
    }

    #[test]
    fn missing_login_secret_is_reported() {
        let mut config = AppConfig::for_tests();
        config.auth.login_secret = Some(String::new());
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(err.count(), 1);
        assert!(err.to_string().contains("LOGIN_SECRET"));
    }

    #[test]
    fn short_secret_is_rejected() {
        let mut config = AppConfig::for_tests();
        config.auth.jwt_secret = Some("short".to_string());
        let msg = ConfigValidator::validate(&config).unwrap_err().to_string();
        assert!(msg.contains("only 5 characters"));
    }

    #[test]
    fn idle_timeout_shorter_than_sweep_is_incompatible() {
        let mut config = AppConfig::for_tests();
        config.realtime.idle_timeout_secs = 10;
        config.realtime.sweep_interval_secs = 60;
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert!(matches!(err, ConfigurationError::Incompatible { .. }));
    }

    #[test]
    fn all_problems_are_collected() {
        let mut config = AppConfig::for_tests();
        config.server.port = 0;
        config.auth.jwt_secret = None;
        config.search.default_limit = 500;
        let err = ConfigValidator::validate(&config).unwrap_err();
        assert_eq!(err.count(), 3);
    }

    #[test]
    fn disabled_rate_limit_skips_quota_checks() {
        let mut config = AppConfig::for_tests();
        config.rate_limit.enabled = false;
        config.rate_limit.per_minute = 0;
        assert!(ConfigValidator::validate_rate_limit(&config).is_ok());

        config.rate_limit.enabled = true;
        assert!(ConfigValidator::validate_rate_limit(&config).is_err());
    }
}
