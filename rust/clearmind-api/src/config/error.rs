//! Startup configuration errors.

use thiserror::Error;

/// A configuration problem, worded so the operator knows what to change.
#[derive(Debug, Clone, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}\n\nHow to fix: {fix_hint}")]
    Invalid { message: String, fix_hint: String },

    #[error("Incompatible settings: {first} cannot be used with {second}\n\nReason: {reason}")]
    Incompatible {
        first: String,
        second: String,
        reason: String,
    },

    #[error("Missing required configuration: {setting}\n\nRequired for: {context}\nSet via: {env_var}")]
    MissingRequired {
        setting: String,
        context: String,
        env_var: String,
    },

    #[error("Multiple configuration errors:\n{}", numbered(.0))]
    Multiple(Vec<ConfigurationError>),
}

fn numbered(errors: &[ConfigurationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("\n{}. {err}\n", i + 1))
        .collect()
}

impl ConfigurationError {
    #[must_use]
    pub fn invalid(message: impl Into<String>, fix_hint: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
            fix_hint: fix_hint.into(),
        }
    }

    #[must_use]
    pub fn incompatible(first: impl Into<String>, second: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Incompatible {
            first: first.into(),
            second: second.into(),
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn missing_required(
        setting: impl Into<String>,
        context: impl Into<String>,
        env_var: impl Into<String>,
    ) -> Self {
        Self::MissingRequired {
            setting: setting.into(),
            context: context.into(),
            env_var: env_var.into(),
        }
    }

    /// `Ok` for no errors, the error itself for one, `Multiple` otherwise.
    pub fn collect(mut errors: Vec<ConfigurationError>) -> ConfigResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(Self::Multiple(errors)),
        }
    }

    #[must_use]
    pub fn count(&self) -> usize {
        match self {
            Self::Multiple(errors) => errors.len(),
            _ => 1,
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_secret_names_its_variable() {
        let msg = ConfigurationError::missing_required("auth.jwt_secret", "Signing session tokens", "JWT_SECRET")
            .to_string();
        assert!(msg.starts_with("Missing required configuration: auth.jwt_secret"));
        assert!(msg.contains("Set via: JWT_SECRET"));
    }

    #[test]
    fn idle_timeout_conflict_mentions_both_settings() {
        let msg = ConfigurationError::incompatible(
            "realtime.idle_timeout_secs=30",
            "realtime.sweep_interval_secs=60",
            "Idle users would outlive a whole sweep",
        )
        .to_string();
        assert!(msg.contains("idle_timeout_secs=30 cannot be used with realtime.sweep_interval_secs=60"));
    }

    #[test]
    fn collect_keeps_single_errors_unwrapped() {
        assert!(ConfigurationError::collect(Vec::new()).is_ok());

        let single = ConfigurationError::collect(vec![ConfigurationError::invalid("port is 0", "set a port")])
            .unwrap_err();
        assert!(matches!(single, ConfigurationError::Invalid { .. }));

        let many = ConfigurationError::collect(vec![
            ConfigurationError::invalid("server.port is 0", "Pick a port"),
            ConfigurationError::invalid("rate_limit.burst is 0", "Use at least 1"),
        ])
        .unwrap_err();
        assert_eq!(many.count(), 2);
        let msg = many.to_string();
        assert!(msg.contains("1. Invalid configuration: server.port is 0"));
        assert!(msg.contains("2. Invalid configuration: rate_limit.burst is 0"));
    }
}
