//! API keys for the judgment backend.
//!
//! fraudlens reports echo transactions and evidence, and `RUST_LOG=debug`
//! prints request settings, so the key is held as a `secrecy::SecretString`
//! from the moment it is read. Formatting it yields `[REDACTED]`; only
//! [`ApiCredential::expose`] hands out the text, inside the request builder.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value as JsonValue;
use std::fmt;

use super::ProviderError;

/// Where a credential was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Config,
    Environment,
    Programmatic,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CredentialSource::Config => write!(f, "config"),
            CredentialSource::Environment => write!(f, "environment"),
            CredentialSource::Programmatic => write!(f, "programmatic"),
        }
    }
}

/// Provider API key, redacted when formatted.
pub struct ApiCredential {
    value: SecretString,
    source: CredentialSource,
    name: &'static str,
}

impl ApiCredential {
    pub fn new(value: impl Into<String>, source: CredentialSource, name: &'static str) -> Self {
        Self {
            value: SecretString::from(value.into()),
            source,
            name,
        }
    }

    /// Load from an environment variable. A blank value counts as unset.
    pub fn from_env(env_var: &str, name: &'static str) -> Result<Self, ProviderError> {
        env_value(env_var)
            .map(|v| Self::new(v, CredentialSource::Environment, name))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "{} not set: configure '{}' environment variable",
                    name, env_var
                ))
            })
    }

    /// Load from `config[config_key]`, falling back to `env_var`.
    pub fn from_config_or_env(
        config: &JsonValue,
        config_key: &str,
        env_var: &str,
        name: &'static str,
    ) -> Result<Self, ProviderError> {
        if let Some(value) = config_value(config, config_key) {
            return Ok(Self::new(value, CredentialSource::Config, name));
        }

        Self::from_env(env_var, name).map_err(|_| {
            ProviderError::NotConfigured(format!(
                "{} required: set '{}' in config or {} environment variable",
                name, config_key, env_var
            ))
        })
    }

    /// Whether a credential could be loaded, without loading it.
    pub fn is_available(config: &JsonValue, config_key: &str, env_var: &str) -> bool {
        config_value(config, config_key).is_some() || env_value(env_var).is_some()
    }

    /// Raw value. Call only where the credential is sent.
    pub fn expose(&self) -> &str {
        self.value.expose_secret()
    }

    pub fn is_empty(&self) -> bool {
        self.value.expose_secret().is_empty()
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

fn config_value<'a>(config: &'a JsonValue, key: &str) -> Option<&'a str> {
    config[key].as_str().filter(|v| !v.trim().is_empty())
}

fn env_value(env_var: &str) -> Option<String> {
    std::env::var(env_var).ok().filter(|v| !v.trim().is_empty())
}

impl fmt::Debug for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredential")
            .field("value", &"[REDACTED]")
            .field("source", &self.source)
            .field("name", &self.name)
            .finish()
    }
}

impl fmt::Display for ApiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} from {} [REDACTED]", self.name, self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_and_display_redact() {
        let secret = "sk-ant-very-secret";
        let cred = ApiCredential::new(secret, CredentialSource::Programmatic, "Test key");

        let debug = format!("{:?}", cred);
        let display = format!("{}", cred);
        assert!(!debug.contains(secret));
        assert!(!display.contains(secret));
        assert!(debug.contains("[REDACTED]"));
        assert_eq!(cred.expose(), secret);
    }

    #[test]
    fn test_config_takes_precedence() {
        let config = serde_json::json!({"api_key": "from-config"});
        let cred = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "FRAUDLENS_TEST_UNSET_VARIABLE",
            "Test key",
        )
        .unwrap();

        assert_eq!(cred.source(), CredentialSource::Config);
        assert_eq!(cred.expose(), "from-config");
    }

    #[test]
    fn test_blank_config_value_is_ignored() {
        let config = serde_json::json!({"api_key": "   "});
        assert!(!ApiCredential::is_available(
            &config,
            "api_key",
            "FRAUDLENS_TEST_UNSET_VARIABLE"
        ));
    }

    #[test]
    fn test_missing_credential() {
        let config = serde_json::json!({});
        let result = ApiCredential::from_config_or_env(
            &config,
            "api_key",
            "FRAUDLENS_TEST_UNSET_VARIABLE",
            "Test key",
        );
        assert!(matches!(result, Err(ProviderError::NotConfigured(_))));
        assert!(!ApiCredential::is_available(
            &config,
            "api_key",
            "FRAUDLENS_TEST_UNSET_VARIABLE"
        ));
    }
}
