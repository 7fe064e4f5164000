//! Runtime configuration.
//!
//! Loaded from YAML (JSON is valid YAML). Durations are human-readable
//! strings such as `30s` or `1m 30s`.
//!
//! ```yaml
//! top_k: 4
//! mode: auto
//! oracle_timeout: 30s
//! concurrency: 4
//! retry:
//!   max_retries: 2
//!   base_delay: 500ms
//! cache:
//!   enabled: true
//!   max_entries: 1000
//!   ttl: 1h
//! token_budget: 200000
//! completion:
//!   model: claude-sonnet-4-5
//!   max_tokens: 1024
//!   temperature: 0.0
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::providers::CompletionConfig;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

/// Which prompt variant the analyzer uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Policy only; correlation is skipped.
    Simple,
    /// Always policy plus correspondence.
    Contextual,
    /// Contextual when correspondence matched, simple otherwise.
    #[default]
    Auto,
}

impl std::str::FromStr for AnalysisMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "contextual" => Ok(Self::Contextual),
            "auto" => Ok(Self::Auto),
            other => Err(ConfigError::Invalid(format!("unknown mode '{}'", other))),
        }
    }
}

/// Caller-side retry of transient oracle failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,

    #[serde(with = "duration_text")]
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            base_delay: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: u64,

    #[serde(with = "duration_text")]
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_entries: 10_000,
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Model settings for the LLM oracle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        let defaults = CompletionConfig::default();
        Self {
            model: defaults.model,
            max_tokens: defaults.max_tokens,
            temperature: defaults.temperature,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Passages requested per transaction
    pub top_k: usize,

    pub mode: AnalysisMode,

    /// Deadline for one oracle call
    #[serde(with = "duration_text")]
    pub oracle_timeout: Duration,

    /// Transactions analyzed at once in a batch
    pub concurrency: usize,

    pub retry: RetryConfig,
    pub cache: CacheConfig,

    /// Global token ceiling across all oracle calls
    pub token_budget: Option<u64>,

    pub completion: CompletionSettings,

    /// Attach the evidence bundle to each analysis
    pub include_bundle: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            mode: AnalysisMode::Auto,
            oracle_timeout: Duration::from_secs(30),
            concurrency: 4,
            retry: RetryConfig::default(),
            cache: CacheConfig::default(),
            token_budget: None,
            completion: CompletionSettings::default(),
            include_bundle: false,
        }
    }
}

impl RuntimeConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".to_string()));
        }
        if self.oracle_timeout.is_zero() {
            return Err(ConfigError::Invalid("oracle_timeout must be positive".to_string()));
        }
        if self.cache.enabled && self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid(
                "cache.max_entries must be positive when the cache is enabled".to_string(),
            ));
        }
        Ok(())
    }

    /// Provider request settings. The HTTP timeout matches the oracle
    /// deadline so the dispatcher's timeout is the one that fires.
    pub fn completion_config(&self) -> CompletionConfig {
        CompletionConfig {
            model: self.completion.model.clone(),
            max_tokens: self.completion.max_tokens,
            temperature: self.completion.temperature,
            timeout: self.oracle_timeout,
        }
    }
}

/// `Duration` as a humantime string (`"30s"`, `"1m 30s"`).
mod duration_text {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(de::Error::custom)
    }
}
