//! Configuration loading for the triage service.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `TRIAGE_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, fmt, net::SocketAddr, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

const ENV_PREFIX: &str = "TRIAGE_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `TRIAGE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_github_secret: Option<String>,
    #[serde(default = "default_webhook_max_body_kb")]
    pub webhook_max_body_kb: usize,
    #[serde(default = "default_github_api_base")]
    pub github_api_base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_token: Option<String>,
    #[serde(default = "default_github_request_timeout_ms")]
    pub github_request_timeout_ms: u64,
    #[serde(default)]
    pub action_retry: ActionRetryConfig,
    #[serde(default)]
    pub action_dispatch: DispatchMode,
    /// JSON file of rules inserted at startup when not already present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_file: Option<String>,
}

/// Bounded retry policy applied to remote label/comment calls.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ActionRetryConfig {
    /// Total remote calls allowed per action, including the first (default: 3)
    ///
    /// Environment variable: `TRIAGE_ACTION_MAX_ATTEMPTS`
    #[serde(default = "default_action_max_attempts")]
    #[schema(example = 3, minimum = 1, maximum = 10)]
    pub max_attempts: u32,

    /// Delay before the second attempt in milliseconds (default: 500)
    ///
    /// Subsequent delays double: base_delay_ms * 2^(attempt - 1).
    ///
    /// Environment variable: `TRIAGE_ACTION_BASE_DELAY_MS`
    #[serde(default = "default_action_base_delay_ms")]
    #[schema(example = 500)]
    pub base_delay_ms: u64,

    /// Upper bound for a single delay in milliseconds (default: 5000)
    ///
    /// Environment variable: `TRIAGE_ACTION_MAX_DELAY_MS`
    #[serde(default = "default_action_max_delay_ms")]
    #[schema(example = 5000)]
    pub max_delay_ms: u64,

    /// Jitter factor applied to each delay (default: 0.1, range: 0.0-1.0)
    ///
    /// Formula: delay * (1 ± jitter_factor)
    ///
    /// Environment variable: `TRIAGE_ACTION_JITTER_FACTOR`
    #[serde(default = "default_action_jitter_factor")]
    #[schema(example = 0.1, minimum = 0.0, maximum = 1.0)]
    pub jitter_factor: f64,

    /// Whether failed comment posts are retried (default: true)
    ///
    /// Re-posting a comment after an ambiguous failure can create a duplicate.
    /// Disable to get at-most-once comments.
    ///
    /// Environment variable: `TRIAGE_ACTION_RETRY_COMMENTS`
    #[serde(default = "default_action_retry_comments")]
    pub retry_comments: bool,
}

impl Default for ActionRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_action_max_attempts(),
            base_delay_ms: default_action_base_delay_ms(),
            max_delay_ms: default_action_max_delay_ms(),
            jitter_factor: default_action_jitter_factor(),
            retry_comments: default_action_retry_comments(),
        }
    }
}

impl ActionRetryConfig {
    /// Validate retry policy bounds
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 || self.max_attempts > 10 {
            return Err(ConfigError::InvalidActionMaxAttempts {
                value: self.max_attempts,
            });
        }

        if self.base_delay_ms > self.max_delay_ms {
            return Err(ConfigError::InvalidActionDelayBounds {
                base: self.base_delay_ms,
                max: self.max_delay_ms,
            });
        }

        if !(0.0..=1.0).contains(&self.jitter_factor) {
            return Err(ConfigError::InvalidActionJitter {
                value: self.jitter_factor,
            });
        }

        Ok(())
    }
}

/// How remote actions are driven relative to the intake request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Run every action before the webhook handler responds
    Inline,
    /// Spawn one task per alert and respond immediately
    #[default]
    Background,
}

impl DispatchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Inline => "inline",
            DispatchMode::Background => "background",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DispatchMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "inline" => Ok(DispatchMode::Inline),
            "background" => Ok(DispatchMode::Background),
            other => Err(ConfigError::InvalidDispatchMode {
                value: other.to_string(),
            }),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            webhook_github_secret: None,
            webhook_max_body_kb: default_webhook_max_body_kb(),
            github_api_base: default_github_api_base(),
            github_token: None,
            github_request_timeout_ms: default_github_request_timeout_ms(),
            action_retry: ActionRetryConfig::default(),
            action_dispatch: DispatchMode::default(),
            rules_file: None,
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Maximum accepted webhook body in bytes.
    pub fn webhook_max_body_bytes(&self) -> usize {
        self.webhook_max_body_kb.saturating_mul(1024)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.webhook_github_secret.is_some() {
            config.webhook_github_secret = Some(REDACTED.to_string());
        }
        if config.github_token.is_some() {
            config.github_token = Some(REDACTED.to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    fn is_dev_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        // Unsigned deliveries are only tolerated during local development
        if !self.is_dev_profile() && self.webhook_github_secret.is_none() {
            return Err(ConfigError::MissingWebhookSecret {
                profile: self.profile.clone(),
            });
        }

        if self.webhook_max_body_kb == 0 {
            return Err(ConfigError::InvalidWebhookMaxBody {
                value: self.webhook_max_body_kb,
            });
        }

        if self.github_request_timeout_ms == 0 {
            return Err(ConfigError::InvalidRequestTimeout {
                value: self.github_request_timeout_ms,
            });
        }

        if url::Url::parse(&self.github_api_base).is_err() {
            return Err(ConfigError::InvalidGitHubApiBase {
                value: self.github_api_base.clone(),
            });
        }

        self.action_retry.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/triage".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_webhook_max_body_kb() -> usize {
    1024 // 1MB
}

fn default_github_api_base() -> String {
    "https://api.github.com".to_string()
}

fn default_github_request_timeout_ms() -> u64 {
    10_000
}

fn default_action_max_attempts() -> u32 {
    3
}

fn default_action_base_delay_ms() -> u64 {
    500
}

fn default_action_max_delay_ms() -> u64 {
    5000
}

fn default_action_jitter_factor() -> f64 {
    0.1 // 10% jitter
}

fn default_action_retry_comments() -> bool {
    true
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error(
        "webhook secret is missing for profile '{profile}'; set TRIAGE_WEBHOOK_GITHUB_SECRET"
    )]
    MissingWebhookSecret { profile: String },
    #[error("webhook max body must be positive, got {value} KB")]
    InvalidWebhookMaxBody { value: usize },
    #[error("GitHub request timeout must be positive, got {value} ms")]
    InvalidRequestTimeout { value: u64 },
    #[error("GitHub API base '{value}' is not a valid URL")]
    InvalidGitHubApiBase { value: String },
    #[error("action max attempts must be between 1 and 10, got {value}")]
    InvalidActionMaxAttempts { value: u32 },
    #[error("action base delay ({base} ms) cannot be greater than max delay ({max} ms)")]
    InvalidActionDelayBounds { base: u64, max: u64 },
    #[error("action jitter factor must be between 0.0 and 1.0, got {value}")]
    InvalidActionJitter { value: f64 },
    #[error("invalid action dispatch mode '{value}'; expected 'inline' or 'background'")]
    InvalidDispatchMode { value: String },
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },
}

/// Loads configuration using layered `.env` files and `TRIAGE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads `.env` layers, overlays the process environment and validates the result.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let webhook_github_secret = take_string(&mut layered, "WEBHOOK_GITHUB_SECRET");
        let webhook_max_body_kb = take_parsed(&mut layered, "WEBHOOK_MAX_BODY_KB")?
            .unwrap_or_else(default_webhook_max_body_kb);

        let github_api_base =
            take_string(&mut layered, "GITHUB_API_BASE").unwrap_or_else(default_github_api_base);
        let github_token = take_string(&mut layered, "GITHUB_TOKEN");
        let github_request_timeout_ms = take_parsed(&mut layered, "GITHUB_REQUEST_TIMEOUT_MS")?
            .unwrap_or_else(default_github_request_timeout_ms);

        let action_retry = ActionRetryConfig {
            max_attempts: take_parsed(&mut layered, "ACTION_MAX_ATTEMPTS")?
                .unwrap_or_else(default_action_max_attempts),
            base_delay_ms: take_parsed(&mut layered, "ACTION_BASE_DELAY_MS")?
                .unwrap_or_else(default_action_base_delay_ms),
            max_delay_ms: take_parsed(&mut layered, "ACTION_MAX_DELAY_MS")?
                .unwrap_or_else(default_action_max_delay_ms),
            jitter_factor: take_parsed(&mut layered, "ACTION_JITTER_FACTOR")?
                .unwrap_or_else(default_action_jitter_factor),
            retry_comments: take_parsed(&mut layered, "ACTION_RETRY_COMMENTS")?
                .unwrap_or_else(default_action_retry_comments),
        };

        let action_dispatch = match take_string(&mut layered, "ACTION_DISPATCH") {
            Some(value) => value.parse()?,
            None => DispatchMode::default(),
        };
        let rules_file = take_string(&mut layered, "RULES_FILE");

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            webhook_github_secret,
            webhook_max_body_kb,
            github_api_base,
            github_token,
            github_request_timeout_ms,
            action_retry,
            action_dispatch,
            rules_file,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered
        .remove(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn take_parsed<T: FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}{key}"),
                value,
            }),
        None => Ok(None),
    }
}
