//! Configuration for the dsbridge CLI.
//!
//! One TOML file layered under `DSBRIDGE_*` environment variables,
//! credential resolution (env var + plaintext), and translation to
//! `dsbridge_core::BridgeConfig`. The library crates never read files;
//! this crate is the only place that does.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use dsbridge_api::{Credentials, EventLoopConfig, RetryPolicy};
use dsbridge_core::{BridgeConfig, TlsVerification};

/// Prefix for environment overrides. Nested keys use a double underscore:
/// `DSBRIDGE_CONTROLLER__URL`, `DSBRIDGE_RETRY__MAX_RETRIES`.
pub const ENV_PREFIX: &str = "DSBRIDGE_";

const REDACTED: &str = "********";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured: set controller.api_key or controller.username and password")]
    NoCredentials,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub controller: ControllerSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub events: EventsSection,
    #[serde(default)]
    pub log: LogSection,
}

/// How to reach and authenticate with the dSS.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ControllerSection {
    /// Controller base URL (e.g., "https://dss.local:8080").
    pub url: Option<String>,

    /// Username for user login.
    pub username: Option<String>,

    /// Password (plaintext, prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Application token for `loginApplication` (plaintext, prefer `api_key_env`).
    pub api_key: Option<String>,

    /// Environment variable name containing the application token.
    pub api_key_env: Option<String>,

    /// Accept any TLS certificate. Unset means the same as `true`
    /// unless `ca_cert` is given.
    pub insecure: Option<bool>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ControllerSection {
    fn default() -> Self {
        Self {
            url: None,
            username: None,
            password: None,
            password_env: None,
            api_key: None,
            api_key_env: None,
            insecure: None,
            ca_cert: None,
            timeout: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetrySection {
    /// Attempts per call, including the first.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EventsSection {
    /// Fixed subscription id; random when unset.
    pub subscription_id: Option<u32>,
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub idle_interval_ms: u64,
    #[serde(default = "default_interval_ms")]
    pub error_backoff_ms: u64,
    #[serde(default = "default_max_concurrent_handlers")]
    pub max_concurrent_handlers: usize,
}

impl Default for EventsSection {
    fn default() -> Self {
        Self {
            subscription_id: None,
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_interval_ms: default_interval_ms(),
            error_backoff_ms: default_interval_ms(),
            max_concurrent_handlers: default_max_concurrent_handlers(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogSection {
    /// `tracing` filter directive used when no `-v` flag is given.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_timeout() -> u64 {
    30
}
fn default_max_retries() -> u32 {
    3
}
fn default_retry_delay_ms() -> u64 {
    2000
}
fn default_poll_timeout_ms() -> u64 {
    10_000
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_max_concurrent_handlers() -> usize {
    64
}
fn default_log_level() -> String {
    "info".into()
}

impl Config {
    /// Copy with every plaintext secret masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |secret: &mut Option<String>| {
            if secret.is_some() {
                *secret = Some(REDACTED.into());
            }
        };
        mask(&mut copy.controller.password);
        mask(&mut copy.controller.api_key);
        copy
    }

    /// Pretty TOML rendering.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "dsbridge", "dsbridge").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("dsbridge");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Defaults, then the TOML file, then `DSBRIDGE_*` variables.
///
/// A missing file is not an error; figment simply skips it.
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load from `path`, or from [`config_path()`] when `None`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    load_from(&figment(&path))
}

/// Extract from an already-assembled figment.
pub fn load_from(figment: &Figment) -> Result<Config, ConfigError> {
    Ok(figment.extract()?)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve credentials from the process environment and the config.
pub fn resolve_credentials(controller: &ControllerSection) -> Result<Credentials, ConfigError> {
    resolve_credentials_with(controller, |name| std::env::var(name).ok())
}

/// Resolve credentials with a custom environment lookup.
///
/// An application token wins over user login. Each secret is taken from
/// its `*_env` variable first, then from the plaintext field.
pub fn resolve_credentials_with(
    controller: &ControllerSection,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Credentials, ConfigError> {
    let secret = |env_name: Option<&String>, plaintext: Option<&String>| {
        env_name
            .and_then(|name| env(name.as_str()))
            .or_else(|| plaintext.cloned())
            .filter(|value| !value.is_empty())
            .map(SecretString::from)
    };

    if let Some(api_key) = secret(
        controller.api_key_env.as_ref(),
        controller.api_key.as_ref(),
    ) {
        return Ok(Credentials::ApiKey(api_key));
    }

    let username = controller
        .username
        .as_ref()
        .filter(|u| !u.is_empty())
        .ok_or(ConfigError::NoCredentials)?;
    let password = secret(
        controller.password_env.as_ref(),
        controller.password.as_ref(),
    )
    .ok_or(ConfigError::NoCredentials)?;

    Ok(Credentials::Password {
        username: username.clone(),
        password,
    })
}

// ── Translation to runtime config ───────────────────────────────────

/// Build a `BridgeConfig`, resolving credentials from the process environment.
pub fn to_bridge_config(config: &Config) -> Result<BridgeConfig, ConfigError> {
    let auth = resolve_credentials(&config.controller)?;
    bridge_config_with(config, auth)
}

/// Build a `BridgeConfig` around already-resolved credentials.
pub fn bridge_config_with(config: &Config, auth: Credentials) -> Result<BridgeConfig, ConfigError> {
    let controller = &config.controller;

    let raw_url = controller
        .url
        .as_deref()
        .ok_or_else(|| invalid("controller.url", "not set"))?;
    let url: url::Url = raw_url
        .parse()
        .map_err(|_| invalid("controller.url", format!("invalid URL: {raw_url}")))?;

    // dSS boxes ship self-signed certificates
    let tls = match (controller.insecure, &controller.ca_cert) {
        (Some(true), _) | (None, None) => TlsVerification::DangerAcceptInvalid,
        (_, Some(ca_path)) => TlsVerification::CustomCa(ca_path.clone()),
        (Some(false), None) => TlsVerification::SystemDefaults,
    };

    if config.retry.max_retries == 0 {
        return Err(invalid("retry.max_retries", "must be at least 1"));
    }
    if config.events.max_concurrent_handlers == 0 {
        return Err(invalid("events.max_concurrent_handlers", "must be at least 1"));
    }
    if config.events.poll_timeout_ms == 0 {
        return Err(invalid("events.poll_timeout_ms", "must be positive"));
    }

    Ok(BridgeConfig {
        url,
        auth,
        tls,
        timeout: Duration::from_secs(controller.timeout),
        retry: RetryPolicy {
            max_retries: config.retry.max_retries,
            retry_delay: Duration::from_millis(config.retry.retry_delay_ms),
        },
        events: EventLoopConfig {
            subscription_id: config.events.subscription_id,
            poll_timeout: Duration::from_millis(config.events.poll_timeout_ms),
            idle_interval: Duration::from_millis(config.events.idle_interval_ms),
            error_backoff: Duration::from_millis(config.events.error_backoff_ms),
            max_concurrent_handlers: config.events.max_concurrent_handlers,
        },
    })
}
