//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text and process exit codes.

use miette::Diagnostic;
use thiserror::Error;

use dsbridge_config::ConfigError;
use dsbridge_core::{CoreError, TopologyError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const TOPOLOGY: i32 = 5;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to controller at {url}")]
    #[diagnostic(
        code(dsbridge::connection_failed),
        help(
            "Check that the dSS is running and reachable.\n\
             For a self-signed certificate set `insecure = true` under [controller]."
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Request to the controller timed out")]
    #[diagnostic(
        code(dsbridge::timeout),
        help("Increase controller.timeout or check controller responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(dsbridge::auth_failed),
        help(
            "Verify the username/password or the application token.\n\
             Application tokens must be approved in the dSS web UI before first use."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured")]
    #[diagnostic(
        code(dsbridge::no_credentials),
        help(
            "Set controller.api_key (or api_key_env) or controller.username with \
             password (or password_env) in {path}."
        )
    )]
    NoCredentials { path: String },

    // ── Topology ─────────────────────────────────────────────────────
    #[error("{entity_type} '{identifier}' not found")]
    #[diagnostic(
        code(dsbridge::not_found),
        help("Run: dsbridge topology to see the known devices")
    )]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error(transparent)]
    #[diagnostic(code(dsbridge::topology))]
    Topology(TopologyError),

    // ── API ──────────────────────────────────────────────────────────
    #[error("Controller rejected {endpoint}: {message}")]
    #[diagnostic(code(dsbridge::api_error))]
    ApiError { endpoint: String, message: String },

    #[error("Gave up after {attempts} attempts")]
    #[diagnostic(code(dsbridge::retries_exhausted))]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<CliError>,
    },

    // ── Validation / configuration ───────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(dsbridge::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration could not be loaded: {message}")]
    #[diagnostic(
        code(dsbridge::config),
        help("Check the TOML syntax and DSBRIDGE_* environment variables.")
    )]
    Config { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(dsbridge::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(dsbridge::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Topology(_) => exit_code::TOPOLOGY,
            Self::Validation { .. } | Self::Config { .. } => exit_code::USAGE,
            Self::RetriesExhausted { source, .. } => source.exit_code(),
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::Timeout => CliError::Timeout,
            CoreError::NotFound {
                entity_type,
                identifier,
            } => CliError::NotFound {
                entity_type: entity_type.into(),
                identifier,
            },
            CoreError::Topology(e) => CliError::Topology(e),
            CoreError::RetriesExhausted { attempts, source } => CliError::RetriesExhausted {
                attempts,
                source: Box::new(CliError::from(*source)),
            },
            CoreError::NotSubscribed { kind } => CliError::Validation {
                field: "kind".into(),
                reason: format!("not subscribed to '{kind}'"),
            },
            other @ (CoreError::DeviceChangeRegistered { .. }
            | CoreError::DeviceChangeNotRegistered { .. }) => CliError::Validation {
                field: "device".into(),
                reason: other.to_string(),
            },
            CoreError::Api {
                message, endpoint, ..
            } => CliError::ApiError {
                endpoint: endpoint.unwrap_or_else(|| "<request>".into()),
                message,
            },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials => CliError::NoCredentials {
                path: dsbridge_config::config_path().display().to_string(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}
