// ── Core error types ──
//
// User-facing errors from dsbridge-core. Callers see connection, topology
// and controller failures here rather than raw HTTP statuses or JSON
// parse errors. The `From<dsbridge_api::Error>` impl does the translation.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to controller at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Controller request timed out")]
    Timeout,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Entity not found: {entity_type} with id {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    #[error(transparent)]
    Topology(#[from] TopologyError),

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Gave up after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<CoreError>,
    },

    #[error("Not subscribed to event '{kind}'")]
    NotSubscribed { kind: String },

    #[error("A device change callback is already registered for {device}")]
    DeviceChangeRegistered { device: String },

    #[error("No device change callback is registered for {device}")]
    DeviceChangeNotRegistered { device: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// The endpoint that failed, when known.
        endpoint: Option<String>,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Violations of the Device → Submodule → Function Block shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopologyError {
    #[error("Apartment topology has not been loaded yet")]
    NotLoaded,

    #[error("Apartment status has not been loaded yet")]
    StatusNotLoaded,

    #[error("Device {device} has no function block")]
    NoFunctionBlock { device: String },

    #[error("Device {device} has {count} function blocks, expected exactly one")]
    MultipleFunctionBlocks { device: String, count: usize },
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &'static str, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type,
            identifier: identifier.into(),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<dsbridge_api::Error> for CoreError {
    fn from(err: dsbridge_api::Error) -> Self {
        use dsbridge_api::Error as ApiError;

        match err {
            ApiError::Authentication { message } | ApiError::NotLoggedIn { message } => {
                CoreError::AuthenticationFailed { message }
            }
            ApiError::Transport { origin, source } => {
                if source.is_timeout() {
                    CoreError::Timeout
                } else if source.is_connect() {
                    CoreError::ConnectionFailed {
                        url: origin,
                        reason: source.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: source.to_string(),
                        endpoint: None,
                        status: source.status().map(|s| s.as_u16()),
                    }
                }
            }
            ApiError::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            ApiError::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ApiError::Http {
                endpoint,
                status,
                body,
            } => CoreError::Api {
                message: format!("HTTP {status}: {body}"),
                endpoint: Some(endpoint),
                status: Some(status),
            },
            ApiError::Api { endpoint, message } => CoreError::Api {
                message,
                endpoint: Some(endpoint),
                status: None,
            },
            ApiError::Deserialization { message, .. } => {
                CoreError::Internal(format!("Unexpected controller response: {message}"))
            }
            ApiError::NotSubscribed { kind } => CoreError::NotSubscribed {
                kind: kind.to_string(),
            },
            ApiError::ExhaustedRetries { attempts, source } => CoreError::RetriesExhausted {
                attempts,
                source: Box::new(CoreError::from(*source)),
            },
        }
    }
}
