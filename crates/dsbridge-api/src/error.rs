use thiserror::Error;

use crate::model::EventKind;

/// Top-level error type for the `dsbridge-api` crate.
///
/// Covers every failure mode of the controller client: authentication,
/// transport, envelope decoding, subscription bookkeeping and the retry
/// ceiling. `dsbridge-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login was rejected (wrong credentials, revoked API key, ...).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The controller no longer accepts the session token.
    #[error("Session token rejected by controller: {message}")]
    NotLoggedIn { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, ...).
    ///
    /// `source` has its URL stripped: credentials and the session token
    /// travel as query parameters. `origin` keeps scheme, host and port.
    #[error("HTTP transport error talking to {origin}: {source}")]
    Transport {
        origin: String,
        #[source]
        source: reqwest::Error,
    },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    /// Non-success HTTP status without a decodable envelope.
    #[error("HTTP {status} from {endpoint}: {body}")]
    Http {
        endpoint: String,
        status: u16,
        body: String,
    },

    // ── Controller API ──────────────────────────────────────────────
    /// The controller answered `ok: false`.
    #[error("Controller API error on {endpoint}: {message}")]
    Api { endpoint: String, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// The response body did not match the expected shape, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Subscriptions ───────────────────────────────────────────────
    /// Unsubscribe requested for a kind with no local callbacks.
    #[error("Not subscribed to event '{kind}'")]
    NotSubscribed { kind: EventKind },

    // ── Retry ceiling ───────────────────────────────────────────────
    /// Every attempt failed with a retryable error; wraps the last cause.
    #[error("Giving up after {attempts} attempts: {source}")]
    ExhaustedRetries {
        attempts: u32,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Returns `true` if the session token was rejected and a fresh login
    /// might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::NotLoggedIn { .. })
    }

    /// Returns `true` if this is a transient transport error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport { source, .. } => source.is_timeout() || source.is_connect(),
            Self::Http { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the retry ceiling was hit.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::ExhaustedRetries { .. })
    }

    /// The innermost concrete cause, looking through `ExhaustedRetries`.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::ExhaustedRetries { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        let origin = err
            .url()
            .map_or_else(|| "<unknown>".to_owned(), |url| url.origin().ascii_serialization());
        Self::Transport {
            origin,
            source: err.without_url(),
        }
    }
}
