// ── Runtime connection configuration ──
//
// These types describe *how* to reach a dSS. They carry credential data and
// connection tuning, but never touch disk. The CLI builds a `BridgeConfig`
// (usually through dsbridge-config) and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use dsbridge_api::transport::{TlsMode, TransportConfig};
use dsbridge_api::{ClientConfig, Credentials, EventLoopConfig, RetryPolicy};
use url::Url;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification. The dSS ships a self-signed certificate.
    #[default]
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for bridging a single controller.
///
/// Built by the CLI and passed to [`Bridge`](crate::Bridge). Core never
/// reads config files.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Controller base URL (e.g., `https://dss.local:8080`).
    pub url: Url,
    /// User/password or application token.
    pub auth: Credentials,
    pub tls: TlsVerification,
    /// Per-request timeout for ordinary calls.
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub events: EventLoopConfig,
}

impl BridgeConfig {
    pub fn new(url: Url, auth: Credentials) -> Self {
        Self {
            url,
            auth,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            events: EventLoopConfig::default(),
        }
    }

    /// Lower into the API client's configuration.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.url.clone(),
            credentials: self.auth.clone(),
            transport: TransportConfig {
                tls: TlsMode::from(&self.tls),
                timeout: self.timeout,
            },
            retry: self.retry,
            events: self.events.clone(),
        }
    }
}
