// Single-shot HTTP transport against the dSS JSON API.
//
// Builds the reqwest client (TLS mode, timeout), attaches the session token
// as a query parameter and strips the `{ ok, result, message }` envelope.
// Retry and re-authentication live one layer up in `client`.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use reqwest::Method;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;

const USER_AGENT: &str = concat!("dsbridge/", env!("CARGO_PKG_VERSION"));

/// Substring the controller puts in `message` when the token is missing or stale.
const NOT_LOGGED_IN: &str = "not logged in";

/// Parameter names whose values never reach a log line.
const SECRET_PARAMS: &[&str] = &["token", "password", "loginToken"];

/// TLS verification mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TlsMode {
    /// Use the system certificate store.
    System,
    /// Use a custom CA certificate from the given PEM file.
    CustomCa(PathBuf),
    /// Accept any certificate. The dSS ships with a self-signed one.
    DangerAcceptInvalid,
}

/// Transport configuration for building the HTTP client.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub tls: TlsMode,
    /// Default per-request timeout. The event long-poll overrides it.
    pub timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls: TlsMode::DangerAcceptInvalid,
            timeout: Duration::from_secs(30),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        let mut builder = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(USER_AGENT);

        match &self.tls {
            TlsMode::System => {}
            TlsMode::CustomCa(path) => {
                let cert_pem = std::fs::read(path)
                    .map_err(|e| Error::Tls(format!("failed to read CA cert: {e}")))?;
                let cert = reqwest::Certificate::from_pem(&cert_pem)
                    .map_err(|e| Error::Tls(format!("invalid CA cert: {e}")))?;
                builder = builder.add_root_certificate(cert);
            }
            TlsMode::DangerAcceptInvalid => {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        builder
            .build()
            .map_err(|e| Error::Tls(format!("failed to build HTTP client: {e}")))
    }
}

// ── Query parameters ────────────────────────────────────────────────

/// Ordered query parameters for one API call.
///
/// `Debug` redacts credential-bearing keys so a `Params` can be logged as-is.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Params(Vec<(String, String)>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.set(key, value);
        self
    }

    /// Insert or replace `key`.
    pub fn set(&mut self, key: impl Into<String>, value: impl ToString) {
        let key = key.into();
        let value = value.to_string();
        if let Some(slot) = self.0.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.0.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (k, v) in &self.0 {
            if SECRET_PARAMS.contains(&k.as_str()) {
                map.entry(k, &"***");
            } else {
                map.entry(k, v);
            }
        }
        map.finish()
    }
}

impl<K: Into<String>, V: ToString> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.set(k, v);
        }
        params
    }
}

// ── Transport ───────────────────────────────────────────────────────

/// One authenticated request against the controller, no retries.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
}

impl Transport {
    pub fn new(base_url: Url, config: &TransportConfig) -> Result<Self, Error> {
        Ok(Self::with_client(config.build_client()?, base_url))
    }

    /// Wrap a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// The controller base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve an endpoint path (`json/zone/getName`) against the base URL.
    pub(crate) fn endpoint_url(&self, endpoint: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = endpoint.trim_start_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    /// Issue one request and unwrap the envelope.
    ///
    /// `token` is appended as the `token` query parameter. `body`, when
    /// given, is sent as JSON (POST only in practice). `timeout` overrides
    /// the client-wide timeout for this request.
    pub async fn send(
        &self,
        method: Method,
        endpoint: &str,
        params: &Params,
        token: Option<&str>,
        body: Option<&Value>,
        timeout: Option<Duration>,
    ) -> Result<Value, Error> {
        let mut url = self.endpoint_url(endpoint)?;
        {
            let mut query = url.query_pairs_mut();
            for (k, v) in params.iter() {
                query.append_pair(k, v);
            }
            if let Some(token) = token {
                query.append_pair("token", token);
            }
        }
        if url.query() == Some("") {
            url.set_query(None);
        }

        debug!(%method, endpoint, ?params, "dSS request");

        let mut builder = self.http.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let text = resp.text().await?;
        trace!(endpoint, status, bytes = text.len(), "dSS response");

        parse_envelope(endpoint, status, &text)
    }
}

/// Strip the dSS envelope from a response body.
///
/// `{ok:true, result}` yields `result` (or `null` when absent),
/// `{ok:false, message}` yields `NotLoggedIn` or `Api`, and the REST-style
/// `{data}` shape used by `api/v1` yields `data`.
pub fn parse_envelope(endpoint: &str, status: u16, body: &str) -> Result<Value, Error> {
    let parsed: Result<Value, _> = serde_json::from_str(body);

    let mut value = match parsed {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) if !(200..300).contains(&status) => {
            return Err(Error::Http {
                endpoint: endpoint.to_owned(),
                status,
                body: preview(body),
            });
        }
        Ok(other) => {
            return Err(Error::Deserialization {
                message: format!("expected a JSON object from {endpoint}, got {other}"),
                body: body.to_owned(),
            });
        }
        Err(e) => {
            return Err(Error::Deserialization {
                message: format!("{e} (body preview: {:?})", preview(body)),
                body: body.to_owned(),
            });
        }
    };

    match value.get("ok").and_then(Value::as_bool) {
        Some(true) => Ok(value.remove("result").unwrap_or(Value::Null)),
        Some(false) => {
            let message = value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("request failed")
                .to_owned();
            if message.to_lowercase().contains(NOT_LOGGED_IN) {
                Err(Error::NotLoggedIn { message })
            } else {
                Err(Error::Api {
                    endpoint: endpoint.to_owned(),
                    message,
                })
            }
        }
        None => {
            if let Some(data) = value.remove("data") {
                return Ok(data);
            }
            if !(200..300).contains(&status) {
                return Err(Error::Http {
                    endpoint: endpoint.to_owned(),
                    status,
                    body: preview(body),
                });
            }
            Err(Error::Deserialization {
                message: format!("response from {endpoint} has neither `ok` nor `data`"),
                body: body.to_owned(),
            })
        }
    }
}

fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
