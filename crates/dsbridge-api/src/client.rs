// Resilient dSS client
//
// The only entry point the layers above use. Wraps `Transport` with login,
// bounded retries and re-subscription after a forced re-login, owns the
// subscription map and starts/stops the event loop.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::Error;
use crate::event_loop::{self, EventLoopConfig};
use crate::model::{Event, EventGetResponse, EventKind};
use crate::session::{Credentials, Session, Token};
use crate::subscription::{
    EventHandler, HandlerId, HandlerSlot, SubscriptionRegistry, random_subscription_id,
};
use crate::transport::{Params, Transport, TransportConfig};

const EVENT_SUBSCRIBE: &str = "json/event/subscribe";
const EVENT_UNSUBSCRIBE: &str = "json/event/unsubscribe";
const EVENT_GET: &str = "json/event/get";

/// HTTP slack on top of the server-side long-poll timeout.
const POLL_SLACK: Duration = Duration::from_secs(5);

// ── Configuration ────────────────────────────────────────────────────

/// Retry ceiling for a single call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first. Values below 1 act as 1.
    pub max_retries: u32,
    /// Fixed sleep between attempts.
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

/// Everything needed to build a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: Url,
    pub credentials: Credentials,
    pub transport: TransportConfig,
    pub retry: RetryPolicy,
    pub events: EventLoopConfig,
}

impl ClientConfig {
    pub fn new(base_url: Url, credentials: Credentials) -> Self {
        Self {
            base_url,
            credentials,
            transport: TransportConfig::default(),
            retry: RetryPolicy::default(),
            events: EventLoopConfig::default(),
        }
    }
}

// ── Client ───────────────────────────────────────────────────────────

/// Cheaply cloneable handle to one controller session.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    transport: Transport,
    session: Session,
    retry: RetryPolicy,
    events: EventLoopConfig,
    subscriptions: SubscriptionRegistry,
    event_loop: Mutex<Option<EventLoopHandle>>,
}

struct EventLoopHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Whether the resubscribe step must take the ops lock itself or runs
/// under a guard the caller already holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpsLock {
    Acquire,
    Held,
}

/// Outcome of one attempt inside the retry loop.
enum Attempt {
    Retry(Error),
    Fatal(Error),
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let transport = Transport::new(config.base_url, &config.transport)?;
        Ok(Self::with_transport(
            transport,
            config.credentials,
            config.retry,
            config.events,
        ))
    }

    /// Build a client around an existing transport.
    pub fn with_transport(
        transport: Transport,
        credentials: Credentials,
        retry: RetryPolicy,
        events: EventLoopConfig,
    ) -> Self {
        let subscription_id = events
            .subscription_id
            .unwrap_or_else(random_subscription_id);
        Self {
            inner: Arc::new(ClientInner {
                transport,
                session: Session::new(credentials),
                retry,
                events,
                subscriptions: SubscriptionRegistry::new(subscription_id),
                event_loop: Mutex::new(None),
            }),
        }
    }

    pub fn base_url(&self) -> &Url {
        self.inner.transport.base_url()
    }

    pub(crate) fn transport(&self) -> &Transport {
        &self.inner.transport
    }

    pub(crate) fn session(&self) -> &Session {
        &self.inner.session
    }

    /// The `subscriptionID` this client uses for all event calls.
    pub fn subscription_id(&self) -> u32 {
        self.inner.subscriptions.subscription_id()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.inner.retry
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Log in and start the event loop. Idempotent.
    pub async fn connect(&self) -> Result<(), Error> {
        let (token, fresh) = self.inner.session.ensure(&self.inner.transport).await?;
        if fresh {
            self.resubscribe_all(&token, OpsLock::Acquire).await;
        }

        let mut slot = self.inner.event_loop.lock().await;
        if slot.as_ref().is_some_and(|h| !h.task.is_finished()) {
            debug!("event loop already running");
            return Ok(());
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(event_loop::run(
            self.clone(),
            self.inner.events.clone(),
            cancel.clone(),
        ));
        *slot = Some(EventLoopHandle { cancel, task });
        info!(url = %self.base_url(), "connected to dSS");
        Ok(())
    }

    /// Stop the event loop, drop every subscription remotely and locally,
    /// log out and forget the token. Remote failures are logged, not returned.
    pub async fn disconnect(&self) {
        let handle = self.inner.event_loop.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel.cancel();
            if let Err(e) = handle.task.await {
                warn!(error = %e, "event loop task ended abnormally");
            }
        }

        {
            let _ops = self.inner.subscriptions.lock_ops().await;
            let kinds = self.inner.subscriptions.kinds();
            if let Some(token) = self.inner.session.current_token().await {
                for kind in &kinds {
                    if let Err(e) = self.single_event_call(EVENT_UNSUBSCRIBE, kind, &token).await {
                        warn!(%kind, error = %e, "remote unsubscribe failed during disconnect");
                    }
                }
            }
            self.inner.subscriptions.clear();
        }

        if let Err(e) = self.logout().await {
            debug!(error = %e, "logout failed");
        }
        info!("disconnected from dSS");
    }

    /// `true` while the event loop task is alive.
    pub async fn is_running(&self) -> bool {
        self.inner
            .event_loop
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.task.is_finished())
    }

    // ── Calls ────────────────────────────────────────────────────────

    /// GET `endpoint` with retry and re-authentication; returns the `result` payload.
    pub async fn call(&self, endpoint: &str, params: &Params) -> Result<Value, Error> {
        self.call_inner(Method::GET, endpoint, params, None, None, OpsLock::Acquire)
            .await
    }

    /// POST `endpoint` with an optional JSON body. Same policy as [`Client::call`].
    pub async fn call_post(
        &self,
        endpoint: &str,
        params: &Params,
        body: Option<&Value>,
    ) -> Result<Value, Error> {
        self.call_inner(Method::POST, endpoint, params, body, None, OpsLock::Acquire)
            .await
    }

    /// [`Client::call`] and decode the payload into `T`.
    pub async fn call_as<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &Params,
    ) -> Result<T, Error> {
        let value = self.call(endpoint, params).await?;
        decode(endpoint, value)
    }

    async fn call_inner(
        &self,
        method: Method,
        endpoint: &str,
        params: &Params,
        body: Option<&Value>,
        timeout: Option<Duration>,
        ops: OpsLock,
    ) -> Result<Value, Error> {
        let attempts = self.inner.retry.max_retries.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match self
                .attempt(method.clone(), endpoint, params, body, timeout, ops)
                .await
            {
                Ok(value) => return Ok(value),
                Err(Attempt::Fatal(e)) => return Err(e),
                Err(Attempt::Retry(e)) => e,
            };

            if attempt >= attempts {
                warn!(endpoint, attempts, error = %err, "giving up");
                return Err(Error::ExhaustedRetries {
                    attempts,
                    source: Box::new(err),
                });
            }
            warn!(endpoint, attempt, error = %err, "retrying after {:?}", self.inner.retry.retry_delay);
            tokio::time::sleep(self.inner.retry.retry_delay).await;
        }
    }

    async fn attempt(
        &self,
        method: Method,
        endpoint: &str,
        params: &Params,
        body: Option<&Value>,
        timeout: Option<Duration>,
        ops: OpsLock,
    ) -> Result<Value, Attempt> {
        let (token, fresh) = self
            .inner
            .session
            .ensure(&self.inner.transport)
            .await
            .map_err(Attempt::Retry)?;

        if fresh {
            self.resubscribe_all(&token, ops).await;
        }

        match self
            .inner
            .transport
            .send(method, endpoint, params, Some(token.expose()), body, timeout)
            .await
        {
            Ok(value) => Ok(value),
            Err(e) if e.is_auth_expired() => {
                self.inner.session.invalidate(&token).await;
                Err(Attempt::Retry(e))
            }
            Err(e) if e.is_transient() => Err(Attempt::Retry(e)),
            Err(e) => Err(Attempt::Fatal(e)),
        }
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `handler` for `kind`.
    ///
    /// The first handler for a kind triggers the remote subscribe; the handler
    /// only becomes active once that call succeeds. Further handlers for the
    /// same kind are local only.
    pub async fn subscribe(
        &self,
        kind: impl Into<EventKind>,
        handler: impl EventHandler,
    ) -> Result<HandlerId, Error> {
        let kind = kind.into();
        let _ops = self.inner.subscriptions.lock_ops().await;

        if !self.inner.subscriptions.contains(&kind) {
            self.remote_event_call(EVENT_SUBSCRIBE, &kind).await?;
            info!(%kind, "subscribed to event");
        }
        let id = self.inner.subscriptions.insert(kind.clone(), Arc::new(handler));
        debug!(%kind, %id, "handler registered");
        Ok(id)
    }

    /// Remove every handler for `kind` and the remote subscription.
    ///
    /// When the remote call fails the handlers stay registered.
    pub async fn unsubscribe(&self, kind: impl Into<EventKind>) -> Result<(), Error> {
        let kind = kind.into();
        let _ops = self.inner.subscriptions.lock_ops().await;

        if !self.inner.subscriptions.contains(&kind) {
            return Err(Error::NotSubscribed { kind });
        }
        self.remote_event_call(EVENT_UNSUBSCRIBE, &kind).await?;
        let removed = self.inner.subscriptions.remove_kind(&kind);
        info!(%kind, handlers = removed, "unsubscribed from event");
        Ok(())
    }

    /// Remove a single handler. The remote subscription goes away with the
    /// last handler of its kind.
    pub async fn remove_handler(
        &self,
        kind: impl Into<EventKind>,
        id: HandlerId,
    ) -> Result<(), Error> {
        let kind = kind.into();
        let _ops = self.inner.subscriptions.lock_ops().await;

        match self.inner.subscriptions.slot(&kind, id) {
            HandlerSlot::Missing => Err(Error::NotSubscribed { kind }),
            HandlerSlot::Shared => {
                self.inner.subscriptions.remove_one(&kind, id);
                debug!(%kind, %id, "handler removed");
                Ok(())
            }
            HandlerSlot::Last => {
                self.remote_event_call(EVENT_UNSUBSCRIBE, &kind).await?;
                self.inner.subscriptions.remove_one(&kind, id);
                info!(%kind, "last handler removed, unsubscribed from event");
                Ok(())
            }
        }
    }

    /// Kinds with at least one handler, sorted.
    pub fn subscribed_kinds(&self) -> Vec<EventKind> {
        self.inner.subscriptions.kinds()
    }

    pub fn handler_count(&self, kind: &EventKind) -> usize {
        self.inner.subscriptions.handler_count(kind)
    }

    pub(crate) fn has_subscriptions(&self) -> bool {
        !self.inner.subscriptions.is_empty()
    }

    pub(crate) fn handlers_for(&self, kind: &EventKind) -> Vec<Arc<dyn EventHandler>> {
        self.inner.subscriptions.handlers_for(kind)
    }

    /// Subscribe/unsubscribe through the retry loop. Caller holds the ops guard.
    async fn remote_event_call(&self, endpoint: &str, kind: &EventKind) -> Result<(), Error> {
        let params = self.event_params(kind);
        self.call_inner(Method::GET, endpoint, &params, None, None, OpsLock::Held)
            .await
            .map(drop)
    }

    /// One attempt with a known token, no retry.
    async fn single_event_call(
        &self,
        endpoint: &str,
        kind: &EventKind,
        token: &Token,
    ) -> Result<(), Error> {
        let params = self.event_params(kind);
        self.inner
            .transport
            .send(Method::GET, endpoint, &params, Some(token.expose()), None, None)
            .await
            .map(drop)
    }

    fn event_params(&self, kind: &EventKind) -> Params {
        Params::new()
            .with("name", kind)
            .with("subscriptionID", self.subscription_id())
    }

    /// Re-issue the remote subscribe for every registered kind after a fresh
    /// login. Works from a snapshot so the map stays readable; kinds whose
    /// re-subscription fails are dropped locally.
    async fn resubscribe_all(&self, token: &Token, ops: OpsLock) {
        let _guard = match ops {
            OpsLock::Acquire => Some(self.inner.subscriptions.lock_ops().await),
            OpsLock::Held => None,
        };

        let kinds = self.inner.subscriptions.kinds();
        if kinds.is_empty() {
            return;
        }
        info!(count = kinds.len(), "re-subscribing events after login");

        for kind in kinds {
            if let Err(e) = self.single_event_call(EVENT_SUBSCRIBE, &kind, token).await {
                let dropped = self.inner.subscriptions.remove_kind(&kind);
                error!(%kind, handlers = dropped, error = %e, "re-subscription failed, dropping handlers");
            }
        }
    }

    // ── Events ───────────────────────────────────────────────────────

    /// One long-poll for the next batch of events.
    pub(crate) async fn poll_events(&self, poll_timeout: Duration) -> Result<Vec<Event>, Error> {
        let timeout_ms = u64::try_from(poll_timeout.as_millis()).unwrap_or(u64::MAX);
        let params = Params::new()
            .with("subscriptionID", self.subscription_id())
            .with("timeout", timeout_ms);
        let value = self
            .call_inner(
                Method::GET,
                EVENT_GET,
                &params,
                None,
                Some(poll_timeout + POLL_SLACK),
                OpsLock::Acquire,
            )
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let resp: EventGetResponse = decode(EVENT_GET, value)?;
        let events = resp
            .decode_each()
            .into_iter()
            .enumerate()
            .filter_map(|(index, event)| match event {
                Ok(event) => Some(event),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed event");
                    None
                }
            })
            .collect();
        Ok(events)
    }
}

/// Decode a `result` payload, keeping the raw JSON on failure.
pub(crate) fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> Result<T, Error> {
    let body = value.to_string();
    serde_json::from_value(value).map_err(|e| Error::Deserialization {
        message: format!("{endpoint}: {e}"),
        body,
    })
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url().as_str())
            .field("subscription_id", &self.subscription_id())
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn client() -> Client {
        let config = ClientConfig {
            events: EventLoopConfig {
                subscription_id: Some(4242),
                ..EventLoopConfig::default()
            },
            ..ClientConfig::new(
                Url::parse("https://dss.local:8080").expect("valid URL"),
                Credentials::ApiKey(SecretString::from("key".to_owned())),
            )
        };
        Client::new(config).expect("client builds")
    }

    #[test]
    fn default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.retry_delay, Duration::from_secs(2));
    }

    #[test]
    fn configured_subscription_id_is_used() {
        let client = client();
        assert_eq!(client.subscription_id(), 4242);
        let params = client.event_params(&EventKind::CallScene);
        assert_eq!(params.get("name"), Some("callScene"));
        assert_eq!(params.get("subscriptionID"), Some("4242"));
    }

    #[test]
    fn decode_failure_keeps_body() {
        let err = decode::<EventGetResponse>(EVENT_GET, serde_json::json!({"events": 5}))
            .expect_err("events must be an array");
        match err {
            Error::Deserialization { message, body } => {
                assert!(message.starts_with(EVENT_GET));
                assert_eq!(body, r#"{"events":5}"#);
            }
            other => panic!("expected Deserialization, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_unknown_kind_is_an_error() {
        let client = client();
        let err = client
            .unsubscribe(EventKind::UndoScene)
            .await
            .expect_err("nothing subscribed");
        assert!(matches!(err, Error::NotSubscribed { kind } if kind == EventKind::UndoScene));
        assert!(!client.is_running().await);
    }
}
