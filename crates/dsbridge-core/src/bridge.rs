// ── Bridge lifecycle ──
//
// Owns the API client and the apartment registry for one controller.
// `connect()` logs in, starts the event loop and loads the topology and
// the apartment status; an apartment that cannot be loaded aborts startup
// and tears the session down again.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{error, info};

use dsbridge_api::model::EventKind;
use dsbridge_api::{Client, EventHandler, HandlerId, Params};

use crate::config::BridgeConfig;
use crate::error::CoreError;
use crate::registry::{ApartmentRegistry, OutputChange};

// ── ConnectionState ──────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

// ── Bridge ───────────────────────────────────────────────────────

/// Main entry point for consumers.
///
/// Cheaply cloneable. Handlers may be registered before or after
/// [`connect()`](Self::connect); the client resubscribes them on every
/// fresh login.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    client: Client,
    registry: ApartmentRegistry,
    connection_state: watch::Sender<ConnectionState>,
}

impl Bridge {
    /// Build the client from configuration. Does NOT connect.
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        let client = Client::new(config.client_config())?;
        let registry = ApartmentRegistry::new(client.clone());
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Ok(Self {
            inner: Arc::new(BridgeInner {
                config,
                client,
                registry,
                connection_state,
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    /// The resilient API client, for typed endpoint calls.
    pub fn client(&self) -> &Client {
        &self.inner.client
    }

    pub fn registry(&self) -> &ApartmentRegistry {
        &self.inner.registry
    }

    pub fn state(&self) -> ConnectionState {
        *self.inner.connection_state.borrow()
    }

    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Log in, start event delivery and load the apartment topology and status.
    pub async fn connect(&self) -> Result<(), CoreError> {
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Connecting);
        info!(url = %self.inner.config.url, "connecting to controller");

        if let Err(e) = self.inner.client.connect().await {
            let _ = self.inner.connection_state.send(ConnectionState::Failed);
            return Err(e.into());
        }

        if let Err(e) = self.load_apartment().await {
            error!(error = %e, "apartment could not be loaded");
            self.inner.client.disconnect().await;
            let _ = self.inner.connection_state.send(ConnectionState::Failed);
            return Err(e);
        }

        let _ = self.inner.connection_state.send(ConnectionState::Connected);
        info!("bridge connected");
        Ok(())
    }

    async fn load_apartment(&self) -> Result<(), CoreError> {
        self.inner.registry.reload().await?;
        self.inner.registry.reload_status().await?;
        Ok(())
    }

    /// Stop the event loop, drop subscriptions and end the session.
    pub async fn disconnect(&self) {
        self.inner.client.disconnect().await;
        let _ = self
            .inner
            .connection_state
            .send(ConnectionState::Disconnected);
        info!("bridge disconnected");
    }

    // ── Passthroughs ─────────────────────────────────────────────

    pub async fn subscribe(
        &self,
        kind: impl Into<EventKind>,
        handler: impl EventHandler,
    ) -> Result<HandlerId, CoreError> {
        Ok(self.inner.client.subscribe(kind, handler).await?)
    }

    pub async fn unsubscribe(&self, kind: impl Into<EventKind>) -> Result<(), CoreError> {
        Ok(self.inner.client.unsubscribe(kind).await?)
    }

    /// One resilient call against an arbitrary endpoint.
    pub async fn call(&self, endpoint: &str, params: &Params) -> Result<Value, CoreError> {
        Ok(self.inner.client.call(endpoint, params).await?)
    }

    /// Re-fetch the topology while connected.
    pub async fn reload_topology(&self) -> Result<(), CoreError> {
        self.inner.registry.reload().await.map(|_| ())
    }

    /// Re-fetch the apartment status and report changed output targets.
    pub async fn reload_status(&self) -> Result<Vec<OutputChange>, CoreError> {
        self.inner.registry.reload_status().await
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("url", &self.inner.config.url.as_str())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
