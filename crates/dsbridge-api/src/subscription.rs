// Local side of event subscriptions.
//
// Maps event kind -> ordered handlers. The remote subscribe/unsubscribe
// calls are made by `Client`; this module keeps the map and the lock that
// serializes those compound operations.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use futures_util::future::BoxFuture;
use tokio::sync::{Mutex, MutexGuard};

use crate::model::{Event, EventKind};

/// Error type returned by event handlers. Logged at the dispatch boundary.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// A registered event callback.
///
/// Implemented for any `Fn(Arc<Event>) -> impl Future<Output = Result<(), HandlerError>>`,
/// so async closures work directly:
///
/// ```ignore
/// client.subscribe(EventKind::CallScene, |event: Arc<Event>| async move {
///     tracing::info!(scene = ?event.properties.scene_id, "scene called");
///     Ok(())
/// }).await?;
/// ```
pub trait EventHandler: Send + Sync + 'static {
    fn on_event(&self, event: Arc<Event>) -> BoxFuture<'static, Result<(), HandlerError>>;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    fn on_event(&self, event: Arc<Event>) -> BoxFuture<'static, Result<(), HandlerError>> {
        Box::pin(self(event))
    }
}

/// Identifies one handler so it can be removed without touching its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handler#{}", self.0)
    }
}

type HandlerList = Vec<(HandlerId, Arc<dyn EventHandler>)>;

/// Outcome of looking up a single handler before removing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandlerSlot {
    Missing,
    /// Other handlers for the same kind remain.
    Shared,
    /// Removing it leaves the kind without handlers.
    Last,
}

pub(crate) struct SubscriptionRegistry {
    subscription_id: u32,
    handlers: RwLock<HashMap<EventKind, HandlerList>>,
    /// Serializes subscribe / unsubscribe / resubscribe.
    ops: Mutex<()>,
    next_id: AtomicU64,
}

impl SubscriptionRegistry {
    pub(crate) fn new(subscription_id: u32) -> Self {
        Self {
            subscription_id,
            handlers: RwLock::new(HashMap::new()),
            ops: Mutex::new(()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn subscription_id(&self) -> u32 {
        self.subscription_id
    }

    pub(crate) async fn lock_ops(&self) -> MutexGuard<'_, ()> {
        self.ops.lock().await
    }

    // ── Reads (never block on remote calls) ──────────────────────────

    pub(crate) fn is_empty(&self) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    pub(crate) fn contains(&self, kind: &EventKind) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(kind)
    }

    /// Registered kinds, sorted for stable output.
    pub(crate) fn kinds(&self) -> Vec<EventKind> {
        let mut kinds: Vec<_> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        kinds.sort();
        kinds
    }

    /// Handlers for `kind`, in registration order.
    pub(crate) fn handlers_for(&self, kind: &EventKind) -> Vec<Arc<dyn EventHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default()
    }

    pub(crate) fn handler_count(&self, kind: &EventKind) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(kind)
            .map_or(0, Vec::len)
    }

    pub(crate) fn slot(&self, kind: &EventKind, id: HandlerId) -> HandlerSlot {
        let map = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        match map.get(kind) {
            Some(list) if list.iter().any(|(hid, _)| *hid == id) => {
                if list.len() == 1 {
                    HandlerSlot::Last
                } else {
                    HandlerSlot::Shared
                }
            }
            _ => HandlerSlot::Missing,
        }
    }

    // ── Writes (callers hold the ops guard) ──────────────────────────

    pub(crate) fn insert(&self, kind: EventKind, handler: Arc<dyn EventHandler>) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(kind)
            .or_default()
            .push((id, handler));
        id
    }

    /// Remove every handler for `kind`, returning how many there were.
    pub(crate) fn remove_kind(&self, kind: &EventKind) -> usize {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(kind)
            .map_or(0, |list| list.len())
    }

    /// Remove one handler; drops the kind entry when it was the last one.
    pub(crate) fn remove_one(&self, kind: &EventKind, id: HandlerId) -> bool {
        let mut map = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        let Some(list) = map.get_mut(kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(hid, _)| *hid != id);
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(kind);
        }
        removed
    }

    pub(crate) fn clear(&self) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

/// Random subscription id in `[0, 2^20)` so bridge instances sharing a
/// controller do not read each other's events.
pub(crate) fn random_subscription_id() -> u32 {
    let bits = uuid::Uuid::new_v4().as_u128() & 0xF_FFFF;
    u32::try_from(bits).unwrap_or_default()
}
