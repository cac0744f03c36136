// Background long-poll loop.
//
// Idle while nothing is subscribed, otherwise polls `json/event/get` through
// the resilient caller and fans every event out to its handlers. Handlers
// run as independent tasks, bounded by a semaphore; panics and errors are
// caught here and logged with the event kind.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::client::Client;
use crate::model::{Event, EventKind};
use crate::subscription::HandlerError;

/// Tuning for the event loop.
#[derive(Debug, Clone)]
pub struct EventLoopConfig {
    /// Fixed subscription id; `None` picks a random one in `[0, 2^20)`.
    pub subscription_id: Option<u32>,
    /// Server-side long-poll timeout. The HTTP request timeout is this plus a
    /// few seconds of slack.
    pub poll_timeout: Duration,
    /// Sleep between checks while no kind is subscribed.
    pub idle_interval: Duration,
    /// Sleep after a failed poll.
    pub error_backoff: Duration,
    /// Upper bound on handlers running at once.
    pub max_concurrent_handlers: usize,
}

impl Default for EventLoopConfig {
    fn default() -> Self {
        Self {
            subscription_id: None,
            poll_timeout: Duration::from_secs(10),
            idle_interval: Duration::from_secs(1),
            error_backoff: Duration::from_secs(1),
            max_concurrent_handlers: 64,
        }
    }
}

type HandlerOutcome = (EventKind, Result<Result<(), HandlerError>, Box<dyn Any + Send>>);

/// Runs until `cancel` fires, then waits for running handlers.
pub(crate) async fn run(client: Client, config: EventLoopConfig, cancel: CancellationToken) {
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent_handlers.max(1)));
    let mut tasks: JoinSet<HandlerOutcome> = JoinSet::new();

    info!(
        subscription_id = client.subscription_id(),
        "event loop started"
    );

    loop {
        while let Some(done) = tasks.try_join_next() {
            log_outcome(done);
        }

        if !client.has_subscriptions() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(config.idle_interval) => continue,
            }
        }

        let polled = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = client.poll_events(config.poll_timeout) => result,
        };

        match polled {
            Ok(events) => {
                if !events.is_empty() {
                    debug!(count = events.len(), "received event batch");
                }
                for event in events {
                    if !dispatch(&client, event, &semaphore, &mut tasks, &cancel).await {
                        break;
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "event poll failed");
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(config.error_backoff) => {}
                }
            }
        }
    }

    if !tasks.is_empty() {
        debug!(running = tasks.len(), "waiting for event handlers to finish");
    }
    while let Some(done) = tasks.join_next().await {
        log_outcome(done);
    }
    info!("event loop stopped");
}

/// Spawn one task per handler. Returns `false` once cancelled.
async fn dispatch(
    client: &Client,
    event: Event,
    semaphore: &Arc<Semaphore>,
    tasks: &mut JoinSet<HandlerOutcome>,
    cancel: &CancellationToken,
) -> bool {
    let handlers = client.handlers_for(&event.name);
    if handlers.is_empty() {
        warn!(kind = %event.name, "no handler registered, skipping event");
        return true;
    }

    trace!(kind = %event.name, handlers = handlers.len(), "dispatching event");
    let event = Arc::new(event);

    for handler in handlers {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return false,
            permit = Arc::clone(semaphore).acquire_owned() => permit,
        };
        let Ok(permit) = permit else {
            return false;
        };

        let event = Arc::clone(&event);
        tasks.spawn(async move {
            let _permit = permit;
            let kind = event.name.clone();
            let outcome = AssertUnwindSafe(handler.on_event(event))
                .catch_unwind()
                .await;
            (kind, outcome)
        });
    }
    true
}

fn log_outcome(done: Result<HandlerOutcome, tokio::task::JoinError>) {
    match done {
        Ok((_, Ok(Ok(())))) => {}
        Ok((kind, Ok(Err(e)))) => error!(%kind, error = %e, "event handler failed"),
        Ok((kind, Err(panic))) => {
            error!(%kind, panic = panic_message(panic.as_ref()), "event handler panicked");
        }
        Err(e) => error!(error = %e, "event handler task aborted"),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
