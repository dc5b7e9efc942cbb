//! Typed domain events.
//!
//! Producers `raise` an event and move on; listeners run on their own tokio
//! tasks. Listeners for one event type start in registration order but may
//! finish in any order.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::errors::TenantryError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

static LISTENER_ID: AtomicU64 = AtomicU64::new(1);

fn next_listener_id() -> ListenerId {
    ListenerId(LISTENER_ID.fetch_add(1, Ordering::Relaxed))
}

/// A domain event. The name is only used for logs.
pub trait Event: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Cooperative cancellation shared by every listener of one dispatch.
///
/// Long-running listeners should check it between steps.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Listener signature (async, owns its inputs so it can run on another task).
pub type EventHandler<E> =
    Arc<dyn Fn(Arc<E>, CancelFlag) -> BoxFuture<'static, Result<()>> + Send + Sync>;

struct ListenerEntry {
    id: ListenerId,
    once: bool,
    // always an `EventHandler<E>` for the `TypeId` it is filed under
    handler: Box<dyn Any + Send + Sync>,
}

/// Typed event bus.
///
/// - listeners are keyed by event type and kept in registration order
/// - `raise` is synchronous: it snapshots the listeners and spawns one task
///   per listener on the current tokio runtime, then returns
/// - no lock is held while listeners run
#[derive(Default)]
pub struct EventBus {
    listeners: RwLock<HashMap<TypeId, Vec<ListenerEntry>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn listen<E, F, Fut>(&self, f: F) -> ListenerId
    where
        E: Event,
        F: Fn(Arc<E>, CancelFlag) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.insert::<E>(Self::boxed(f), false)
    }

    /// Runs for the next matching event only.
    pub fn listen_once<E, F, Fut>(&self, f: F) -> ListenerId
    where
        E: Event,
        F: Fn(Arc<E>, CancelFlag) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.insert::<E>(Self::boxed(f), true)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut map = self.listeners.write();
        let mut removed = false;
        for entries in map.values_mut() {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            removed |= before != entries.len();
        }
        removed
    }

    pub fn listener_count<E: Event>(&self) -> usize {
        self.listeners
            .read()
            .get(&TypeId::of::<E>())
            .map_or(0, |entries| entries.len())
    }

    /// Hand `event` to every listener and return without waiting.
    ///
    /// Fails only when called outside a tokio runtime; listener errors are
    /// logged, never returned.
    pub fn raise<E: Event>(&self, event: E) -> Result<Dispatch> {
        let runtime = Handle::try_current().map_err(|e| {
            TenantryError::general_error(format!(
                "cannot raise {} outside a tokio runtime",
                E::NAME
            ))
            .with_source(e.into())
            .into_anyhow()
        })?;

        let handlers = self.snapshot::<E>();
        let event = Arc::new(event);
        let cancel = CancelFlag::new();

        tracing::debug!(event = E::NAME, listeners = handlers.len(), "raising event");

        let tasks = handlers
            .into_iter()
            .enumerate()
            .map(|(index, handler)| {
                let event = Arc::clone(&event);
                let cancel = cancel.clone();
                runtime.spawn(async move {
                    if cancel.is_cancelled() {
                        return;
                    }
                    if let Err(err) = handler(event, cancel).await {
                        tracing::warn!(
                            event = E::NAME,
                            listener = index,
                            error = %err,
                            "event listener failed"
                        );
                    }
                })
            })
            .collect();

        Ok(Dispatch {
            event: E::NAME,
            tasks,
            cancel,
        })
    }

    fn boxed<E, F, Fut>(f: F) -> EventHandler<E>
    where
        E: Event,
        F: Fn(Arc<E>, CancelFlag) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        Arc::new(
            move |event: Arc<E>, cancel: CancelFlag| -> BoxFuture<'static, Result<()>> {
                Box::pin(f(event, cancel))
            },
        )
    }

    fn insert<E: Event>(&self, handler: EventHandler<E>, once: bool) -> ListenerId {
        let id = next_listener_id();
        self.listeners
            .write()
            .entry(TypeId::of::<E>())
            .or_default()
            .push(ListenerEntry {
                id,
                once,
                handler: Box::new(handler),
            });
        id
    }

    /// Collect handlers for `E` and drop `once` listeners in the same write.
    fn snapshot<E: Event>(&self) -> Vec<EventHandler<E>> {
        let mut map = self.listeners.write();
        let Some(entries) = map.get_mut(&TypeId::of::<E>()) else {
            return Vec::new();
        };

        let handlers = entries
            .iter()
            .filter_map(|e| e.handler.downcast_ref::<EventHandler<E>>().cloned())
            .collect();
        entries.retain(|e| !e.once);
        handlers
    }
}

/// Handle to the tasks spawned by one [`EventBus::raise`].
///
/// Dropping it detaches the tasks.
pub struct Dispatch {
    event: &'static str,
    tasks: Vec<JoinHandle<()>>,
    cancel: CancelFlag,
}

impl Dispatch {
    pub fn event(&self) -> &'static str {
        self.event
    }

    /// Number of listeners the event was handed to.
    pub fn listeners(&self) -> usize {
        self.tasks.len()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Wait for every listener to finish.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(err) = task.await {
                tracing::warn!(event = self.event, error = %err, "event listener task aborted");
            }
        }
    }
}
