use {
    crate::Event,
    futures::{FutureExt, future::BoxFuture},
    std::{
        panic::AssertUnwindSafe,
        sync::{
            Arc, Mutex,
            atomic::{AtomicU64, Ordering},
        },
    },
    tracing::{trace, warn},
};

/// Async event handler stored on a bus.
pub type EventHandler = Arc<dyn Fn(Arc<Event>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Box an async closure into an [`EventHandler`].
pub fn event_handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |event| f(event).boxed())
}

/// Token returned by [`EventBus::on`], used to remove that one handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry {
    id: SubscriptionId,
    path: String,
    handler: EventHandler,
}

/// Per-connection handler list keyed by category path.
#[derive(Default)]
pub struct EventBus {
    next_id: AtomicU64,
    entries: Mutex<Vec<Entry>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `handler` to `path` (e.g. `message`, `notice.group.ban`).
    pub fn on(&self, path: impl Into<String>, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(Entry {
            id,
            path: path.into(),
            handler,
        });
        id
    }

    /// Remove a handler. Returns `false` if it was already gone.
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|e| e.id != id);
        entries.len() != before
    }

    pub fn handler_count(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Deliver `event` once per path, general paths first. Handlers run one
    /// at a time in subscription order; a panicking handler is logged and
    /// skipped.
    pub async fn emit(&self, event: Arc<Event>) {
        for path in event.paths() {
            let handlers: Vec<EventHandler> = {
                let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
                entries
                    .iter()
                    .filter(|e| e.path == path)
                    .map(|e| Arc::clone(&e.handler))
                    .collect()
            };
            if handlers.is_empty() {
                continue;
            }
            trace!(path = %path, handlers = handlers.len(), "emitting event");
            for handler in handlers {
                let run = AssertUnwindSafe(handler(Arc::clone(&event))).catch_unwind();
                if run.await.is_err() {
                    warn!(path = %path, "event handler panicked");
                }
            }
        }
    }
}
