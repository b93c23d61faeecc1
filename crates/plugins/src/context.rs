//! What a plugin sees: its connection, every other connection, and the
//! shared host state, with every registration tracked for teardown.

use {
    crate::{
        Result,
        dedup::Deduplicator,
        host::{PluginInfo, Shared},
        plugin::{Teardown, teardown},
        schedule::{self, Schedule, TaskHandle, Tick, Zone},
    },
    futures::FutureExt,
    onebridge_client::{Connection, Event, SubscriptionId, event_handler, should_deliver},
    onebridge_config::BridgeConfig,
    onebridge_protocol::Sendable,
    std::{
        any::Any,
        panic::AssertUnwindSafe,
        sync::{Arc, Mutex},
        time::Duration,
    },
    tracing::{debug, trace, warn},
    uuid::Uuid,
};

// ── Teardown tracking ────────────────────────────────────────────────────────

/// Every cleanup a plugin registered, run once on disable.
#[derive(Default)]
pub(crate) struct TeardownSet {
    inner: Mutex<TeardownState>,
}

#[derive(Default)]
struct TeardownState {
    closed: bool,
    items: Vec<Teardown>,
}

impl TeardownSet {
    /// Track `item`. Once the set is closed the item runs right away.
    pub(crate) fn push(&self, item: Teardown) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if !state.closed {
            state.items.push(item);
            return;
        }
        drop(state);
        tokio::spawn(async move {
            if let Err(e) = item().await {
                warn!(error = %e, "late teardown failed");
            }
        });
    }

    pub(crate) fn close(&self) -> Vec<Teardown> {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.closed = true;
        std::mem::take(&mut state.items)
    }
}

// ── Subscriptions ────────────────────────────────────────────────────────────

/// Handlers registered by one [`PluginContext::handle`] call, one per
/// connection.
#[derive(Clone)]
pub struct Subscription {
    inner: Arc<SubscriptionInner>,
}

struct SubscriptionInner {
    category: String,
    entries: Mutex<Vec<(Arc<Connection>, SubscriptionId)>>,
}

impl Subscription {
    fn new(category: &str, entries: Vec<(Arc<Connection>, SubscriptionId)>) -> Self {
        Self {
            inner: Arc::new(SubscriptionInner {
                category: category.to_string(),
                entries: Mutex::new(entries),
            }),
        }
    }

    pub fn category(&self) -> &str {
        &self.inner.category
    }

    /// Remove the handler from every connection. Idempotent.
    pub fn unsubscribe(&self) {
        let entries = std::mem::take(
            &mut *self
                .inner
                .entries
                .lock()
                .unwrap_or_else(|e| e.into_inner()),
        );
        for (conn, id) in entries {
            conn.off(id);
        }
    }

    pub fn is_active(&self) -> bool {
        !self
            .inner
            .entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HandleOptions {
    /// Let each logical event through once across all connections.
    pub deduplicate: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self { deduplicate: true }
    }
}

/// Filters applied before a user handler runs on one connection.
struct Gate<F> {
    plugin: Arc<str>,
    category: String,
    scope: String,
    receiver: i64,
    bots: Arc<[Arc<Connection>]>,
    dedup: Option<Arc<Deduplicator>>,
    handler: Arc<F>,
}

impl<F, Fut> Gate<F>
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn deliver(&self, event: Arc<Event>) {
        let peers: Vec<i64> = self
            .bots
            .iter()
            .filter(|b| b.is_open())
            .filter_map(|b| b.self_id())
            .collect();
        if !should_deliver(&event, self.receiver, &peers) {
            trace!(plugin = %self.plugin, receiver = self.receiver, "event filtered");
            return;
        }
        if let Some(dedup) = &self.dedup
            && !dedup.check_and_mark(&event, &self.scope)
        {
            trace!(plugin = %self.plugin, receiver = self.receiver, "duplicate event skipped");
            return;
        }

        let handler = Arc::clone(&self.handler);
        let run = async move { handler(event).await };
        match AssertUnwindSafe(run).catch_unwind().await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => warn!(
                plugin = %self.plugin,
                category = %self.category,
                error = %e,
                "handler failed"
            ),
            Err(_) => warn!(
                plugin = %self.plugin,
                category = %self.category,
                "handler panicked"
            ),
        }
    }
}

// ── PluginContext ────────────────────────────────────────────────────────────

/// Handed to [`Plugin::setup`](crate::Plugin::setup). Cheap to clone.
///
/// Anything registered through the context (handlers, jobs, services,
/// cleanups) is undone when the plugin is disabled.
#[derive(Clone)]
pub struct PluginContext {
    plugin: Arc<str>,
    bot: Arc<Connection>,
    bots: Arc<[Arc<Connection>]>,
    shared: Arc<Shared>,
    teardowns: Arc<TeardownSet>,
}

impl PluginContext {
    pub(crate) fn new(
        plugin: &str,
        bots: Arc<[Arc<Connection>]>,
        bot: Arc<Connection>,
        shared: Arc<Shared>,
        teardowns: Arc<TeardownSet>,
    ) -> Self {
        Self {
            plugin: Arc::from(plugin),
            bot,
            bots,
            shared,
            teardowns,
        }
    }

    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// The connection this context's bound actions go through.
    pub fn bot(&self) -> &Arc<Connection> {
        &self.bot
    }

    pub fn bots(&self) -> &[Arc<Connection>] {
        &self.bots
    }

    pub fn self_id(&self) -> Option<i64> {
        self.bot.self_id()
    }

    /// One context per connection, sharing this plugin's registrations.
    pub fn contexts(&self) -> Vec<PluginContext> {
        self.bots
            .iter()
            .map(|bot| Self {
                bot: Arc::clone(bot),
                ..self.clone()
            })
            .collect()
    }

    /// Context bound to the connection with identity `self_id`.
    pub fn for_bot(&self, self_id: i64) -> Option<PluginContext> {
        self.contexts()
            .into_iter()
            .find(|ctx| ctx.self_id() == Some(self_id))
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn deduplicator(&self) -> &Arc<Deduplicator> {
        &self.shared.dedup
    }

    /// Time since the host was created.
    pub fn uptime(&self) -> Duration {
        self.shared.started_at.elapsed()
    }

    /// Plugins currently active in the host.
    pub fn active_plugins(&self) -> Vec<PluginInfo> {
        self.shared.active_plugins()
    }

    pub fn is_owner(&self, user_id: i64) -> bool {
        self.config().is_owner(user_id, self.self_id())
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.config().is_admin(user_id)
    }

    pub fn has_right(&self, user_id: i64) -> bool {
        self.config().has_right(user_id, self.self_id())
    }

    // ── Handlers ─────────────────────────────────────────────────────────────

    /// Run `handler` for events on `category` from every connection, once per
    /// logical event. See [`handle_with`](Self::handle_with).
    pub fn handle<F, Fut>(&self, category: &str, handler: F) -> Subscription
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.handle_with(category, HandleOptions::default(), handler)
    }

    /// Register `handler` on every connection. Events sent or caused by any
    /// bridged account are dropped, private messages only reach the
    /// connection they were addressed to, and with deduplication on, copies
    /// of the same event seen by several connections run the handler once.
    pub fn handle_with<F, Fut>(
        &self,
        category: &str,
        options: HandleOptions,
        handler: F,
    ) -> Subscription
    where
        F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        let scope = format!("{}:{category}:{}", self.plugin, Uuid::new_v4().simple());
        let dedup = options.deduplicate.then(|| Arc::clone(&self.shared.dedup));

        let mut entries = Vec::with_capacity(self.bots.len());
        for bot in self.bots.iter() {
            let Some(receiver) = bot.self_id() else {
                debug!(plugin = %self.plugin, conn = %bot.label(), "skipping unidentified connection");
                continue;
            };
            let gate = Arc::new(Gate {
                plugin: Arc::clone(&self.plugin),
                category: category.to_string(),
                scope: scope.clone(),
                receiver,
                bots: Arc::clone(&self.bots),
                dedup: dedup.clone(),
                handler: Arc::clone(&handler),
            });
            let id = bot.on(
                category,
                event_handler(move |event| {
                    let gate = Arc::clone(&gate);
                    async move { gate.deliver(event).await }
                }),
            );
            entries.push((Arc::clone(bot), id));
        }

        let subscription = Subscription::new(category, entries);
        let tracked = subscription.clone();
        self.on_teardown(move || async move {
            tracked.unsubscribe();
            Ok(())
        });
        subscription
    }

    // ── Scheduling ───────────────────────────────────────────────────────────

    /// Run `job` on a cron expression (5 fields, or 6/7 with seconds), read
    /// in the configured timezone or local time.
    pub fn cron<F, Fut>(&self, expr: &str, job: F) -> Result<Arc<TaskHandle>>
    where
        F: Fn(PluginContext, Tick) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let zone = Zone::from_name(self.config().timezone.as_deref())?;
        self.schedule(Schedule::cron_in(expr, zone)?, job)
    }

    /// Run `job` every `interval`, first after one interval.
    pub fn every<F, Fut>(&self, interval: Duration, job: F) -> Result<Arc<TaskHandle>>
    where
        F: Fn(PluginContext, Tick) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.schedule(Schedule::every(interval)?, job)
    }

    fn schedule<F, Fut>(&self, schedule: Schedule, job: F) -> Result<Arc<TaskHandle>>
    where
        F: Fn(PluginContext, Tick) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let label = format!("{}: {schedule}", self.plugin);
        let ctx = self.clone();
        let handle = Arc::new(schedule::spawn(label, schedule, move |tick| {
            job(ctx.clone(), tick)
        }));
        let tracked = Arc::clone(&handle);
        self.on_teardown(move || async move {
            tracked.cancel();
            Ok(())
        });
        Ok(handle)
    }

    // ── Services ─────────────────────────────────────────────────────────────

    /// Share `value` with other plugins under `name` until this plugin is
    /// disabled. Fails if another plugin already registered the name.
    pub fn add_service<T: Any + Send + Sync>(&self, name: &str, value: T) -> Result<Arc<T>> {
        self.add_service_with(name, value, false)
    }

    /// Like [`add_service`](Self::add_service); with `cover`, replaces an
    /// existing service of the same name.
    pub fn add_service_with<T: Any + Send + Sync>(
        &self,
        name: &str,
        value: T,
        cover: bool,
    ) -> Result<Arc<T>> {
        let value = Arc::new(value);
        self.shared.services.insert(name, Arc::clone(&value), cover)?;

        let shared = Arc::downgrade(&self.shared);
        let name = name.to_string();
        let tracked = Arc::clone(&value);
        self.on_teardown(move || async move {
            if let Some(shared) = shared.upgrade() {
                shared.services.remove_if_same(&name, &tracked);
            }
            Ok(())
        });
        Ok(value)
    }

    pub fn service<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.shared.services.get(name)
    }

    /// Run `f` when the plugin is disabled.
    pub fn on_teardown<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.teardowns.push(teardown(f));
    }

    // ── Notifications ────────────────────────────────────────────────────────

    /// This context's connection while it is open, else the first open one.
    fn sender(&self) -> &Arc<Connection> {
        if self.bot.is_open() {
            return &self.bot;
        }
        self.bots
            .iter()
            .find(|b| b.is_open())
            .unwrap_or(&self.bot)
    }

    /// Message every configured owner.
    pub async fn notice_owners(&self, content: impl Into<Sendable>) -> usize {
        let owners = self.config().owners.clone();
        self.notice_friends(&owners, content).await
    }

    /// Message the first configured owner.
    pub async fn notice_main_owner(&self, content: impl Into<Sendable>) -> usize {
        match self.config().main_owner() {
            Some(owner) => self.notice_friends(&[owner], content).await,
            None => {
                debug!(plugin = %self.plugin, "no main owner configured");
                0
            },
        }
    }

    pub async fn notice_admins(&self, content: impl Into<Sendable>) -> usize {
        let admins = self.config().admins.clone();
        self.notice_friends(&admins, content).await
    }

    /// Send `content` to each group in turn, pausing between sends. Returns
    /// how many sends succeeded. Blank content is not sent.
    pub async fn notice_groups(&self, group_ids: &[i64], content: impl Into<Sendable>) -> usize {
        let content = content.into();
        let mut sent = 0;
        for (i, &group_id) in group_ids.iter().enumerate() {
            if content.is_blank() {
                break;
            }
            if i > 0 {
                tokio::time::sleep(self.shared.notice_delay).await;
            }
            match self.sender().send_group_msg(group_id, content.clone()).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(plugin = %self.plugin, group_id, error = %e, "group notice failed"),
            }
        }
        sent
    }

    /// Send `content` to each user in turn, pausing between sends.
    pub async fn notice_friends(&self, user_ids: &[i64], content: impl Into<Sendable>) -> usize {
        let content = content.into();
        let mut sent = 0;
        for (i, &user_id) in user_ids.iter().enumerate() {
            if content.is_blank() {
                break;
            }
            if i > 0 {
                tokio::time::sleep(self.shared.notice_delay).await;
            }
            match self.sender().send_private_msg(user_id, content.clone()).await {
                Ok(_) => sent += 1,
                Err(e) => warn!(plugin = %self.plugin, user_id, error = %e, "private notice failed"),
            }
        }
        sent
    }
}
