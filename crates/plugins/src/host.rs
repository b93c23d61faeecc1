//! Plugin lifecycle: enable, disable, tiered startup, shutdown.
//!
//! A plugin name moves through `enabling → active → disabling` and back to
//! unregistered. While a name is in any of those states it cannot be enabled
//! again. Failures are contained to the plugin that caused them.

use {
    crate::{
        Error, Result,
        context::{PluginContext, TeardownSet},
        dedup::Deduplicator,
        plugin::{Plugin, PluginDescriptor, PluginKind, PluginLoader, Teardown},
        services::ServiceRegistry,
    },
    futures::{FutureExt, future::join_all},
    onebridge_client::Connection,
    onebridge_config::BridgeConfig,
    std::{
        any::Any,
        collections::{BTreeMap, HashMap},
        panic::AssertUnwindSafe,
        sync::{Arc, Mutex},
        time::{Duration, Instant},
    },
    tracing::{Instrument, debug, info, info_span, warn},
};

/// Pause between consecutive operator notifications.
const NOTICE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Enabling,
    Active,
    Disabling,
}

/// An active plugin as reported by [`PluginHost::list`].
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub descriptor: PluginDescriptor,
    pub kind: PluginKind,
    pub active_for: Duration,
}

struct Registration {
    descriptor: PluginDescriptor,
    kind: PluginKind,
    teardowns: Arc<TeardownSet>,
    enabled_at: Instant,
}

enum Slot {
    Enabling,
    Active(Registration),
    Disabling,
}

/// State shared by the host and every plugin context.
pub(crate) struct Shared {
    pub(crate) config: BridgeConfig,
    pub(crate) dedup: Arc<Deduplicator>,
    pub(crate) services: ServiceRegistry,
    pub(crate) started_at: Instant,
    pub(crate) notice_delay: Duration,
    registry: Mutex<HashMap<String, Slot>>,
}

impl Shared {
    pub(crate) fn active_plugins(&self) -> Vec<PluginInfo> {
        let registry = self.registry.lock().unwrap_or_else(|e| e.into_inner());
        let mut active: Vec<PluginInfo> = registry
            .values()
            .filter_map(|slot| match slot {
                Slot::Active(r) => Some(PluginInfo {
                    descriptor: r.descriptor.clone(),
                    kind: r.kind,
                    active_for: r.enabled_at.elapsed(),
                }),
                Slot::Enabling | Slot::Disabling => None,
            })
            .collect();
        active.sort_by(|a, b| {
            (a.descriptor.priority, &a.descriptor.name).cmp(&(b.descriptor.priority, &b.descriptor.name))
        });
        active
    }
}

#[derive(Debug, Clone)]
pub struct HostOptions {
    pub notice_delay: Duration,
    pub dedup_capacity: usize,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            notice_delay: NOTICE_DELAY,
            dedup_capacity: onebridge_protocol::DEDUPE_MAX_ENTRIES,
        }
    }
}

/// A plugin that did not make it to `active`.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub name: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<PluginDescriptor>,
    pub failed: Vec<LoadFailure>,
    /// Problems that did not stop a plugin from loading.
    pub warnings: Vec<String>,
    pub elapsed: Duration,
}

impl LoadReport {
    fn record(&mut self, results: Vec<(String, Result<PluginDescriptor>)>) {
        for (name, result) in results {
            match result {
                Ok(descriptor) => self.loaded.push(descriptor),
                Err(e) => self.failed.push(LoadFailure {
                    name,
                    error: e.to_string(),
                }),
            }
        }
    }

    /// One line per failure, for operator notification.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} plugin(s) loaded, {} failed in {}ms",
            self.loaded.len(),
            self.failed.len(),
            self.elapsed.as_millis()
        )];
        lines.extend(
            self.failed
                .iter()
                .map(|f| format!("- {}: {}", f.name, f.error)),
        );
        lines.join("\n")
    }
}

/// Owns the plugin registry and the state plugins share.
#[derive(Clone)]
pub struct PluginHost {
    shared: Arc<Shared>,
}

impl PluginHost {
    pub fn new(config: BridgeConfig) -> Self {
        Self::with_options(config, HostOptions::default())
    }

    pub fn with_options(config: BridgeConfig, options: HostOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                dedup: Arc::new(Deduplicator::with_capacity(options.dedup_capacity)),
                services: ServiceRegistry::new(),
                started_at: Instant::now(),
                notice_delay: options.notice_delay,
                registry: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    pub fn deduplicator(&self) -> &Arc<Deduplicator> {
        &self.shared.dedup
    }

    pub fn uptime(&self) -> Duration {
        self.shared.started_at.elapsed()
    }

    pub fn state(&self, name: &str) -> Option<PluginState> {
        let registry = self.shared.registry.lock().unwrap_or_else(|e| e.into_inner());
        registry.get(name).map(|slot| match slot {
            Slot::Enabling => PluginState::Enabling,
            Slot::Active(_) => PluginState::Active,
            Slot::Disabling => PluginState::Disabling,
        })
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.state(name) == Some(PluginState::Active)
    }

    /// Active plugins, by priority then name.
    pub fn list(&self) -> Vec<PluginInfo> {
        self.shared.active_plugins()
    }

    /// A context that is not tied to any registered plugin, for host-level
    /// notifications. Its registrations are never torn down.
    pub fn detached_context(&self, name: &str, bots: &[Arc<Connection>]) -> Result<PluginContext> {
        let primary = bots.first().cloned().ok_or(Error::NoConnections)?;
        Ok(PluginContext::new(
            name,
            Arc::from(bots.to_vec()),
            primary,
            Arc::clone(&self.shared),
            Arc::new(TeardownSet::default()),
        ))
    }

    /// Register `plugin` and run its `setup` against the first connection's
    /// context.
    ///
    /// On failure (error or panic) everything the plugin registered so far is
    /// torn down and no registry entry remains.
    pub async fn enable(
        &self,
        bots: &[Arc<Connection>],
        plugin: Arc<dyn Plugin>,
        kind: PluginKind,
    ) -> Result<PluginDescriptor> {
        let descriptor = PluginDescriptor::of(plugin.as_ref());
        let name = descriptor.name.clone();
        let Some(primary) = bots.first().cloned() else {
            return Err(Error::NoConnections);
        };

        {
            let mut registry = self.shared.registry.lock().unwrap_or_else(|e| e.into_inner());
            if registry.contains_key(&name) {
                return Err(Error::AlreadyRegistered { name });
            }
            registry.insert(name.clone(), Slot::Enabling);
        }

        let teardowns = Arc::new(TeardownSet::default());
        let ctx = PluginContext::new(
            &name,
            Arc::from(bots.to_vec()),
            primary,
            Arc::clone(&self.shared),
            Arc::clone(&teardowns),
        );

        let span = info_span!("plugin", plugin = %name);
        let outcome = AssertUnwindSafe(async { plugin.setup(&ctx).await })
            .catch_unwind()
            .instrument(span)
            .await;
        let failure = match outcome {
            Ok(Ok(returned)) => {
                if let Some(returned) = returned {
                    teardowns.push(returned);
                }
                None
            },
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        if let Some(message) = failure {
            let leftovers = run_teardowns(&name, teardowns.close()).await;
            self.shared
                .registry
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&name);
            warn!(
                plugin = %name,
                error = %message,
                leftover_failures = leftovers.len(),
                "plugin setup failed"
            );
            return Err(Error::Setup {
                name,
                version: descriptor.version,
                message,
            });
        }

        self.shared
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(
                name.clone(),
                Slot::Active(Registration {
                    descriptor: descriptor.clone(),
                    kind,
                    teardowns,
                    enabled_at: Instant::now(),
                }),
            );
        info!(
            plugin = %name,
            version = %descriptor.version,
            priority = descriptor.priority,
            %kind,
            "plugin enabled"
        );
        Ok(descriptor)
    }

    /// Run every teardown of `name` concurrently and unregister it. The entry
    /// is removed even when some teardowns fail.
    pub async fn disable(&self, name: &str) -> Result<()> {
        let registration = {
            let mut registry = self.shared.registry.lock().unwrap_or_else(|e| e.into_inner());
            match registry.remove(name) {
                Some(Slot::Active(registration)) => {
                    registry.insert(name.to_string(), Slot::Disabling);
                    registration
                },
                Some(other) => {
                    registry.insert(name.to_string(), other);
                    return Err(Error::NotActive { name: name.into() });
                },
                None => return Err(Error::NotActive { name: name.into() }),
            }
        };

        let failures = run_teardowns(name, registration.teardowns.close())
            .instrument(info_span!("plugin", plugin = %name))
            .await;
        self.shared
            .registry
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(name);

        if failures.is_empty() {
            info!(plugin = %name, "plugin disabled");
            Ok(())
        } else {
            warn!(plugin = %name, failures = failures.len(), "plugin disabled with teardown failures");
            Err(Error::Teardown {
                name: name.into(),
                failures,
            })
        }
    }

    /// Enable `builtins` in parallel, then the plugins `loader` resolves for
    /// `ids` in ascending priority tiers. Plugins in one tier start in
    /// parallel; the next tier starts once the previous one has settled.
    pub async fn start(
        &self,
        bots: &[Arc<Connection>],
        builtins: Vec<Arc<dyn Plugin>>,
        loader: &dyn PluginLoader,
        ids: &[String],
    ) -> LoadReport {
        let started = Instant::now();
        let mut report = LoadReport::default();

        report.record(self.enable_all(bots, builtins, PluginKind::Builtin).await);

        let mut tiers: BTreeMap<i32, Vec<Arc<dyn Plugin>>> = BTreeMap::new();
        for id in ids {
            match loader.load(id) {
                Ok(plugin) => {
                    if plugin.name() != id {
                        warn!(id = %id, name = %plugin.name(), "plugin id differs from its name");
                        report.warnings.push(format!(
                            "plugin listed as '{id}' declares the name '{}'; use the same name in the config",
                            plugin.name()
                        ));
                    }
                    tiers.entry(plugin.priority()).or_default().push(plugin);
                },
                Err(e) => {
                    warn!(id = %id, error = %e, "plugin not loaded");
                    report.failed.push(LoadFailure {
                        name: id.clone(),
                        error: e.to_string(),
                    });
                },
            }
        }

        for (priority, plugins) in tiers {
            debug!(priority, count = plugins.len(), "starting plugin tier");
            report.record(self.enable_all(bots, plugins, PluginKind::External).await);
        }

        report.elapsed = started.elapsed();
        info!(
            loaded = report.loaded.len(),
            failed = report.failed.len(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "plugins started"
        );
        report
    }

    async fn enable_all(
        &self,
        bots: &[Arc<Connection>],
        plugins: Vec<Arc<dyn Plugin>>,
        kind: PluginKind,
    ) -> Vec<(String, Result<PluginDescriptor>)> {
        join_all(plugins.into_iter().map(|plugin| async move {
            let name = plugin.name().to_string();
            (name, self.enable(bots, plugin, kind).await)
        }))
        .await
    }

    /// Disable every active plugin, highest priority value first.
    pub async fn shutdown(&self) -> Vec<Error> {
        let mut active = self.list();
        active.reverse();
        let mut errors = Vec::new();
        for info in active {
            if let Err(e) = self.disable(&info.descriptor.name).await {
                errors.push(e);
            }
        }
        info!(failures = errors.len(), "plugin host shut down");
        errors
    }
}

/// Run `items` concurrently, returning one message per failure.
async fn run_teardowns(plugin: &str, items: Vec<Teardown>) -> Vec<String> {
    let results = join_all(
        items
            .into_iter()
            .map(|item| AssertUnwindSafe(async move { item().await }).catch_unwind()),
    )
    .await;

    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(format!("{e:#}")),
            Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        })
        .inspect(|failure| warn!(plugin, error = %failure, "teardown failed"))
        .collect()
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".into())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod testing {
    use {
        super::*,
        onebridge_client::LoginInfo,
        onebridge_protocol::OutboundCall,
        serde_json::json,
        tokio::sync::mpsc,
    };

    /// An in-memory connection that already resolved to `self_id`.
    pub(crate) fn bot(self_id: i64) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (conn, rx) = Connection::in_memory(format!("bot-{self_id}"));
        conn.assume_identity(LoginInfo {
            user_id: self_id,
            nickname: format!("bot{self_id}"),
        });
        (conn, rx)
    }

    pub(crate) fn test_config() -> BridgeConfig {
        BridgeConfig {
            owners: vec![1],
            admins: vec![2],
            ..BridgeConfig::default()
        }
    }

    pub(crate) fn host_with(bots: &[&Arc<Connection>], plugin: &str) -> (PluginHost, PluginContext) {
        let host = PluginHost::new(test_config());
        let bots: Vec<Arc<Connection>> = bots.iter().map(|b| Arc::clone(b)).collect();
        let ctx = host.detached_context(plugin, &bots).unwrap();
        (host, ctx)
    }

    /// Answer every outbound call on `conn` with success, recording it.
    pub(crate) fn respond_ok(
        conn: &Arc<Connection>,
        mut rx: mpsc::UnboundedReceiver<String>,
    ) -> Arc<Mutex<Vec<OutboundCall>>> {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let conn = Arc::clone(conn);
        let recorded = Arc::clone(&calls);
        tokio::spawn(async move {
            let mut next_id = 100;
            while let Some(text) = rx.recv().await {
                let call: OutboundCall = serde_json::from_str(&text).unwrap();
                next_id += 1;
                conn.ingest(
                    &json!({
                        "echo": call.echo,
                        "retcode": 0,
                        "status": "ok",
                        "data": { "message_id": next_id }
                    })
                    .to_string(),
                );
                recorded.lock().unwrap().push(call);
            }
        });
        calls
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::{testing::*, *},
        crate::plugin::{StaticLoader, teardown},
        async_trait::async_trait,
        tokio::sync::Notify,
    };

    #[derive(Clone, Copy)]
    enum Outcome {
        Ok,
        Fail,
        Panic,
    }

    /// Records its setup in `log`, optionally after a delay.
    struct Probe {
        name: &'static str,
        priority: i32,
        outcome: Outcome,
        delay: Duration,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Probe {
        fn new(name: &'static str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name,
                priority,
                outcome: Outcome::Ok,
                delay: Duration::ZERO,
                log: Arc::clone(log),
            }
        }

        fn outcome(mut self, outcome: Outcome) -> Self {
            self.outcome = outcome;
            self
        }

        fn delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    #[async_trait]
    impl Plugin for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn version(&self) -> &str {
            "1.2.3"
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn setup(&self, ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
            self.log.lock().unwrap().push(format!("{} start", self.name));
            ctx.handle("message", |_event| async { Ok(()) });
            tokio::time::sleep(self.delay).await;
            match self.outcome {
                Outcome::Ok => {},
                Outcome::Fail => anyhow::bail!("missing api key"),
                Outcome::Panic => panic!("setup exploded"),
            }
            self.log.lock().unwrap().push(format!("{} done", self.name));
            let log = Arc::clone(&self.log);
            let name = self.name;
            Ok(Some(teardown(move || async move {
                log.lock().unwrap().push(format!("{name} teardown"));
                Ok(())
            })))
        }
    }

    /// Blocks in `setup` until released.
    struct Gated {
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl Plugin for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        async fn setup(&self, _ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
            self.gate.notified().await;
            Ok(None)
        }
    }

    /// Registers a teardown that fails.
    struct Messy;

    #[async_trait]
    impl Plugin for Messy {
        fn name(&self) -> &str {
            "messy"
        }

        async fn setup(&self, ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
            ctx.handle("notice", |_event| async { Ok(()) });
            ctx.add_service("messy.state", 42_u32)?;
            ctx.on_teardown(|| async { anyhow::bail!("disk full") });
            Ok(None)
        }
    }

    fn log() -> Arc<Mutex<Vec<String>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn position(log: &[String], entry: &str) -> usize {
        log.iter().position(|e| e == entry).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn lower_priority_tier_settles_first() {
        let (a, _rx) = bot(1001);
        let bots = vec![a];
        let host = PluginHost::new(test_config());
        let log = log();
        let loader = StaticLoader::new()
            .with(Arc::new(
                Probe::new("slow50", 50, &log).delay(Duration::from_millis(200)),
            ))
            .with(Arc::new(Probe::new("fast50", 50, &log)))
            .with(Arc::new(Probe::new("late100", 100, &log)));

        let report = host
            .start(&bots, vec![], &loader, &[
                "late100".into(),
                "slow50".into(),
                "fast50".into(),
            ])
            .await;

        assert_eq!(report.loaded.len(), 3);
        let log = log.lock().unwrap().clone();
        assert!(position(&log, "slow50 done") < position(&log, "late100 start"));
        assert!(position(&log, "fast50 done") < position(&log, "late100 start"));
        assert!(position(&log, "fast50 start") < position(&log, "slow50 done"));
    }

    #[tokio::test]
    async fn failed_setups_are_isolated() {
        let (a, _rx) = bot(1001);
        let bots = vec![Arc::clone(&a)];
        let host = PluginHost::new(test_config());
        let log = log();
        let loader = StaticLoader::new()
            .with(Arc::new(Probe::new("broken", 10, &log).outcome(Outcome::Fail)))
            .with(Arc::new(Probe::new("crashy", 10, &log).outcome(Outcome::Panic)))
            .with(Arc::new(Probe::new("sibling", 10, &log)))
            .with(Arc::new(Probe::new("later", 20, &log)));

        let report = host
            .start(&bots, vec![], &loader, &[
                "broken".into(),
                "crashy".into(),
                "sibling".into(),
                "later".into(),
                "ghost".into(),
            ])
            .await;

        let loaded: Vec<_> = report.loaded.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(loaded.len(), 2);
        assert!(loaded.contains(&"sibling") && loaded.contains(&"later"));
        let failed: Vec<_> = report.failed.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(failed.len(), 3);
        assert!(failed.contains(&"broken") && failed.contains(&"crashy") && failed.contains(&"ghost"));

        assert_eq!(host.state("broken"), None);
        assert_eq!(host.state("crashy"), None);
        // Handlers registered before the failure are gone; the survivors keep theirs.
        assert_eq!(a.handler_count(), 2);

        let broken = report.failed.iter().find(|f| f.name == "broken").unwrap();
        assert_eq!(
            broken.error,
            "plugin 'broken' v1.2.3 failed to set up: missing api key"
        );
        assert!(report.summary().starts_with("2 plugin(s) loaded, 3 failed"));
    }

    #[tokio::test]
    async fn id_name_mismatch_is_reported() {
        let (a, _rx) = bot(1001);
        let host = PluginHost::new(test_config());
        let log = log();
        let mut loader = StaticLoader::new();
        loader.register_as("greeter", Arc::new(Probe::new("hello", 10, &log)));

        let report = host.start(&[a], vec![], &loader, &["greeter".into()]).await;

        assert_eq!(report.loaded.len(), 1);
        assert!(report.failed.is_empty());
        assert_eq!(report.warnings, [
            "plugin listed as 'greeter' declares the name 'hello'; use the same name in the config"
        ]);
        assert_eq!(host.state("hello"), Some(PluginState::Active));
    }

    #[tokio::test]
    async fn name_cannot_reenter_while_registered() {
        let (a, _rx) = bot(1001);
        let bots = vec![a];
        let host = PluginHost::new(test_config());
        let gate = Arc::new(Notify::new());

        let first = tokio::spawn({
            let host = host.clone();
            let bots = bots.clone();
            let gate = Arc::clone(&gate);
            async move {
                host.enable(&bots, Arc::new(Gated { gate }), PluginKind::External)
                    .await
            }
        });
        while host.state("gated") != Some(PluginState::Enabling) {
            tokio::task::yield_now().await;
        }

        let again = host
            .enable(
                &bots,
                Arc::new(Gated {
                    gate: Arc::new(Notify::new()),
                }),
                PluginKind::External,
            )
            .await;
        assert!(matches!(again, Err(Error::AlreadyRegistered { .. })));

        gate.notify_one();
        first.await.unwrap().unwrap();
        assert!(host.is_active("gated"));

        let again = host
            .enable(
                &bots,
                Arc::new(Gated {
                    gate: Arc::new(Notify::new()),
                }),
                PluginKind::External,
            )
            .await;
        assert!(matches!(again, Err(Error::AlreadyRegistered { .. })));
    }

    #[tokio::test]
    async fn disable_removes_entry_despite_teardown_failure() {
        let (a, _rx) = bot(1001);
        let bots = vec![Arc::clone(&a)];
        let host = PluginHost::new(test_config());

        host.enable(&bots, Arc::new(Messy), PluginKind::External)
            .await
            .unwrap();
        assert_eq!(a.handler_count(), 1);
        let ctx = host.detached_context("probe", &bots).unwrap();
        assert!(ctx.service::<u32>("messy.state").is_some());

        let err = host.disable("messy").await.unwrap_err();
        match err {
            Error::Teardown { name, failures } => {
                assert_eq!(name, "messy");
                assert_eq!(failures, ["disk full"]);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(host.state("messy"), None);
        assert_eq!(a.handler_count(), 0);
        assert!(ctx.service::<u32>("messy.state").is_none());

        assert!(matches!(
            host.disable("messy").await,
            Err(Error::NotActive { .. })
        ));
        host.enable(&bots, Arc::new(Messy), PluginKind::External)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn builtins_and_shutdown() {
        let (a, _rx) = bot(1001);
        let bots = vec![a];
        let host = PluginHost::new(test_config());
        let log = log();

        let report = host
            .start(
                &bots,
                vec![
                    Arc::new(Probe::new("core", 0, &log)),
                    Arc::new(Probe::new("stats", 0, &log)),
                ],
                &StaticLoader::new(),
                &[],
            )
            .await;
        assert_eq!(report.loaded.len(), 2);
        let listed: Vec<_> = host
            .list()
            .into_iter()
            .map(|i| (i.descriptor.name, i.kind))
            .collect();
        assert_eq!(listed, [
            ("core".to_string(), PluginKind::Builtin),
            ("stats".to_string(), PluginKind::Builtin),
        ]);

        assert!(host.shutdown().await.is_empty());
        assert!(host.list().is_empty());
        let log = log.lock().unwrap().clone();
        assert!(log.contains(&"core teardown".to_string()));
        assert!(log.contains(&"stats teardown".to_string()));
    }

    #[tokio::test]
    async fn enable_needs_a_connection() {
        let host = PluginHost::new(test_config());
        let err = host
            .enable(&[], Arc::new(Probe::new("x", 1, &log())), PluginKind::External)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NoConnections));
        assert_eq!(host.state("x"), None);
    }
}
