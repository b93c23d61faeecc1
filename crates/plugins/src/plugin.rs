//! The plugin contract and static plugin loading.

use {
    crate::{Error, PluginContext, Result},
    async_trait::async_trait,
    futures::{FutureExt, future::BoxFuture},
    onebridge_protocol::DEFAULT_PLUGIN_PRIORITY,
    serde::Serialize,
    std::{collections::BTreeMap, fmt, sync::Arc},
};

/// Cleanup callable returned by `setup` or registered on a context.
pub type Teardown = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

/// Box an async cleanup closure into a [`Teardown`].
pub fn teardown<F, Fut>(f: F) -> Teardown
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Box::new(move || f().boxed())
}

/// A unit of bot behavior with its own lifecycle.
///
/// `setup` runs once per enable with the primary connection's context and
/// registers handlers, schedules and services through it. Everything it
/// registers is torn down on disable together with the returned [`Teardown`].
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Unique among active plugins.
    fn name(&self) -> &str;

    fn version(&self) -> &str {
        "0.0.0"
    }

    /// Lower values start earlier.
    fn priority(&self) -> i32 {
        DEFAULT_PLUGIN_PRIORITY
    }

    fn description(&self) -> &str {
        ""
    }

    /// Names of plugins this one expects. Advisory only.
    fn dependencies(&self) -> &[&str] {
        &[]
    }

    async fn setup(&self, ctx: &PluginContext) -> anyhow::Result<Option<Teardown>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Linked into the binary and always enabled.
    Builtin,
    /// Enabled by name from configuration.
    External,
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Builtin => f.write_str("builtin"),
            Self::External => f.write_str("external"),
        }
    }
}

/// Static description of a plugin, captured when it is enabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub version: String,
    pub priority: i32,
    pub description: String,
    pub dependencies: Vec<String>,
}

impl PluginDescriptor {
    pub fn of(plugin: &dyn Plugin) -> Self {
        Self {
            name: plugin.name().to_string(),
            version: plugin.version().to_string(),
            priority: plugin.priority(),
            description: plugin.description().to_string(),
            dependencies: plugin
                .dependencies()
                .iter()
                .map(|d| (*d).to_string())
                .collect(),
        }
    }
}

/// Resolves plugin ids from configuration to plugin instances.
pub trait PluginLoader: Send + Sync {
    fn load(&self, id: &str) -> Result<Arc<dyn Plugin>>;

    /// Ids this loader can resolve, sorted.
    fn available(&self) -> Vec<String>;
}

/// A [`PluginLoader`] over plugins linked into the binary.
#[derive(Default, Clone)]
pub struct StaticLoader {
    plugins: BTreeMap<String, Arc<dyn Plugin>>,
}

impl StaticLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `plugin` under its own name.
    #[must_use]
    pub fn with(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    /// Register `plugin` under its own name. A later registration with the
    /// same name replaces the earlier one.
    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(plugin.name().to_string(), plugin);
    }

    /// Register `plugin` under an id that differs from its name.
    pub fn register_as(&mut self, id: impl Into<String>, plugin: Arc<dyn Plugin>) {
        self.plugins.insert(id.into(), plugin);
    }
}

impl PluginLoader for StaticLoader {
    fn load(&self, id: &str) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .get(id)
            .cloned()
            .ok_or_else(|| Error::load(id, "no such plugin"))
    }

    fn available(&self) -> Vec<String> {
        self.plugins.keys().cloned().collect()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str);

    #[async_trait]
    impl Plugin for Named {
        fn name(&self) -> &str {
            self.0
        }

        fn dependencies(&self) -> &[&str] {
            &["core"]
        }

        async fn setup(&self, _ctx: &PluginContext) -> anyhow::Result<Option<Teardown>> {
            Ok(None)
        }
    }

    #[test]
    fn descriptor_uses_trait_defaults() {
        let d = PluginDescriptor::of(&Named("echo"));
        assert_eq!(d.name, "echo");
        assert_eq!(d.version, "0.0.0");
        assert_eq!(d.priority, DEFAULT_PLUGIN_PRIORITY);
        assert_eq!(d.dependencies, ["core"]);
    }

    #[test]
    fn static_loader_resolves_by_id() {
        let mut loader = StaticLoader::new().with(Arc::new(Named("echo")));
        loader.register_as("legacy-echo", Arc::new(Named("echo")));

        assert_eq!(loader.available(), ["echo", "legacy-echo"]);
        assert_eq!(loader.load("legacy-echo").unwrap().name(), "echo");
        let err = loader.load("ghost").err().unwrap();
        assert_eq!(err.to_string(), "cannot load plugin 'ghost': no such plugin");
    }
}
