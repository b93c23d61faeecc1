//! Plugins linked into the binary.

pub mod commands;
pub mod hi;

use {
    crate::plugin::{Plugin, StaticLoader},
    std::sync::Arc,
};

/// Always-on plugins.
pub fn builtins() -> Vec<Arc<dyn Plugin>> {
    vec![Arc::new(commands::CorePlugin)]
}

/// User plugins that can be enabled by name from configuration.
pub fn loader() -> StaticLoader {
    StaticLoader::new().with(Arc::new(hi::HiPlugin))
}
