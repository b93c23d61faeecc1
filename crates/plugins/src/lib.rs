//! Plugin host for onebridge.
//!
//! Plugins register event handlers, scheduled jobs and shared services
//! through a [`PluginContext`]. The [`PluginHost`] tracks every registration
//! so disabling a plugin undoes all of it, contains plugin failures, and
//! starts plugins in priority tiers. Handlers registered with
//! [`PluginContext::handle`] see each logical event once even when several
//! bridged accounts receive it, via the [`Deduplicator`].

pub mod bundled;
pub mod context;
pub mod dedup;
pub mod error;
pub mod host;
pub mod plugin;
pub mod schedule;
pub mod services;

pub use {
    context::{HandleOptions, PluginContext, Subscription},
    dedup::Deduplicator,
    error::{Error, Result},
    host::{HostOptions, LoadFailure, LoadReport, PluginHost, PluginInfo, PluginState},
    plugin::{
        Plugin, PluginDescriptor, PluginKind, PluginLoader, StaticLoader, Teardown, teardown,
    },
    schedule::{Schedule, TaskHandle, Tick, Zone},
    services::ServiceRegistry,
};
