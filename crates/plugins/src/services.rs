//! Named values plugins share with each other.

use {
    crate::{Error, Result},
    std::{
        any::Any,
        collections::HashMap,
        sync::{Arc, RwLock},
    },
    tracing::debug,
};

type Service = Arc<dyn Any + Send + Sync>;

/// Process-wide service table owned by the plugin host.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Service>>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `value` under `name`. Fails if the name is taken, unless
    /// `cover` is set.
    pub fn insert<T: Any + Send + Sync>(
        &self,
        name: &str,
        value: Arc<T>,
        cover: bool,
    ) -> Result<()> {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        if !cover && services.contains_key(name) {
            return Err(Error::ServiceExists {
                name: name.to_string(),
            });
        }
        services.insert(name.to_string(), value);
        debug!(service = name, "service registered");
        Ok(())
    }

    /// The service registered under `name`, if it has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let service = self
            .services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()?;
        service.downcast().ok()
    }

    /// Remove `name` only if it still holds `value`, so a covering
    /// registration is not removed by the plugin it replaced.
    pub fn remove_if_same<T: Any + Send + Sync>(&self, name: &str, value: &Arc<T>) -> bool {
        let mut services = self.services.write().unwrap_or_else(|e| e.into_inner());
        let same = services
            .get(name)
            .and_then(|s| Arc::clone(s).downcast::<T>().ok())
            .is_some_and(|s| Arc::ptr_eq(&s, value));
        if same {
            services.remove(name);
            debug!(service = name, "service removed");
        }
        same
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .services
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}
