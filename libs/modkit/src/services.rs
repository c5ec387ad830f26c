//! Name-keyed service registry shared by every module context of a run.
//!
//! - Providers register an `Arc<T>` under a string name during Phase 1.
//! - Consumers look it up by name and type: `get::<dyn my::Api>("my.api")`.
//! - `T` may be a trait object; the value is stored as `Arc<T>` behind `dyn Any`.
//!
//! Lookups never fail: an unknown name or a type mismatch yields `None`.
//! Re-registering a name overwrites the previous value with a warning; `Arc`s held by
//! consumers stay valid.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;

type Boxed = Box<dyn Any + Send + Sync>;

struct Entry {
    owner: Arc<str>,
    type_name: &'static str,
    value: Boxed,
}

#[derive(Default)]
pub struct ServiceRegistry {
    map: DashMap<String, Entry>,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `instance` under `name`, owned by module `owner`.
    pub fn register<T>(&self, name: impl Into<String>, instance: Arc<T>, owner: &str)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let name = name.into();
        let entry = Entry {
            owner: Arc::from(owner),
            type_name: std::any::type_name::<T>(),
            value: Box::new(instance),
        };
        if let Some(prev) = self.map.insert(name.clone(), entry) {
            tracing::warn!(
                service = %name,
                previous_owner = %prev.owner,
                owner = owner,
                "service re-registered; previous instance overwritten"
            );
        } else {
            tracing::debug!(service = %name, owner = owner, "service registered");
        }
    }

    /// Look up `name` as `Arc<T>`.
    pub fn get<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let Some(entry) = self.map.get(name) else {
            tracing::debug!(service = name, "service not registered");
            return None;
        };
        match entry.value.downcast_ref::<Arc<T>>() {
            Some(arc_t) => Some(arc_t.clone()),
            None => {
                tracing::warn!(
                    service = name,
                    registered_as = entry.type_name,
                    requested_as = std::any::type_name::<T>(),
                    "service type mismatch; treating as absent"
                );
                None
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn owner_of(&self, name: &str) -> Option<String> {
        self.map.get(name).map(|e| e.owner.to_string())
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.map.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Drop every entry. Only called at shutdown.
    pub fn clear(&self) {
        self.map.clear();
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.names())
            .finish()
    }
}
