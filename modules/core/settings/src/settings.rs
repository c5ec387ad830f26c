use std::collections::BTreeMap;
use std::sync::Arc;

use core_database::KvStore;

/// Read/write access to settings, published as `dyn SettingsApi`.
pub trait SettingsApi: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: String);
    /// All settings with the namespace stripped.
    fn all(&self) -> BTreeMap<String, String>;
}

/// Settings stored as `<namespace>/<key>` entries of a [`KvStore`].
pub struct StoreSettings {
    store: Arc<dyn KvStore>,
    prefix: String,
}

impl StoreSettings {
    pub fn new(store: Arc<dyn KvStore>, namespace: &str) -> Self {
        Self {
            store,
            prefix: format!("{}/", namespace.trim_end_matches('/')),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    /// Write each default whose key is unset; returns how many were written.
    pub fn apply_defaults(&self, defaults: &BTreeMap<String, String>) -> usize {
        let mut written = 0;
        for (key, value) in defaults {
            if self.get(key).is_none() {
                self.set(key, value.clone());
                written += 1;
            }
        }
        written
    }
}

impl SettingsApi for StoreSettings {
    fn get(&self, key: &str) -> Option<String> {
        self.store.get(&self.key(key))
    }

    fn set(&self, key: &str, value: String) {
        self.store.put(&self.key(key), value);
    }

    fn all(&self) -> BTreeMap<String, String> {
        self.store
            .keys_with_prefix(&self.prefix)
            .into_iter()
            .filter_map(|full| {
                let value = self.store.get(&full)?;
                Some((full[self.prefix.len()..].to_string(), value))
            })
            .collect()
    }
}
