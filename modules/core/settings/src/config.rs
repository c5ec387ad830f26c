use std::collections::BTreeMap;

use serde::Deserialize;

/// `modules."core.settings"` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SettingsConfig {
    /// Key prefix inside the shared store.
    pub namespace: String,
    /// Written by the `settings.load` hook for keys the store does not already hold.
    pub defaults: BTreeMap<String, String>,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            namespace: "settings".to_string(),
            defaults: BTreeMap::new(),
        }
    }
}
