use crate::config::AppConfig;
use std::sync::Arc;

/// Read-only view over the loaded configuration
pub trait ConfigProvider: Send + Sync {
    /// Raw section for a module id, if any
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;

    /// One of the global sections ("server", "loader", "logging") as JSON
    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value>;
}

/// Implementation of ConfigProvider that uses AppConfig
#[derive(Clone)]
pub struct AppConfigProvider(Arc<AppConfig>);

impl AppConfigProvider {
    pub fn new(config: AppConfig) -> Self {
        Self(Arc::new(config))
    }
}

impl ConfigProvider for AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        self.0.modules.get(module_name)
    }

    fn get_config_raw(&self, key: &str) -> Option<serde_json::Value> {
        match key {
            "server" => serde_json::to_value(&self.0.server).ok(),
            "loader" => serde_json::to_value(&self.0.loader).ok(),
            "logging" => self
                .0
                .logging
                .as_ref()
                .and_then(|v| serde_json::to_value(v).ok()),
            _ => None,
        }
    }
}
