//! `core.settings`: string settings namespaced inside the `core.database` store.

pub mod config;
pub mod module;
pub mod settings;

pub use config::SettingsConfig;
pub use module::{SettingsModule, LOAD_HOOK, SERVICE_NAME};
pub use settings::{SettingsApi, StoreSettings};
