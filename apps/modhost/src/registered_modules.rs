// Static table of module implementations, keyed by fully-qualified module id.
// Add an entry here when a new module crate is added under ./modules.

use std::sync::Arc;

use modkit::{Module, ModuleCatalog};

pub fn catalog() -> ModuleCatalog {
    ModuleCatalog::new()
        .with("core.database", || {
            Arc::new(core_database::DatabaseModule) as Arc<dyn Module>
        })
        .with("core.settings", || {
            Arc::new(core_settings::SettingsModule) as Arc<dyn Module>
        })
        .with("standard.ops.heartbeat", || {
            Arc::new(ops_heartbeat::HeartbeatModule) as Arc<dyn Module>
        })
}
