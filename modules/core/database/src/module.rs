use std::sync::Arc;

use async_trait::async_trait;
use modkit::{HookOptions, Module, ModuleCtx};
use tracing::info;

use crate::config::DatabaseConfig;
use crate::store::{InMemoryStore, KvStore};

/// Service name other modules look the store up by.
pub const SERVICE_NAME: &str = "database";

/// Hook the rest of the graph can depend on to see a loaded store.
pub const READY_HOOK: &str = "database.ready";

#[derive(Default)]
pub struct DatabaseModule;

#[async_trait]
impl Module for DatabaseModule {
    async fn initialize(&self, ctx: &ModuleCtx) -> anyhow::Result<bool> {
        let cfg: DatabaseConfig = ctx.module_config();
        let store = Arc::new(InMemoryStore::with_entries(cfg.seed));
        info!(seeded = store.len(), snapshot = ?cfg.snapshot, "database store created");

        ctx.register_service::<dyn KvStore>(SERVICE_NAME, store.clone());

        let snapshot = cfg.snapshot.clone();
        let hook_store = store.clone();
        ctx.register_post_init_hook_with(
            READY_HOOK,
            HookOptions::new().priority(0),
            move |_ctx| {
                let store = hook_store.clone();
                let snapshot = snapshot.clone();
                async move {
                    if let Some(path) = snapshot {
                        let loaded = store.load_snapshot(&path).await?;
                        info!(loaded, path = %path.display(), "snapshot loaded");
                    }
                    info!(entries = store.len(), "database ready");
                    Ok(())
                }
            },
        );

        if let Some(path) = cfg.snapshot {
            ctx.register_shutdown_handler(move || async move {
                let saved = store.save_snapshot(&path).await?;
                info!(saved, path = %path.display(), "snapshot written");
                Ok(())
            });
        }

        Ok(true)
    }
}
