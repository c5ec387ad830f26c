use std::sync::Arc;

use async_trait::async_trait;
use core_database::KvStore;
use modkit::{HookOptions, Module, ModuleCtx};
use tracing::{info, warn};

use crate::config::SettingsConfig;
use crate::settings::{SettingsApi, StoreSettings};

pub const SERVICE_NAME: &str = "settings";
pub const LOAD_HOOK: &str = "settings.load";

#[derive(Default)]
pub struct SettingsModule;

#[async_trait]
impl Module for SettingsModule {
    async fn initialize(&self, ctx: &ModuleCtx) -> anyhow::Result<bool> {
        let Some(store) = ctx.get_service::<dyn KvStore>(core_database::SERVICE_NAME) else {
            warn!(
                service = core_database::SERVICE_NAME,
                "database service unavailable; settings disabled"
            );
            return Ok(false);
        };

        let cfg: SettingsConfig = ctx.module_config();
        let settings = Arc::new(StoreSettings::new(store, &cfg.namespace));
        ctx.register_service::<dyn SettingsApi>(SERVICE_NAME, settings.clone());

        let defaults = Arc::new(cfg.defaults);
        ctx.register_post_init_hook_with(
            LOAD_HOOK,
            HookOptions::new()
                .priority(10)
                .depends_on([core_database::READY_HOOK]),
            move |_ctx| {
                let settings = settings.clone();
                let defaults = defaults.clone();
                async move {
                    let written = settings.apply_defaults(&defaults);
                    info!(written, total = settings.all().len(), "settings loaded");
                    Ok(())
                }
            },
        );

        Ok(true)
    }
}
