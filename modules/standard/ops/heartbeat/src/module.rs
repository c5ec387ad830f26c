use std::sync::Arc;

use async_trait::async_trait;
use core_settings::SettingsApi;
use modkit::{HookOptions, Module, ModuleCtx};
use tracing::{info, warn};

use crate::config::HeartbeatConfig;
use crate::heartbeat::Heartbeat;

pub const SERVICE_NAME: &str = "heartbeat";
pub const START_HOOK: &str = "heartbeat.start";

#[derive(Default)]
pub struct HeartbeatModule;

#[async_trait]
impl Module for HeartbeatModule {
    async fn initialize(&self, ctx: &ModuleCtx) -> anyhow::Result<bool> {
        let Some(settings) = ctx.get_service::<dyn SettingsApi>(core_settings::SERVICE_NAME)
        else {
            warn!(service = core_settings::SERVICE_NAME, "settings service unavailable");
            return Ok(false);
        };

        let cfg: HeartbeatConfig = ctx.module_config();
        if cfg.interval.is_zero() {
            anyhow::bail!("heartbeat interval must be non-zero");
        }

        let heartbeat = Arc::new(Heartbeat::new(ctx.cancellation_token().child_token()));
        ctx.register_service(SERVICE_NAME, heartbeat.clone());

        let hook_heartbeat = heartbeat.clone();
        ctx.register_post_init_hook_with(
            START_HOOK,
            HookOptions::new()
                .priority(50)
                .depends_on([core_settings::LOAD_HOOK]),
            move |_ctx| {
                let heartbeat = hook_heartbeat.clone();
                let settings = settings.clone();
                let cfg = cfg.clone();
                async move {
                    if heartbeat.start(settings, cfg.interval, cfg.settings_key) {
                        info!(interval = ?cfg.interval, "heartbeat started");
                    }
                    Ok(())
                }
            },
        );

        ctx.register_shutdown_handler(move || async move { heartbeat.stop().await });

        Ok(true)
    }
}
