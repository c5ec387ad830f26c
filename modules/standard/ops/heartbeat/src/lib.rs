//! `standard.ops.heartbeat`: a liveness ticker started once settings are loaded.

pub mod config;
pub mod heartbeat;
pub mod module;

pub use config::HeartbeatConfig;
pub use heartbeat::Heartbeat;
pub use module::{HeartbeatModule, SERVICE_NAME, START_HOOK};

#[cfg(test)]
mod tests {
    use super::*;
    use core_database::DatabaseModule;
    use core_settings::{SettingsApi, SettingsModule};
    use modkit::{HostRuntime, LoadOptions, Module, ModuleCatalog, ModuleDescriptor};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    const ID: &str = "standard.ops.heartbeat";

    struct Cfg(serde_json::Value);

    impl modkit::ConfigProvider for Cfg {
        fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
            (module_name == ID).then_some(&self.0)
        }
    }

    fn host(cfg: serde_json::Value) -> HostRuntime {
        let catalog = ModuleCatalog::new()
            .with("core.database", || Arc::new(DatabaseModule) as Arc<dyn Module>)
            .with("core.settings", || Arc::new(SettingsModule) as Arc<dyn Module>)
            .with(ID, || Arc::new(HeartbeatModule) as Arc<dyn Module>);
        HostRuntime::new(
            catalog,
            LoadOptions::default(),
            Some(Arc::new(Cfg(cfg))),
            CancellationToken::new(),
        )
    }

    fn descriptors() -> Vec<ModuleDescriptor> {
        vec![
            ModuleDescriptor::new(ID).with_dependencies(["core.settings"]),
            ModuleDescriptor::new("core.settings").with_dependencies(["core.database"]),
            ModuleDescriptor::new("core.database"),
        ]
    }

    #[tokio::test]
    async fn ticks_into_settings_and_stops_on_shutdown() {
        let host = host(serde_json::json!({ "interval": "10ms" }));

        let result = host.start_with_descriptors(descriptors()).await;
        assert!(result.success);
        assert_eq!(
            result.executed_hooks,
            vec!["database.ready", "settings.load", START_HOOK]
        );

        let heartbeat = host.services().get::<Heartbeat>(SERVICE_NAME).unwrap();
        tokio::time::timeout(Duration::from_secs(5), async {
            while heartbeat.beats() < 2 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("heartbeat never ticked");

        let settings = host
            .services()
            .get::<dyn SettingsApi>(core_settings::SERVICE_NAME)
            .unwrap();
        assert!(settings.get("heartbeat.last_beat").is_some());

        let report = host.shutdown().await;
        assert!(report.failed.is_empty());
        assert!(!heartbeat.is_running());
        let after = heartbeat.beats();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(heartbeat.beats(), after);
    }

    #[tokio::test]
    async fn zero_interval_is_a_phase1_failure() {
        let host = host(serde_json::json!({ "interval": "0s" }));

        let result = host.start_with_descriptors(descriptors()).await;

        assert!(result.success);
        assert_eq!(result.failed_modules, vec![ID]);
        assert!(!result.executed_hooks.contains(&START_HOOK.to_string()));
    }
}
