//! Phase 1: run each module's `initialize` in resolved order.

use std::time::Duration;

use crate::catalog::ModuleCatalog;
use crate::context::ModuleCtx;
use crate::guard::guarded;
use crate::outcome::{error_chain, LoadError, ModuleRecord, ModuleState};
use crate::registry::ModuleOrder;

/// What Phase 1 produced.
#[derive(Debug, Default)]
pub struct Phase1Report {
    /// One record per module reached, in order. Modules after a critical failure
    /// keep the `Discovered` state.
    pub records: Vec<ModuleRecord>,
    pub failed_modules: Vec<String>,
    /// Set when the bootstrap module failed and loading stopped.
    pub critical: Option<LoadError>,
}

pub struct Phase1Loader<'a> {
    catalog: &'a ModuleCatalog,
    timeout: Duration,
}

impl<'a> Phase1Loader<'a> {
    pub fn new(catalog: &'a ModuleCatalog, timeout: Duration) -> Self {
        Self { catalog, timeout }
    }

    pub async fn run(&self, order: &ModuleOrder, ctx: &ModuleCtx) -> Phase1Report {
        tracing::info!(modules = order.len(), "Phase: init");

        let mut report = Phase1Report::default();
        let mut modules = order.modules().iter();

        for descriptor in modules.by_ref() {
            let mut record = ModuleRecord::new(descriptor.clone());
            record.transition(ModuleState::Phase1Running);

            let result = match self.catalog.resolve(descriptor) {
                None => Err(anyhow::anyhow!(
                    "no implementation registered for '{}' (entry point '{}')",
                    descriptor.id,
                    descriptor.entry_point
                )),
                Some(instance) => {
                    record.instance = Some(instance.clone());
                    let scoped = ctx.for_module(&descriptor.id);
                    tracing::debug!(module = %descriptor.id, "initializing module");
                    match guarded(self.timeout, instance.initialize(&scoped)).await {
                        Ok(Ok(true)) => Ok(()),
                        Ok(Ok(false)) => Err(anyhow::anyhow!("initialize returned false")),
                        Ok(Err(e)) => Err(e),
                        Err(g) => Err(anyhow::Error::new(g)),
                    }
                }
            };

            match result {
                Ok(()) => {
                    record.transition(ModuleState::Phase1Done);
                    tracing::info!(module = %descriptor.id, "module initialized");
                    report.records.push(record);
                }
                Err(source) => {
                    record.transition(ModuleState::Phase1Failed);
                    record.error = Some(format!("{source:#}"));
                    report.failed_modules.push(descriptor.id.clone());
                    report.records.push(record);

                    if order.is_bootstrap(&descriptor.id) {
                        let err = LoadError::CriticalModuleLoad {
                            module: descriptor.id.clone(),
                            source,
                        };
                        tracing::error!(
                            module = %descriptor.id,
                            phase = "phase1",
                            error = %error_chain(&err),
                            "bootstrap module failed; aborting load"
                        );
                        report.critical = Some(err);
                        break;
                    }

                    let err = LoadError::ModuleLoad {
                        module: descriptor.id.clone(),
                        source,
                    };
                    tracing::error!(
                        module = %descriptor.id,
                        phase = "phase1",
                        error = %error_chain(&err),
                        "module failed to initialize; continuing"
                    );
                }
            }
        }

        // never attempted
        report
            .records
            .extend(modules.map(|d| ModuleRecord::new(d.clone())));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleCtxBuilder;
    use crate::contracts::Module;
    use crate::manifest::ModuleDescriptor;
    use crate::registry::order;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    enum Behavior {
        Ok,
        False,
        Err,
        Panic,
        Hang,
    }

    struct Scripted {
        id: &'static str,
        behavior: Behavior,
        calls: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl Module for Scripted {
        async fn initialize(&self, ctx: &ModuleCtx) -> anyhow::Result<bool> {
            self.calls.lock().push(self.id.to_string());
            ctx.register_service(format!("{}.svc", self.id), Arc::new(()));
            match self.behavior {
                Behavior::Ok => Ok(true),
                Behavior::False => Ok(false),
                Behavior::Err => anyhow::bail!("init error in {}", self.id),
                Behavior::Panic => panic!("init panic in {}", self.id),
                Behavior::Hang => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }
    }

    fn catalog(specs: Vec<(&'static str, Behavior)>, calls: &Arc<Mutex<Vec<String>>>) -> ModuleCatalog {
        let mut catalog = ModuleCatalog::new();
        for (id, behavior) in specs {
            catalog.register_instance(
                id,
                Arc::new(Scripted {
                    id,
                    behavior,
                    calls: calls.clone(),
                }),
            );
        }
        catalog
    }

    fn descriptors() -> Vec<ModuleDescriptor> {
        vec![
            ModuleDescriptor::new("core.database"),
            ModuleDescriptor::new("core.settings").with_dependencies(["core.database"]),
            ModuleDescriptor::new("standard.a").with_dependencies(["core.settings"]),
        ]
    }

    #[tokio::test]
    async fn bootstrap_failure_stops_everything() {
        for behavior in [Behavior::False, Behavior::Err, Behavior::Panic] {
            let calls = Arc::new(Mutex::new(Vec::new()));
            let catalog = catalog(
                vec![
                    ("core.database", behavior),
                    ("core.settings", Behavior::Ok),
                    ("standard.a", Behavior::Ok),
                ],
                &calls,
            );
            let o = order(&descriptors(), Some("core.database")).unwrap();
            let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();

            let report = Phase1Loader::new(&catalog, Duration::from_secs(5))
                .run(&o, &ctx)
                .await;

            assert_eq!(*calls.lock(), vec!["core.database"]);
            assert!(matches!(
                report.critical,
                Some(LoadError::CriticalModuleLoad { .. })
            ));
            assert_eq!(report.records.len(), 3);
            assert_eq!(report.records[1].state, ModuleState::Discovered);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn bootstrap_timeout_is_critical() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog(
            vec![
                ("core.database", Behavior::Hang),
                ("core.settings", Behavior::Ok),
                ("standard.a", Behavior::Ok),
            ],
            &calls,
        );
        let o = order(&descriptors(), Some("core.database")).unwrap();
        let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();

        let report = Phase1Loader::new(&catalog, Duration::from_millis(50))
            .run(&o, &ctx)
            .await;

        assert_eq!(*calls.lock(), vec!["core.database"]);
        assert!(matches!(
            report.critical,
            Some(LoadError::CriticalModuleLoad { .. })
        ));
        assert_eq!(report.records[0].state, ModuleState::Phase1Failed);
        assert!(report.records[0]
            .error
            .as_deref()
            .unwrap()
            .contains("timed out"));
    }

    #[tokio::test]
    async fn non_bootstrap_failure_continues_without_rollback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog(
            vec![
                ("core.database", Behavior::Ok),
                ("core.settings", Behavior::Err),
                ("standard.a", Behavior::Ok),
            ],
            &calls,
        );
        let o = order(&descriptors(), Some("core.database")).unwrap();
        let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();

        let report = Phase1Loader::new(&catalog, Duration::from_secs(5))
            .run(&o, &ctx)
            .await;

        assert_eq!(*calls.lock(), vec!["core.database", "core.settings", "standard.a"]);
        assert_eq!(report.failed_modules, vec!["core.settings"]);
        assert!(report.critical.is_none());
        // the failed module's registration stays in place
        assert!(ctx.services().contains("core.settings.svc"));
        assert_eq!(report.records[1].state, ModuleState::Phase1Failed);
    }

    #[tokio::test]
    async fn missing_implementation_is_a_load_failure() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let catalog = catalog(vec![("core.database", Behavior::Ok)], &calls);
        let o = order(&descriptors(), Some("core.database")).unwrap();
        let ctx = ModuleCtxBuilder::new(CancellationToken::new()).build();

        let report = Phase1Loader::new(&catalog, Duration::from_secs(5))
            .run(&o, &ctx)
            .await;

        assert_eq!(report.failed_modules, vec!["core.settings", "standard.a"]);
        assert!(report.records[1].instance.is_none());
        assert!(report.records[1]
            .error
            .as_deref()
            .unwrap()
            .contains("no implementation registered"));
    }
}
