//! Host Runtime - orchestrates one load of the module graph
//!
//! This module contains the HostRuntime type that owns the per-run shared state
//! (service registry, hook queue, shutdown handlers) and drives the pipeline:
//! discover → order → phase 1 → phase 2 → (wait) → shutdown.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::catalog::ModuleCatalog;
use crate::context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
use crate::discovery::{DiscoveryRoot, ModuleDiscovery};
use crate::hooks::{HookExecution, HookQueue, HookScheduler};
use crate::manifest::ModuleDescriptor;
use crate::outcome::{error_chain, LoadResult, ModuleState};
use crate::registry;
use crate::runtime::loader::Phase1Loader;
use crate::runtime::shutdown::{ShutdownHandlers, ShutdownReport};
use crate::services::ServiceRegistry;

/// Module id pinned first when none is configured.
pub const DEFAULT_BOOTSTRAP_MODULE: &str = "core.database";

/// Knobs for one run.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Module forced to position 0 whose Phase-1 failure is fatal.
    pub bootstrap_module: Option<String>,
    pub phase1_timeout: Duration,
    pub hook_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub hook_execution: HookExecution,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            bootstrap_module: Some(DEFAULT_BOOTSTRAP_MODULE.to_string()),
            phase1_timeout: Duration::from_secs(30),
            hook_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
            hook_execution: HookExecution::Sequential,
        }
    }
}

/// HostRuntime owns the lifecycle orchestration for one run.
///
/// The service registry lives here and is shared with every module context; there is
/// no process-global state. A runtime can be started once.
pub struct HostRuntime {
    catalog: ModuleCatalog,
    options: LoadOptions,
    services: Arc<ServiceRegistry>,
    hooks: Arc<HookQueue>,
    shutdown: Arc<ShutdownHandlers>,
    ctx: ModuleCtx,
    cancel: CancellationToken,
    started: AtomicBool,
}

impl HostRuntime {
    /// Create a new HostRuntime instance.
    ///
    /// This prepares all runtime components but does not start any lifecycle phases.
    pub fn new(
        catalog: ModuleCatalog,
        options: LoadOptions,
        modules_cfg: Option<Arc<dyn ConfigProvider>>,
        cancel: CancellationToken,
    ) -> Self {
        let services = Arc::new(ServiceRegistry::new());
        let hooks = Arc::new(HookQueue::default());
        let shutdown = Arc::new(ShutdownHandlers::default());

        let mut builder = ModuleCtxBuilder::new(cancel.clone())
            .with_services(services.clone())
            .with_hook_queue(hooks.clone())
            .with_shutdown_handlers(shutdown.clone());
        if let Some(cfg) = modules_cfg {
            builder = builder.with_config_provider(cfg);
        }

        Self {
            catalog,
            options,
            services,
            hooks,
            shutdown,
            ctx: builder.build(),
            cancel,
            started: AtomicBool::new(false),
        }
    }

    pub fn services(&self) -> Arc<ServiceRegistry> {
        self.services.clone()
    }

    /// Unscoped context sharing this runtime's registry.
    pub fn context(&self) -> &ModuleCtx {
        &self.ctx
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Discover modules under `roots`, then run the pipeline.
    pub async fn start(&self, roots: &[DiscoveryRoot]) -> LoadResult {
        tracing::info!(roots = roots.len(), "Phase: discovery");
        match ModuleDiscovery::new(roots.to_vec()).discover() {
            Ok(report) => self.start_with_descriptors(report.descriptors).await,
            Err(e) => {
                tracing::error!(phase = "discovery", error = %error_chain(&e), "module discovery failed");
                LoadResult::fatal(&e)
            }
        }
    }

    /// Run order → phase 1 → phase 2 over already-discovered descriptors.
    pub async fn start_with_descriptors(&self, descriptors: Vec<ModuleDescriptor>) -> LoadResult {
        if self.started.swap(true, Ordering::SeqCst) {
            tracing::error!("runtime already started; refusing to load twice");
            return LoadResult {
                success: false,
                fatal: Some("runtime already started".to_string()),
                ..Default::default()
            };
        }

        // 1. Order
        let order = match registry::order(&descriptors, self.options.bootstrap_module.as_deref()) {
            Ok(o) => o,
            Err(e) => {
                tracing::error!(phase = "order", error = %error_chain(&e), "module ordering failed");
                return LoadResult::fatal(&e);
            }
        };
        let order_ids: Vec<String> = order.ids().into_iter().map(str::to_string).collect();

        // 2. Phase 1
        let phase1 = Phase1Loader::new(&self.catalog, self.options.phase1_timeout)
            .run(&order, &self.ctx)
            .await;

        if let Some(critical) = phase1.critical {
            return LoadResult {
                success: false,
                fatal: Some(error_chain(&critical)),
                order: order_ids,
                failed_modules: phase1.failed_modules,
                modules: phase1.records,
                ..Default::default()
            };
        }

        // 3. Phase 2
        let mut records = phase1.records;
        let hooks = self.hooks.drain();

        let owners: HashSet<&str> = hooks.iter().map(|h| h.owner.as_str()).collect();
        for rec in records.iter_mut() {
            if rec.state == ModuleState::Phase1Done && owners.contains(rec.id()) {
                rec.transition(ModuleState::Phase2Pending);
            }
        }

        let sweep = HookScheduler::new(self.options.hook_execution, self.options.hook_timeout)
            .run(hooks, &self.ctx)
            .await;

        if !self.hooks.is_empty() {
            tracing::warn!(
                hooks = ?self.hooks.names(),
                "post-init hooks registered during phase 2 are ignored"
            );
            self.hooks.drain();
        }

        let hook_failed: HashSet<&str> = sweep.failed.iter().map(|f| f.owner.as_str()).collect();
        for rec in records.iter_mut() {
            if rec.state == ModuleState::Phase2Pending {
                let next = if hook_failed.contains(rec.id()) {
                    ModuleState::Phase2Failed
                } else {
                    ModuleState::Phase2Done
                };
                rec.transition(next);
            }
        }

        let failed_hooks = sweep.failed_names();
        let result = LoadResult {
            success: true,
            fatal: None,
            order: order_ids,
            failed_modules: phase1.failed_modules,
            executed_hooks: sweep.executed,
            failed_hooks,
            modules: records,
        };

        tracing::info!(
            modules = result.order.len(),
            failed_modules = result.failed_modules.len(),
            hooks_executed = result.executed_hooks.len(),
            failed_hooks = result.failed_hooks.len(),
            services = self.services.len(),
            "module load complete"
        );
        result
    }

    /// Cancel the run token, run shutdown handlers newest first, then clear services.
    pub async fn shutdown(&self) -> ShutdownReport {
        tracing::info!("Phase: shutdown");
        self.cancel.cancel();
        let report = self.shutdown.run_all(self.options.shutdown_timeout).await;
        self.services.clear();
        report
    }
}
