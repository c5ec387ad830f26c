use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::hooks::{hook_fn, HookOptions, HookQueue, PostInitHook};
use crate::runtime::ShutdownHandlers;
use crate::services::ServiceRegistry;

/// Owner recorded for registrations made outside any module scope.
pub const HOST_OWNER: &str = "<host>";

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    /// Returns raw JSON section for the module, if any.
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

impl ConfigProvider for modkit_bootstrap::AppConfigProvider {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
        modkit_bootstrap::ConfigProvider::get_module_config(self, module_name)
    }
}

/// The API a module sees during Phase 1 and inside its post-init hooks.
///
/// Cloning is cheap; all clones share the same service registry, hook queue and
/// shutdown list.
#[derive(Clone)]
pub struct ModuleCtx {
    pub(crate) services: Arc<ServiceRegistry>,
    pub(crate) hooks: Arc<HookQueue>,
    pub(crate) shutdown: Arc<ShutdownHandlers>,
    pub(crate) config_provider: Option<Arc<dyn ConfigProvider>>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) module_name: Option<Arc<str>>,
}

pub struct ModuleCtxBuilder {
    inner: ModuleCtx,
}

impl ModuleCtxBuilder {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: ModuleCtx::from_token(token),
        }
    }
    pub fn with_services(mut self, services: Arc<ServiceRegistry>) -> Self {
        self.inner.services = services;
        self
    }
    pub fn with_hook_queue(mut self, hooks: Arc<HookQueue>) -> Self {
        self.inner.hooks = hooks;
        self
    }
    pub fn with_shutdown_handlers(mut self, shutdown: Arc<ShutdownHandlers>) -> Self {
        self.inner.shutdown = shutdown;
        self
    }
    pub fn with_config_provider(mut self, p: Arc<dyn ConfigProvider>) -> Self {
        self.inner.config_provider = Some(p);
        self
    }
    pub fn build(self) -> ModuleCtx {
        self.inner
    }
}

impl ModuleCtx {
    pub(crate) fn from_token(token: CancellationToken) -> Self {
        Self {
            services: Arc::new(ServiceRegistry::new()),
            hooks: Arc::new(HookQueue::default()),
            shutdown: Arc::new(ShutdownHandlers::default()),
            config_provider: None,
            cancellation_token: token,
            module_name: None,
        }
    }

    /// Scope a copy of this context to a specific module id.
    pub fn for_module(&self, name: &str) -> Self {
        let mut scoped = self.clone();
        scoped.module_name = Some(Arc::<str>::from(name));
        scoped
    }

    fn owner(&self) -> &str {
        self.module_name.as_deref().unwrap_or(HOST_OWNER)
    }

    // ---- services ----

    /// Register `instance` under `name`; overwrites an existing entry with a warning.
    pub fn register_service<T>(&self, name: impl Into<String>, instance: Arc<T>)
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.register(name, instance, self.owner());
    }

    /// Look up a service. `None` when absent or registered under another type.
    pub fn get_service<T>(&self, name: &str) -> Option<Arc<T>>
    where
        T: ?Sized + Send + Sync + 'static,
    {
        self.services.get::<T>(name)
    }

    pub fn services(&self) -> Arc<ServiceRegistry> {
        self.services.clone()
    }

    // ---- phase 2 ----

    /// Queue a post-init hook with the default priority and no dependencies.
    pub fn register_post_init_hook<F, Fut>(&self, name: impl Into<String>, f: F)
    where
        F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.register_post_init_hook_with(name, HookOptions::default(), f);
    }

    /// Queue a post-init hook with explicit priority and hook-level dependencies.
    pub fn register_post_init_hook_with<F, Fut>(
        &self,
        name: impl Into<String>,
        options: HookOptions,
        f: F,
    ) where
        F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let hook = PostInitHook::new(name, self.owner(), options, hook_fn(f));
        self.hooks.push(hook);
    }

    /// Register a callback run once at process shutdown, in reverse registration order.
    pub fn register_shutdown_handler<F, Fut>(&self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.shutdown.push(self.owner(), Box::new(move || f().boxed()));
    }

    // ---- read-only ----

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn current_module(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Best-effort: deserialize the module's config into `T`, fallback to `T::default()`
    /// if section is missing or invalid.
    pub fn module_config<T: DeserializeOwned + Default>(&self) -> T {
        match (&self.module_name, &self.config_provider) {
            (Some(name), Some(p)) => p
                .get_module_config(name)
                .and_then(|v| match serde_json::from_value::<T>(v.clone()) {
                    Ok(cfg) => Some(cfg),
                    Err(e) => {
                        tracing::warn!(module = %name, error = %e, "invalid module config, using defaults");
                        None
                    }
                })
                .unwrap_or_default(),
            _ => T::default(),
        }
    }

    /// Strict: deserialize the module's config into `T`, returning a pathful error on failure.
    pub fn module_config_required<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let name = self
            .module_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("context is not scoped to a module"))?;

        let prov = self
            .config_provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no ConfigProvider"))?;

        let val = prov
            .get_module_config(name)
            .ok_or_else(|| anyhow::anyhow!("missing module config: {name}"))?;

        let out: T = serde_json::from_value(val.clone())
            .map_err(|e| anyhow::anyhow!("invalid {name} config: {}", e))?;
        Ok(out)
    }
}
