//! # ModKit - Manifest-driven Module Runtime
//!
//! Discovers modules from `manifest.json` files, orders them by their declared
//! dependencies and drives each through a two-phase startup:
//!
//! - **Phase 1** (`Module::initialize`): strictly sequential, in dependency order.
//!   Modules register services, post-init hooks and shutdown handlers.
//! - **Phase 2** (post-init hooks): swept once after Phase 1, ordered by hook
//!   priority and hook-level dependencies.
//!
//! One module, the *bootstrap* module, is pinned first and its failure aborts the
//! run. Every other failure is isolated and reported in [`LoadResult`].
//!
//! ## Module Example
//!
//! ```rust,ignore
//! use modkit::{async_trait, HookOptions, Module, ModuleCtx};
//! use std::sync::Arc;
//!
//! pub struct SettingsModule;
//!
//! #[async_trait]
//! impl Module for SettingsModule {
//!     async fn initialize(&self, ctx: &ModuleCtx) -> anyhow::Result<bool> {
//!         let Some(db) = ctx.get_service::<dyn KvStore>("database") else {
//!             return Ok(false);
//!         };
//!         ctx.register_service::<dyn SettingsApi>("settings", Arc::new(Settings::new(db)));
//!         ctx.register_post_init_hook_with(
//!             "settings.load",
//!             HookOptions::new().priority(10).depends_on(["database.ready"]),
//!             |ctx| async move { load_settings(&ctx).await },
//!         );
//!         Ok(true)
//!     }
//! }
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

// Core module contracts and traits
pub mod contracts;
pub use contracts::Module;

pub mod context;
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};

pub mod catalog;
pub use catalog::{ModuleCatalog, ModuleFactory};

pub mod manifest;
pub use manifest::{Category, Manifest, ManifestError, ModuleDescriptor};

pub mod discovery;
pub use discovery::{discover, roots_under, DiscoveryError, DiscoveryReport, DiscoveryRoot, ModuleDiscovery};

pub mod registry;
pub use registry::{order, ModuleOrder, RegistryError};

pub mod services;
pub use services::ServiceRegistry;

pub mod hooks;
pub use hooks::{
    hook_fn, run_phase2, HookError, HookExecution, HookOptions, HookScheduler, HookSweep,
    PostInitHook, DEFAULT_HOOK_PRIORITY,
};

pub mod guard;
pub mod outcome;
pub use outcome::{LoadError, LoadResult, ModuleRecord, ModuleState};

pub mod runtime;
pub use runtime::{run, HostRuntime, LoadOptions, RunOptions, ShutdownOptions};
