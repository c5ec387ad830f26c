//! ModKit runtime runner.
//!
//! Design notes:
//! - Phase order: **discover → order → phase 1 → phase 2 → wait → shutdown**.
//! - A fatal load (cycle, duplicate id, bootstrap failure) skips the wait and goes
//!   straight to shutdown; the returned `LoadResult` carries the cause.
//! - Shutdown can be driven by OS signals, an external `CancellationToken`,
//!   or an arbitrary future.

use std::{future::Future, pin::Pin, sync::Arc};

use tokio_util::sync::CancellationToken;

use crate::catalog::ModuleCatalog;
use crate::context::ConfigProvider;
use crate::discovery::DiscoveryRoot;
use crate::outcome::LoadResult;
use crate::runtime::{HostRuntime, LoadOptions};

/// How the runtime should decide when to stop.
pub enum ShutdownOptions {
    /// Listen for OS signals (Ctrl+C / SIGTERM).
    Signals,
    /// An external `CancellationToken` controls the lifecycle.
    Token(CancellationToken),
    /// An arbitrary future; when it completes, we initiate shutdown.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

/// Options for running the ModKit runner.
pub struct RunOptions {
    /// Category roots to discover modules under.
    pub roots: Vec<DiscoveryRoot>,
    /// Static id → implementation table.
    pub catalog: ModuleCatalog,
    pub load: LoadOptions,
    /// Provider of module config sections (raw JSON by module id).
    pub modules_cfg: Option<Arc<dyn ConfigProvider>>,
    /// Shutdown strategy.
    pub shutdown: ShutdownOptions,
    /// Called once with the load outcome, before waiting for shutdown.
    pub on_loaded: Option<Box<dyn FnOnce(&LoadResult) + Send>>,
}

/// Full cycle: discover → order → phase 1 → phase 2 → wait → shutdown.
///
/// This function is a thin wrapper around HostRuntime that handles shutdown signal setup
/// and then delegates all lifecycle orchestration to the HostRuntime.
pub async fn run(opts: RunOptions) -> anyhow::Result<LoadResult> {
    // 1. Prepare cancellation token based on shutdown options
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    // 2. Spawn shutdown waiter (Signals / Future)
    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match modkit_bootstrap::wait_for_shutdown().await {
                    Ok(()) => {
                        tracing::info!("shutdown: signal received");
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "shutdown: primary waiter failed; falling back to ctrl_c()"
                        );
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("shutdown: external future completed");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::info!("shutdown: external token will control lifecycle");
        }
    }

    // 3. Instantiate HostRuntime and load
    let host = HostRuntime::new(opts.catalog, opts.load, opts.modules_cfg, cancel.clone());
    let result = host.start(&opts.roots).await;
    if let Some(on_loaded) = opts.on_loaded {
        on_loaded(&result);
    }

    // 4. Wait for cancellation unless the load was fatal
    if result.success {
        cancel.cancelled().await;
    } else {
        tracing::error!(
            cause = result.fatal.as_deref().unwrap_or("unknown"),
            "fatal load error; shutting down"
        );
    }

    // 5. Shutdown handlers
    let report = host.shutdown().await;
    for (owner, error) in &report.failed {
        tracing::warn!(module = %owner, error = %error, "shutdown handler failed");
    }

    Ok(result)
}
