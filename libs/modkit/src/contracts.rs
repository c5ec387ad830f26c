use async_trait::async_trait;

/// Core module: registration only. Anything that needs other modules to be fully
/// set up belongs in a post-init hook.
#[async_trait]
pub trait Module: Send + Sync + 'static {
    /// Phase 1. Register services, post-init hooks and shutdown handlers.
    ///
    /// Returning `Ok(false)` reports a failed load without an error value.
    async fn initialize(&self, ctx: &crate::context::ModuleCtx) -> anyhow::Result<bool>;
}
