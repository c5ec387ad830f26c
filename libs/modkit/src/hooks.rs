//! Phase 2: post-init hooks.
//!
//! Hooks are queued by modules during Phase 1 and swept once after every module has
//! been initialized. Ordering is by ascending priority (registration order for ties),
//! constrained by hook-level `depends_on`. Dependencies always win over priority.
//!
//! A sweep runs in passes. Each pass executes every hook whose dependencies have all
//! executed. Passes repeat until one makes no progress; hooks left over at that point
//! fail with an unsatisfiable dependency. A failing hook never stops the sweep.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::ModuleCtx;
use crate::guard::guarded;

pub const DEFAULT_HOOK_PRIORITY: i32 = 100;

pub type HookFn = Arc<dyn Fn(ModuleCtx) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// Erase an async closure into a [`HookFn`].
pub fn hook_fn<F, Fut>(f: F) -> HookFn
where
    F: Fn(ModuleCtx) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(move |ctx| f(ctx).boxed())
}

/// Priority and dependencies of a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookOptions {
    pub priority: i32,
    pub depends_on: Vec<String>,
}

impl Default for HookOptions {
    fn default() -> Self {
        Self {
            priority: DEFAULT_HOOK_PRIORITY,
            depends_on: Vec::new(),
        }
    }
}

impl HookOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn depends_on<I, S>(mut self, hooks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = hooks.into_iter().map(Into::into).collect();
        self
    }
}

pub struct PostInitHook {
    pub name: String,
    /// Id of the module that registered the hook.
    pub owner: String,
    pub priority: i32,
    pub depends_on: Vec<String>,
    pub executed: bool,
    func: HookFn,
}

impl PostInitHook {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        options: HookOptions,
        func: HookFn,
    ) -> Self {
        Self {
            name: name.into(),
            owner: owner.into(),
            priority: options.priority,
            depends_on: options.depends_on,
            executed: false,
            func,
        }
    }
}

impl std::fmt::Debug for PostInitHook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostInitHook")
            .field("name", &self.name)
            .field("owner", &self.owner)
            .field("priority", &self.priority)
            .field("depends_on", &self.depends_on)
            .field("executed", &self.executed)
            .finish()
    }
}

/// Hooks accumulated during Phase 1, in registration order.
#[derive(Default)]
pub struct HookQueue {
    hooks: Mutex<Vec<PostInitHook>>,
}

impl HookQueue {
    /// Queue `hook`. A second hook with an already-queued name is rejected.
    pub fn push(&self, hook: PostInitHook) -> bool {
        let mut hooks = self.hooks.lock();
        if let Some(existing) = hooks.iter().find(|h| h.name == hook.name) {
            tracing::warn!(
                hook = %hook.name,
                module = %hook.owner,
                registered_by = %existing.owner,
                "duplicate post-init hook name; keeping the first registration"
            );
            return false;
        }
        tracing::debug!(hook = %hook.name, module = %hook.owner, priority = hook.priority, "post-init hook queued");
        hooks.push(hook);
        true
    }

    pub fn len(&self) -> usize {
        self.hooks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.lock().is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.hooks.lock().iter().map(|h| h.name.clone()).collect()
    }

    /// Take every queued hook, leaving the queue empty.
    pub fn drain(&self) -> Vec<PostInitHook> {
        std::mem::take(&mut *self.hooks.lock())
    }
}

/// How eligible hooks of one pass are executed.
///
/// The two modes can record hooks in different orders. With hooks `A(10)`,
/// `B(20, after A)` and `C(30)`, `Sequential` runs `A, B, C` because `B`
/// becomes eligible as soon as `A` finishes, while `Concurrent` runs `A` and
/// `C` in the first pass and `B` in the next, recording `A, C, B`. Dependency
/// order holds in both; priority order across passes does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookExecution {
    /// One at a time in priority order; eligibility is re-evaluated after every hook.
    #[default]
    Sequential,
    /// Eligibility is fixed at the start of a pass and the batch runs concurrently.
    Concurrent,
}

impl std::str::FromStr for HookExecution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequential" => Ok(Self::Sequential),
            "concurrent" => Ok(Self::Concurrent),
            other => anyhow::bail!("unknown hook execution mode '{other}' (expected sequential|concurrent)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum HookError {
    #[error("hook '{hook}' has an unsatisfiable dependency ({reason}): {}", missing.join(", "))]
    DependencyUnsatisfiable {
        hook: String,
        reason: &'static str,
        missing: Vec<String>,
    },
    #[error("hook '{hook}' failed")]
    Execution {
        hook: String,
        #[source]
        source: anyhow::Error,
    },
}

pub const REASON_UNKNOWN_DEPENDENCY: &str = "unknown dependency";
pub const REASON_UNSATISFIABLE_DEPENDENCY: &str = "unsatisfiable dependency";

#[derive(Debug)]
pub struct HookFailure {
    pub hook: String,
    pub owner: String,
    pub error: HookError,
}

/// Outcome of one Phase-2 sweep.
#[derive(Debug, Default)]
pub struct HookSweep {
    /// Names of hooks that completed, in execution order.
    pub executed: Vec<String>,
    pub failed: Vec<HookFailure>,
}

impl HookSweep {
    pub fn failed_names(&self) -> Vec<String> {
        self.failed.iter().map(|f| f.hook.clone()).collect()
    }
}

/// Executes a set of hooks under the configured strategy and per-hook timeout.
#[derive(Debug, Clone)]
pub struct HookScheduler {
    execution: HookExecution,
    timeout: Duration,
}

impl Default for HookScheduler {
    fn default() -> Self {
        Self {
            execution: HookExecution::Sequential,
            timeout: Duration::from_secs(30),
        }
    }
}

impl HookScheduler {
    pub fn new(execution: HookExecution, timeout: Duration) -> Self {
        Self { execution, timeout }
    }

    pub async fn run(&self, hooks: Vec<PostInitHook>, ctx: &ModuleCtx) -> HookSweep {
        tracing::info!(hooks = hooks.len(), mode = ?self.execution, "Phase: post-init hooks");

        let mut hooks = hooks;
        hooks.sort_by_key(|h| h.priority); // stable: registration order for ties

        let known: HashSet<String> = hooks.iter().map(|h| h.name.clone()).collect();
        let mut sweep = HookSweep::default();
        let mut executed: HashSet<String> = HashSet::new();

        let mut pending = Vec::with_capacity(hooks.len());
        for h in hooks {
            let missing: Vec<String> = h
                .depends_on
                .iter()
                .filter(|d| !known.contains(d.as_str()))
                .cloned()
                .collect();
            if missing.is_empty() {
                pending.push(h);
            } else {
                Self::record_failure(
                    &mut sweep,
                    &h,
                    HookError::DependencyUnsatisfiable {
                        hook: h.name.clone(),
                        reason: REASON_UNKNOWN_DEPENDENCY,
                        missing,
                    },
                );
            }
        }

        loop {
            let before = pending.len();
            pending = match self.execution {
                HookExecution::Sequential => {
                    self.sequential_pass(pending, ctx, &mut executed, &mut sweep)
                        .await
                }
                HookExecution::Concurrent => {
                    self.concurrent_pass(pending, ctx, &mut executed, &mut sweep)
                        .await
                }
            };
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }

        for h in pending {
            let missing: Vec<String> = h
                .depends_on
                .iter()
                .filter(|d| !executed.contains(d.as_str()))
                .cloned()
                .collect();
            Self::record_failure(
                &mut sweep,
                &h,
                HookError::DependencyUnsatisfiable {
                    hook: h.name.clone(),
                    reason: REASON_UNSATISFIABLE_DEPENDENCY,
                    missing,
                },
            );
        }

        tracing::info!(
            executed = sweep.executed.len(),
            failed = sweep.failed.len(),
            "post-init hooks complete"
        );
        sweep
    }

    async fn sequential_pass(
        &self,
        pending: Vec<PostInitHook>,
        ctx: &ModuleCtx,
        executed: &mut HashSet<String>,
        sweep: &mut HookSweep,
    ) -> Vec<PostInitHook> {
        let mut remaining = Vec::new();
        for mut h in pending {
            if !h.depends_on.iter().all(|d| executed.contains(d.as_str())) {
                remaining.push(h);
                continue;
            }
            match self.invoke(&h, ctx).await {
                Ok(()) => Self::record_success(sweep, executed, &mut h),
                Err(e) => Self::record_failure(sweep, &h, e),
            }
        }
        remaining
    }

    async fn concurrent_pass(
        &self,
        pending: Vec<PostInitHook>,
        ctx: &ModuleCtx,
        executed: &mut HashSet<String>,
        sweep: &mut HookSweep,
    ) -> Vec<PostInitHook> {
        let (mut batch, remaining): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|h| h.depends_on.iter().all(|d| executed.contains(d.as_str())));

        let results = futures::future::join_all(batch.iter().map(|h| self.invoke(h, ctx))).await;
        for (h, result) in batch.iter_mut().zip(results) {
            match result {
                Ok(()) => Self::record_success(sweep, executed, h),
                Err(e) => Self::record_failure(sweep, h, e),
            }
        }
        remaining
    }

    async fn invoke(&self, hook: &PostInitHook, ctx: &ModuleCtx) -> Result<(), HookError> {
        tracing::debug!(hook = %hook.name, module = %hook.owner, priority = hook.priority, "running post-init hook");
        let fut = (hook.func)(ctx.for_module(&hook.owner));
        let source = match guarded(self.timeout, fut).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(g) => anyhow::Error::new(g),
        };
        Err(HookError::Execution {
            hook: hook.name.clone(),
            source,
        })
    }

    fn record_success(sweep: &mut HookSweep, executed: &mut HashSet<String>, hook: &mut PostInitHook) {
        hook.executed = true;
        executed.insert(hook.name.clone());
        sweep.executed.push(hook.name.clone());
        tracing::info!(hook = %hook.name, module = %hook.owner, "post-init hook executed");
    }

    fn record_failure(sweep: &mut HookSweep, hook: &PostInitHook, error: HookError) {
        tracing::error!(
            hook = %hook.name,
            module = %hook.owner,
            phase = "phase2",
            error = %crate::outcome::error_chain(&error),
            "post-init hook failed"
        );
        sweep.failed.push(HookFailure {
            hook: hook.name.clone(),
            owner: hook.owner.clone(),
            error,
        });
    }
}

/// Sweep `hooks` sequentially with the default timeout.
pub async fn run_phase2(hooks: Vec<PostInitHook>, ctx: &ModuleCtx) -> HookSweep {
    HookScheduler::default().run(hooks, ctx).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ModuleCtxBuilder;
    use tokio_util::sync::CancellationToken;

    type Calls = Arc<Mutex<Vec<String>>>;

    #[test]
    fn execution_mode_parses_case_insensitively() {
        assert_eq!("Concurrent".parse::<HookExecution>().unwrap(), HookExecution::Concurrent);
        assert_eq!(" sequential ".parse::<HookExecution>().unwrap(), HookExecution::Sequential);
        assert!("parallel".parse::<HookExecution>().is_err());
    }

    fn hook(name: &str, priority: i32, deps: &[&str], calls: &Calls) -> PostInitHook {
        let calls = calls.clone();
        let label = name.to_string();
        PostInitHook::new(
            name,
            "core.test",
            HookOptions::new().priority(priority).depends_on(deps.iter().copied()),
            hook_fn(move |_ctx| {
                let calls = calls.clone();
                let label = label.clone();
                async move {
                    calls.lock().push(label);
                    Ok(())
                }
            }),
        )
    }

    fn failing(name: &str, priority: i32) -> PostInitHook {
        PostInitHook::new(
            name,
            "core.test",
            HookOptions::new().priority(priority),
            hook_fn(|_ctx| async { Err(anyhow::anyhow!("nope")) }),
        )
    }

    fn ctx() -> ModuleCtx {
        ModuleCtxBuilder::new(CancellationToken::new()).build()
    }

    #[tokio::test]
    async fn runs_in_priority_order() {
        let calls = Calls::default();
        let hooks = vec![hook("late", 50, &[], &calls), hook("early", 5, &[], &calls)];

        let sweep = run_phase2(hooks, &ctx()).await;
        assert_eq!(*calls.lock(), vec!["early", "late"]);
        assert_eq!(sweep.executed, vec!["early", "late"]);
        assert!(sweep.failed.is_empty());
    }

    #[tokio::test]
    async fn equal_priority_keeps_registration_order() {
        let calls = Calls::default();
        let hooks = vec![
            hook("b", 100, &[], &calls),
            hook("a", 100, &[], &calls),
            hook("c", 100, &[], &calls),
        ];
        run_phase2(hooks, &ctx()).await;
        assert_eq!(*calls.lock(), vec!["b", "a", "c"]);
    }

    #[tokio::test]
    async fn dependency_dominates_priority() {
        let calls = Calls::default();
        let hooks = vec![hook("A", 10, &[], &calls), hook("B", 5, &["A"], &calls)];

        let sweep = run_phase2(hooks, &ctx()).await;
        assert_eq!(*calls.lock(), vec!["A", "B"]);
        assert_eq!(sweep.executed, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn unknown_dependency_fails_only_that_hook() {
        let calls = Calls::default();
        let hooks = vec![hook("ok", 1, &[], &calls), hook("orphan", 2, &["ghost"], &calls)];

        let sweep = run_phase2(hooks, &ctx()).await;
        assert_eq!(sweep.executed, vec!["ok"]);
        assert_eq!(sweep.failed_names(), vec!["orphan"]);
        match &sweep.failed[0].error {
            HookError::DependencyUnsatisfiable { reason, missing, .. } => {
                assert_eq!(*reason, REASON_UNKNOWN_DEPENDENCY);
                assert_eq!(missing, &vec!["ghost".to_string()]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_dependency_leaves_dependents_unsatisfiable() {
        let calls = Calls::default();
        let hooks = vec![
            failing("base", 1),
            hook("child", 2, &["base"], &calls),
            hook("other", 3, &[], &calls),
        ];

        let sweep = run_phase2(hooks, &ctx()).await;
        assert_eq!(sweep.executed, vec!["other"]);
        assert_eq!(sweep.failed_names(), vec!["base", "child"]);
        assert!(matches!(sweep.failed[0].error, HookError::Execution { .. }));
        match &sweep.failed[1].error {
            HookError::DependencyUnsatisfiable { reason, .. } => {
                assert_eq!(*reason, REASON_UNSATISFIABLE_DEPENDENCY)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_hook_is_isolated() {
        let calls = Calls::default();
        let boom = PostInitHook::new(
            "boom",
            "core.test",
            HookOptions::new().priority(1),
            hook_fn(|_ctx| async {
                if true {
                    panic!("hook exploded");
                }
                Ok(())
            }),
        );
        let sweep = run_phase2(vec![boom, hook("after", 2, &[], &calls)], &ctx()).await;
        assert_eq!(sweep.executed, vec!["after"]);
        assert_eq!(sweep.failed_names(), vec!["boom"]);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_hook_times_out() {
        let slow = PostInitHook::new(
            "slow",
            "core.test",
            HookOptions::new(),
            hook_fn(|_ctx| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }),
        );
        let sweep = HookScheduler::new(HookExecution::Sequential, Duration::from_millis(50))
            .run(vec![slow], &ctx())
            .await;
        assert_eq!(sweep.failed_names(), vec!["slow"]);
    }

    #[tokio::test]
    async fn concurrent_mode_respects_dependencies() {
        let calls = Calls::default();
        let hooks = vec![
            hook("c", 1, &["b"], &calls),
            hook("b", 2, &["a"], &calls),
            hook("a", 3, &[], &calls),
            hook("x", 4, &[], &calls),
        ];
        let sweep = HookScheduler::new(HookExecution::Concurrent, Duration::from_secs(5))
            .run(hooks, &ctx())
            .await;
        assert_eq!(sweep.executed, vec!["a", "x", "b", "c"]);
        assert!(sweep.failed.is_empty());
    }

    #[tokio::test]
    async fn modes_differ_when_a_dependency_unlocks_mid_pass() {
        let mk = |calls: &Calls| {
            vec![
                hook("A", 10, &[], calls),
                hook("B", 20, &["A"], calls),
                hook("C", 30, &[], calls),
            ]
        };

        let calls = Calls::default();
        let sweep = HookScheduler::new(HookExecution::Sequential, Duration::from_secs(5))
            .run(mk(&calls), &ctx())
            .await;
        assert_eq!(sweep.executed, vec!["A", "B", "C"]);

        let calls = Calls::default();
        let sweep = HookScheduler::new(HookExecution::Concurrent, Duration::from_secs(5))
            .run(mk(&calls), &ctx())
            .await;
        assert_eq!(sweep.executed, vec!["A", "C", "B"]);
    }

    #[tokio::test]
    async fn mutual_dependency_fails_both() {
        let calls = Calls::default();
        let hooks = vec![hook("p", 1, &["q"], &calls), hook("q", 2, &["p"], &calls)];
        let sweep = run_phase2(hooks, &ctx()).await;
        assert!(sweep.executed.is_empty());
        assert_eq!(sweep.failed_names(), vec!["p", "q"]);
        assert!(calls.lock().is_empty());
    }

    #[test]
    fn queue_rejects_duplicate_names() {
        let calls = Calls::default();
        let q = HookQueue::default();
        assert!(q.push(hook("h", 1, &[], &calls)));
        assert!(!q.push(hook("h", 2, &[], &calls)));
        assert_eq!(q.len(), 1);
        assert_eq!(q.drain()[0].priority, 1);
        assert!(q.is_empty());
    }
}
