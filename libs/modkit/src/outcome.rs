//! Per-module state tracking and the aggregated result of a run.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::contracts::Module;
use crate::manifest::ModuleDescriptor;

/// Lifecycle state of one scheduled module. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ModuleState {
    Discovered,
    Phase1Running,
    Phase1Done,
    Phase1Failed,
    Phase2Pending,
    Phase2Done,
    Phase2Failed,
}

impl ModuleState {
    pub fn can_transition_to(self, next: ModuleState) -> bool {
        use ModuleState::*;
        matches!(
            (self, next),
            (Discovered, Phase1Running)
                | (Phase1Running, Phase1Done)
                | (Phase1Running, Phase1Failed)
                | (Phase1Done, Phase2Pending)
                | (Phase2Pending, Phase2Done)
                | (Phase2Pending, Phase2Failed)
        )
    }

    pub fn is_failed(self) -> bool {
        matches!(self, ModuleState::Phase1Failed | ModuleState::Phase2Failed)
    }
}

#[derive(Clone)]
pub struct ModuleRecord {
    pub descriptor: ModuleDescriptor,
    pub state: ModuleState,
    /// Implementation handle; `None` when the catalog had no entry.
    pub instance: Option<Arc<dyn Module>>,
    /// Summary of the Phase-1 failure, if any.
    pub error: Option<String>,
}

impl ModuleRecord {
    pub fn new(descriptor: ModuleDescriptor) -> Self {
        Self {
            descriptor,
            state: ModuleState::Discovered,
            instance: None,
            error: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    /// Move to `next`; an illegal transition is logged and ignored.
    pub fn transition(&mut self, next: ModuleState) -> bool {
        if self.state.can_transition_to(next) {
            self.state = next;
            true
        } else {
            tracing::warn!(
                module = %self.descriptor.id,
                from = ?self.state,
                to = ?next,
                "ignoring illegal module state transition"
            );
            false
        }
    }
}

impl std::fmt::Debug for ModuleRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRecord")
            .field("id", &self.descriptor.id)
            .field("state", &self.state)
            .field("has_instance", &self.instance.is_some())
            .field("error", &self.error)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum LoadError {
    /// The bootstrap module failed Phase 1; the run stops here.
    #[error("critical module '{module}' failed to load")]
    CriticalModuleLoad {
        module: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' failed to load")]
    ModuleLoad {
        module: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Outcome of one run, read-only once built.
#[derive(Debug, Default)]
pub struct LoadResult {
    pub success: bool,
    /// Human-readable cause when `success` is false.
    pub fatal: Option<String>,
    /// Resolved load order.
    pub order: Vec<String>,
    pub failed_modules: Vec<String>,
    pub executed_hooks: Vec<String>,
    pub failed_hooks: Vec<String>,
    pub modules: Vec<ModuleRecord>,
}

impl LoadResult {
    /// A run that stopped before Phase 1.
    pub fn fatal(cause: &(dyn std::error::Error + 'static)) -> Self {
        Self {
            success: false,
            fatal: Some(error_chain(cause)),
            ..Default::default()
        }
    }

    /// Modules whose Phase-1 call was started.
    pub fn attempted_modules(&self) -> usize {
        self.modules
            .iter()
            .filter(|m| m.state != ModuleState::Discovered)
            .count()
    }

    /// Successful, but with at least one module or hook failure.
    pub fn is_degraded(&self) -> bool {
        self.success && (!self.failed_modules.is_empty() || !self.failed_hooks.is_empty())
    }

    pub fn state_of(&self, id: &str) -> Option<ModuleState> {
        self.modules.iter().find(|m| m.id() == id).map(|m| m.state)
    }
}

/// `outer: inner: root` rendering of an error and its sources.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        out.push_str(": ");
        out.push_str(&s.to_string());
        source = s.source();
    }
    out
}
