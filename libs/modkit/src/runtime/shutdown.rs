use std::time::Duration;

use futures::future::BoxFuture;
use parking_lot::Mutex;

use crate::guard::guarded;

pub type ShutdownFn = Box<dyn FnOnce() -> BoxFuture<'static, anyhow::Result<()>> + Send>;

struct Handler {
    owner: String,
    func: ShutdownFn,
}

/// Shutdown callbacks, run once in reverse registration order.
#[derive(Default)]
pub struct ShutdownHandlers {
    handlers: Mutex<Vec<Handler>>,
}

/// What happened while running shutdown handlers.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Owners of handlers that completed, in execution order.
    pub completed: Vec<String>,
    /// `(owner, error)` for handlers that failed, panicked or timed out.
    pub failed: Vec<(String, String)>,
}

impl ShutdownHandlers {
    pub fn push(&self, owner: &str, func: ShutdownFn) {
        tracing::debug!(module = owner, "shutdown handler registered");
        self.handlers.lock().push(Handler {
            owner: owner.to_string(),
            func,
        });
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.lock().is_empty()
    }

    /// Drain and run every handler, newest first. One failure never skips the rest.
    pub async fn run_all(&self, limit: Duration) -> ShutdownReport {
        let handlers = std::mem::take(&mut *self.handlers.lock());
        let mut report = ShutdownReport::default();

        for Handler { owner, func } in handlers.into_iter().rev() {
            let outcome = match guarded(limit, func()).await {
                Ok(Ok(())) => Ok(()),
                Ok(Err(e)) => Err(format!("{e:#}")),
                Err(g) => Err(g.to_string()),
            };
            match outcome {
                Ok(()) => {
                    tracing::debug!(module = %owner, "shutdown handler completed");
                    report.completed.push(owner);
                }
                Err(error) => {
                    tracing::warn!(module = %owner, phase = "shutdown", error = %error, "shutdown handler failed");
                    report.failed.push((owner, error));
                }
            }
        }
        report
    }
}
