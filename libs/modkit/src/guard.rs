//! Timeout and panic isolation for module and hook calls.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("timed out after {0:?}")]
    TimedOut(Duration),
    #[error("panicked: {0}")]
    Panicked(String),
}

/// Await `fut` under `limit`, converting a panic into [`GuardError::Panicked`].
pub async fn guarded<F, T>(limit: Duration, fut: F) -> Result<T, GuardError>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, AssertUnwindSafe(fut).catch_unwind()).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(payload)) => Err(GuardError::Panicked(panic_message(payload.as_ref()))),
        Err(_) => Err(GuardError::TimedOut(limit)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_value_through() {
        assert_eq!(guarded(Duration::from_secs(1), async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn converts_panic() {
        let res: Result<(), _> = guarded(Duration::from_secs(1), async {
            panic!("boom");
        })
        .await;
        assert_eq!(res, Err(GuardError::Panicked("boom".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out() {
        let res = guarded(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
        })
        .await;
        assert_eq!(res, Err(GuardError::TimedOut(Duration::from_millis(10))));
    }
}
