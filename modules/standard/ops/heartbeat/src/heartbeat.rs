use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use core_settings::SettingsApi;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Background ticker published as the `heartbeat` service.
pub struct Heartbeat {
    beats: Arc<AtomicU64>,
    stop: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Heartbeat {
    /// `stop` is usually a child of the host token so process shutdown ends the ticker.
    pub fn new(stop: CancellationToken) -> Self {
        Self {
            beats: Arc::new(AtomicU64::new(0)),
            stop,
            task: Mutex::new(None),
        }
    }

    pub fn beats(&self) -> u64 {
        self.beats.load(Ordering::Relaxed)
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Spawn the ticker. Returns false if it was already started.
    pub fn start(&self, settings: Arc<dyn SettingsApi>, interval: Duration, key: String) -> bool {
        let mut task = self.task.lock();
        if task.is_some() {
            return false;
        }

        let beats = self.beats.clone();
        let stop = self.stop.clone();
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let n = beats.fetch_add(1, Ordering::Relaxed) + 1;
                        settings.set(&key, chrono::Utc::now().to_rfc3339());
                        tracing::trace!(beat = n, "heartbeat");
                    }
                }
            }
            tracing::debug!(beats = beats.load(Ordering::Relaxed), "heartbeat stopped");
        }));
        true
    }

    /// Cancel the ticker and wait for it to exit.
    pub async fn stop(&self) -> anyhow::Result<()> {
        self.stop.cancel();
        let handle = self.task.lock().take();
        if let Some(handle) = handle {
            handle.await?;
        }
        Ok(())
    }
}
