use super::cache::StatusCache;
use super::source::StatusSource;
use crate::error::{Result, TvStatusError};
use chrono::{DateTime, Utc};
use futures::FutureExt;
use parking_lot::Mutex;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Liveness of the background poll task
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Liveness {
    pub running: bool,
    pub last_cycle: Option<DateTime<Utc>>,
}

/// Cancellable periodic task driving [`StatusCache::poll`].
///
/// The first poll happens immediately on start. Cancellation is only observed
/// between cycles, so an in-flight device request always runs to its timeout.
pub struct StatusPoller {
    cache: Arc<StatusCache>,
    source: Arc<dyn StatusSource>,
    poll_interval: Duration,
    cancellation_token: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl StatusPoller {
    pub fn new(
        cache: Arc<StatusCache>,
        source: Arc<dyn StatusSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            cache,
            source,
            poll_interval,
            cancellation_token: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Tie this poller's lifetime to a parent token
    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn cache(&self) -> Arc<StatusCache> {
        Arc::clone(&self.cache)
    }

    /// Spawn the poll loop
    pub fn start(&self) -> Result<()> {
        let mut handle = self.handle.lock();
        if handle.is_some() {
            return Err(TvStatusError::component("poller", "already started"));
        }
        if self.cancellation_token.is_cancelled() {
            return Err(TvStatusError::component("poller", "already cancelled"));
        }

        info!(
            "Starting status poller (interval {:?})",
            self.poll_interval
        );

        let cache = Arc::clone(&self.cache);
        let source = Arc::clone(&self.source);
        let token = self.cancellation_token.clone();
        let period = self.poll_interval;

        *handle = Some(tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!("Status poll loop started");

            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                let cycle = AssertUnwindSafe(cache.poll(source.as_ref()))
                    .catch_unwind()
                    .await;

                match cycle {
                    Ok(outcome) => debug!("Poll cycle finished: {:?}", outcome),
                    Err(panic) => error!("Error in status poll loop: {}", panic_message(panic.as_ref())),
                }
            }

            info!("Status poll loop stopped");
        }));

        Ok(())
    }

    /// Signal the loop to exit and wait for the current cycle to finish
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping status poller");
        self.cancellation_token.cancel();

        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            handle
                .await
                .map_err(|e| TvStatusError::system(format!("Status poll task failed: {}", e)))?;
        }

        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .lock()
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    pub fn liveness(&self) -> Liveness {
        Liveness {
            running: self.is_running(),
            last_cycle: self.cache.last_cycle(),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
