use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::domain::OverlayError;
use crate::ports::OverlayDht;

use super::cache::OverlayCache;

/// Background task running [`OverlayCache::refresh`] on a fixed interval.
///
/// The first cycle runs one interval after spawning. A failed cycle is
/// logged and the next tick runs as usual. The task ends when the
/// cancellation token fires, including in the middle of a cycle.
#[derive(Debug)]
pub struct RefreshTask {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

impl RefreshTask {
    /// Spawn the refresh loop on the current tokio runtime.
    pub fn spawn<D>(
        cache: Arc<OverlayCache<D>>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self
    where
        D: OverlayDht + 'static,
    {
        let token = cancel.clone();
        let interval = interval.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut cycle: u64 = 0;

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        cycle += 1;
                        match cache.refresh(&token).await {
                            Ok(report) if report.cancelled => break,
                            Ok(_) => {}
                            Err(OverlayError::Cancelled) => break,
                            Err(err) => warn!(cycle, error = %err, "overlay refresh failed"),
                        }
                    }
                }
            }
            info!(cycles = cycle, "refresh task stopped");
        });

        Self { handle, cancel }
    }

    /// Signal the task to stop.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the task and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(err) = self.handle.await {
            warn!(error = %err, "refresh task panicked");
        }
    }
}
