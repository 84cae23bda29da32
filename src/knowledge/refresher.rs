//! Periodic knowledge-cache refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::KnowledgeCache;

/// Messages that can be sent to the refresher.
#[derive(Debug, Clone)]
pub enum RefresherMessage {
    /// Stop the refresher.
    Shutdown,
}

/// Re-reads every tab on a fixed interval.
///
/// The first tick fires immediately, which performs the cold load at
/// startup.
pub struct CacheRefresher {
    cache: Arc<KnowledgeCache>,
    interval: Duration,
}

impl CacheRefresher {
    #[must_use]
    pub const fn new(cache: Arc<KnowledgeCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Runs the refresh loop until shutdown.
    pub async fn run(&self, mut rx: mpsc::Receiver<RefresherMessage>) {
        info!("Cache refresher started (every {}s)", self.interval.as_secs());

        let mut timer = interval(self.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = timer.tick() => {
                    self.refresh_all().await;
                }
                // Shutdown, or every sender dropped
                _ = rx.recv() => {
                    info!("Cache refresher shutting down");
                    break;
                }
            }
        }
    }

    async fn refresh_all(&self) {
        let report = self.cache.refresh(None).await;
        if report.is_success() {
            debug!("Periodic refresh complete ({} tabs)", report.refreshed.len());
        } else {
            warn!(
                "Periodic refresh: {} tab(s) failed, serving previous data for them",
                report.failed.len()
            );
        }
    }
}

impl std::fmt::Debug for CacheRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheRefresher")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}
