//! Periodic retention sweep of finished jobs.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::registry::JobRegistry;

/// Handle to stop a running sweeper.
#[derive(Debug)]
pub struct SweeperHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl SweeperHandle {
    /// Request shutdown and wait for the sweep task to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        let _ = self.join.await;
    }
}

/// Spawn a task that removes finished jobs older than `ttl` every `interval`.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_sweeper(registry: Arc<JobRegistry>, ttl: Duration, interval: Duration) -> SweeperHandle {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    let interval = interval.max(Duration::from_millis(1));

    let join = tokio::spawn(async move {
        info!(
            ttl_secs = ttl.as_secs(),
            interval_ms = interval.as_millis() as u64,
            "job retention sweeper started"
        );

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => sweep_once(&registry, ttl),
            }
        }

        info!("job retention sweeper stopped");
    });

    SweeperHandle { shutdown, join }
}

fn sweep_once(registry: &JobRegistry, ttl: Duration) {
    match registry.sweep_expired(Utc::now(), ttl) {
        Ok(0) => debug!("retention sweep removed nothing"),
        Ok(removed) => info!(removed, "retention sweep removed expired jobs"),
        Err(e) => error!(error = %e, "retention sweep failed"),
    }
}
