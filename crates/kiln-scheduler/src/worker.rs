//! Worker that polls the build queue on a fixed interval.

use crate::lifecycle::BuildLifecycle;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

/// A worker that advances at most one build per tick.
pub struct Worker {
    id: String,
    lifecycle: Arc<BuildLifecycle>,
    poll_interval: Duration,
}

impl Worker {
    pub fn new(
        id: impl Into<String>,
        lifecycle: Arc<BuildLifecycle>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            id: id.into(),
            lifecycle,
            poll_interval,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run the poll loop until `shutdown` flips to `true` or its sender is
    /// dropped. Stops only between ticks.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id = %self.id, interval = ?self.poll_interval, "Starting worker");

        let mut interval = time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            match self.lifecycle.tick(&self.id).await {
                Ok(Some(transition)) => debug!(worker_id = %self.id, ?transition, "Advanced build"),
                Ok(None) => {}
                Err(e) => warn!(worker_id = %self.id, error = %e, "Failed to claim build"),
            }
        }

        info!(worker_id = %self.id, "Worker stopped");
    }
}

/// Spawn `count` workers named `<prefix>-<n>` sharing one lifecycle.
pub fn spawn_workers(
    count: usize,
    prefix: &str,
    lifecycle: Arc<BuildLifecycle>,
    poll_interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    (0..count)
        .map(|n| {
            let worker = Worker::new(format!("{}-{}", prefix, n), lifecycle.clone(), poll_interval);
            let shutdown = shutdown.clone();
            tokio::spawn(async move { worker.run(shutdown).await })
        })
        .collect()
}
