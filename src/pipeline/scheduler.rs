//! In-process drain scheduler
//!
//! For deployments without an external cron. Runs the drainer on a fixed
//! interval until the shutdown signal flips.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::pipeline::QueueDrainer;
use crate::storage::ViewStore;

/// Background task driving periodic drains
pub struct DrainScheduler {
    handle: JoinHandle<u64>,
}

impl DrainScheduler {
    /// Spawn the scheduler; the first drain runs one `interval` from now
    pub fn spawn<S>(
        drainer: Arc<QueueDrainer<S>>,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self
    where
        S: ViewStore + 'static,
    {
        let handle = tokio::spawn(async move {
            info!(interval_secs = interval.as_secs(), "Drain scheduler started");
            let mut ticker = time::interval_at(time::Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut runs = 0u64;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        runs += 1;
                        match drainer.drain().await {
                            Ok(_) => {}
                            Err(e) if e.is_retryable() => {
                                warn!(error = %e, "Scheduled drain failed, retrying next interval");
                            }
                            Err(e) => {
                                error!(error = %e, "Scheduled drain failed, next interval will try again");
                            }
                        }
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!(runs, "Drain scheduler stopped");
            runs
        });

        Self { handle }
    }

    /// Wait for the task to exit, returning how many drains it ran
    pub async fn join(self) -> u64 {
        self.handle.await.unwrap_or_default()
    }
}
