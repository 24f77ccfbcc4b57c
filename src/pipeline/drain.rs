//! Drain side of the pipeline
//!
//! A drain counts the queue, moves every row up to the highest id it saw into
//! the views table and deletes them from the queue. Rows enqueued after the
//! count stay for the next run.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::core::types::Timestamp;
use crate::core::{Error, Result};
use crate::storage::ViewStore;
use crate::system::metrics::{Metrics, Timer};

/// How queued rows reach the views table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrainMode {
    /// Copy and delete in one transaction; each row is recorded exactly once
    #[default]
    Atomic,
    /// Copy, then delete as a separate statement; a failure in between
    /// leaves the rows queued and the next drain records them again
    CopyThenDelete,
}

impl FromStr for DrainMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "atomic" => Ok(DrainMode::Atomic),
            "copy_then_delete" => Ok(DrainMode::CopyThenDelete),
            _ => Err(Error::config(format!(
                "Invalid drain mode: {}. Valid options: atomic, copy_then_delete",
                s
            ))),
        }
    }
}

/// Result of one drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DrainOutcome {
    /// Queue rows recorded as views
    pub processed: u64,
    /// When the drain finished
    pub timestamp: Timestamp,
}

/// Moves queued views into permanent storage
pub struct QueueDrainer<S> {
    store: Arc<S>,
    mode: DrainMode,
    // Serializes drains within this process; other processes are not coordinated.
    running: Mutex<()>,
}

impl<S: ViewStore> QueueDrainer<S> {
    /// Create a drainer over the given store
    pub fn new(store: Arc<S>, mode: DrainMode) -> Self {
        Self {
            store,
            mode,
            running: Mutex::new(()),
        }
    }

    /// Configured drain mode
    pub fn mode(&self) -> DrainMode {
        self.mode
    }

    /// Run one drain
    ///
    /// On error the queue is left as it was after the last successful
    /// statement, so retrying is always safe.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        let _running = self.running.lock().await;
        let metrics = &Metrics::global().drain;
        let timer = Timer::start(metrics.drain_duration.clone());

        let result = self.drain_locked().await;
        timer.finish();

        match &result {
            Ok(outcome) => {
                metrics.drains.inc();
                metrics.views_drained.inc_by(outcome.processed);
            }
            Err(e) => {
                metrics.drain_failures.inc();
                error!(
                    error = %e,
                    retryable = e.is_retryable(),
                    mode = ?self.mode,
                    "View queue drain failed"
                );
            }
        }
        result
    }

    async fn drain_locked(&self) -> Result<DrainOutcome> {
        let snapshot = self.store.queue_snapshot().await?;
        Metrics::global()
            .drain
            .queue_pending
            .set(i64::try_from(snapshot.pending).unwrap_or(i64::MAX));

        let Some(high_water) = snapshot.high_water_mark() else {
            debug!("View queue empty, nothing to drain");
            return Ok(DrainOutcome {
                processed: 0,
                timestamp: Utc::now(),
            });
        };

        let processed = match self.mode {
            DrainMode::Atomic => self.store.move_queued(high_water).await?,
            DrainMode::CopyThenDelete => {
                let copied = self.store.copy_queued(high_water).await?;
                let deleted = self.store.delete_queued(&copied).await?;
                let copied = copied.len() as u64;
                if deleted != copied {
                    warn!(copied, deleted, "Queue changed between copy and delete");
                }
                copied
            }
        };

        info!(processed, pending = snapshot.pending, mode = ?self.mode, "Drained view queue");
        Ok(DrainOutcome {
            processed,
            timestamp: Utc::now(),
        })
    }
}
