//! Enqueue side of the pipeline

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};

use crate::core::types::validate_document_id;
use crate::storage::ViewStore;
use crate::system::metrics::Metrics;

/// Records page visits into the queue table
///
/// Tracking must never fail a page render, so [`ViewTracker::track`] has no
/// error path: failures are logged, counted and reported as `false`.
pub struct ViewTracker<S> {
    store: Arc<S>,
}

impl<S> Clone for ViewTracker<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: ViewStore> ViewTracker<S> {
    /// Create a tracker over the given store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Append one queued view for `document_id` stamped with the current time
    ///
    /// Returns whether a row was written.
    pub async fn track(&self, document_id: &str) -> bool {
        let document_id = match validate_document_id(document_id) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Ignoring view with invalid document id");
                return false;
            }
        };

        let metrics = &Metrics::global().enqueue;
        match self.store.enqueue_view(document_id, Utc::now()).await {
            Ok(()) => {
                metrics.views_enqueued.inc();
                debug!(document_id, "View queued");
                true
            }
            Err(e) => {
                metrics.enqueue_failures.inc();
                warn!(document_id, error = %e, "Failed to queue view");
                false
            }
        }
    }
}
