//! System utilities and monitoring
//!
//! Metrics for the view pipeline and the process uptime used by `/health`.

pub mod metrics;

use once_cell::sync::Lazy;
use std::time::{Duration, Instant};

static STARTED_AT: Lazy<Instant> = Lazy::new(Instant::now);

/// Mark process start; later calls are no-ops
pub fn mark_started() {
    Lazy::force(&STARTED_AT);
}

/// Time since [`mark_started`] was first called
pub fn uptime() -> Duration {
    STARTED_AT.elapsed()
}
