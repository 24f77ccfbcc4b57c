//! View-tracking batching pipeline
//!
//! Page visits are appended to a queue table by [`ViewTracker`]. A scheduled
//! [`QueueDrainer`] run moves them into the permanent views table, either
//! triggered over HTTP by an external cron or by the in-process
//! [`DrainScheduler`].

pub mod drain;
pub mod scheduler;
pub mod tracker;

pub use drain::{DrainMode, DrainOutcome, QueueDrainer};
pub use scheduler::DrainScheduler;
pub use tracker::ViewTracker;
