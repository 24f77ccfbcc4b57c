//! Archive Server - back end for a public document archive
//!
//! Page visits are written to a queue table and moved into permanent view
//! records by a scheduled drain, so the hot path is a single insert. On top of
//! the view counts sit threaded comments, likes and a small analytics feed.
#![warn(missing_docs)]

// Configure global allocator for maximum performance
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

// Core foundational modules
pub mod core;

// Main functional modules
pub mod analytics;
pub mod api;
pub mod community;
pub mod pipeline;
pub mod storage;
pub mod system;

// Re-export commonly used items for convenience
pub use core::{AppState, Config, Error, Result};

/// Crate version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
