//! Core system types and foundations
//!
//! Row types, error handling, configuration, logging setup and the shared
//! application state.

pub mod app_state;
pub mod config;
pub mod error;
pub mod factory;
pub mod logging;
pub mod types;

// Re-export commonly used items
pub use app_state::AppState;
pub use config::Config;
pub use error::{Error, Result};
pub use types::Timestamp;
