//! Application Factory
//!
//! Builds the AppState for the configured storage backend. Handlers are
//! generic over the store, so the backend choice is resolved once here and
//! carried as an enum until the router is built.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::core::app_state::AppState;
use crate::core::config::{Config, StorageType};
use crate::core::Result;
use crate::pipeline::{DrainOutcome, DrainScheduler};
use crate::storage::{MemoryStore, PostgresStore};

/// AppState for whichever backend the configuration selected
pub enum ConfiguredAppState {
    /// Postgres backend
    Postgres {
        /// The application state with the Postgres store
        app_state: Arc<AppState<PostgresStore>>,
    },
    /// In-memory backend
    Memory {
        /// The application state with the in-memory store
        app_state: Arc<AppState<MemoryStore>>,
    },
}

impl ConfiguredAppState {
    /// Get the configuration the state was built from
    pub fn config(&self) -> &Config {
        match self {
            ConfiguredAppState::Postgres { app_state } => &app_state.config,
            ConfiguredAppState::Memory { app_state } => &app_state.config,
        }
    }

    /// Get the HTTP address from config
    pub fn http_addr(&self) -> SocketAddr {
        self.config().server.http_addr
    }

    /// Run a single drain outside the HTTP server
    pub async fn drain_once(&self) -> Result<DrainOutcome> {
        match self {
            ConfiguredAppState::Postgres { app_state } => app_state.drainer.drain().await,
            ConfiguredAppState::Memory { app_state } => app_state.drainer.drain().await,
        }
    }

    /// Start the in-process drain scheduler when an interval is configured
    pub fn spawn_scheduler(&self, shutdown: watch::Receiver<bool>) -> Option<DrainScheduler> {
        let interval = self.config().pipeline.drain_interval?;
        let scheduler = match self {
            ConfiguredAppState::Postgres { app_state } => {
                DrainScheduler::spawn(app_state.drainer.clone(), interval, shutdown)
            }
            ConfiguredAppState::Memory { app_state } => {
                DrainScheduler::spawn(app_state.drainer.clone(), interval, shutdown)
            }
        };
        Some(scheduler)
    }
}

/// Create AppState based on configuration
///
/// Connects to Postgres (and applies migrations) when that backend is
/// selected. The configuration should already be validated.
pub async fn create_app_state(config: Config) -> Result<ConfiguredAppState> {
    info!(storage_type = ?config.storage.storage_type, drain_mode = ?config.pipeline.drain_mode, "Creating AppState");

    match config.storage.storage_type {
        StorageType::Postgres => {
            let store = PostgresStore::connect(&config.database).await?;
            info!("Postgres store initialized");
            let app_state = Arc::new(AppState::new(Arc::new(store), config));
            Ok(ConfiguredAppState::Postgres { app_state })
        }
        StorageType::Memory => {
            info!("In-memory store initialized; data is lost on exit");
            let app_state = Arc::new(AppState::new(Arc::new(MemoryStore::new()), config));
            Ok(ConfiguredAppState::Memory { app_state })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn memory_config() -> Config {
        let mut config = Config::default();
        config.storage.storage_type = StorageType::Memory;
        config
    }

    #[tokio::test]
    async fn test_memory_state_creation() {
        let state = create_app_state(memory_config()).await.unwrap();
        assert!(matches!(state, ConfiguredAppState::Memory { .. }));
        assert_eq!(state.http_addr().port(), 8080);
        assert_eq!(state.drain_once().await.unwrap().processed, 0);
    }

    #[tokio::test]
    async fn test_scheduler_only_with_interval() {
        let (tx, rx) = watch::channel(false);
        let state = create_app_state(memory_config()).await.unwrap();
        assert!(state.spawn_scheduler(rx.clone()).is_none());

        let mut config = memory_config();
        config.pipeline.drain_interval = Some(Duration::from_secs(3600));
        let state = create_app_state(config).await.unwrap();
        let scheduler = state.spawn_scheduler(rx).unwrap();

        tx.send(true).unwrap();
        assert_eq!(scheduler.join().await, 0);
    }
}
