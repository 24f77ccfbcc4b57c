//! Application State Management
//!
//! This module defines the central AppState that holds the store and every
//! service built on it. It is created once by the factory and shared with
//! the HTTP handlers behind an `Arc`.

use std::sync::Arc;

use crate::analytics::AnalyticsService;
use crate::community::{CommentService, LikeService};
use crate::core::config::Config;
use crate::pipeline::{QueueDrainer, ViewTracker};
use crate::storage::StoreImpl;

/// Central application state holding all services and components
pub struct AppState<S: StoreImpl> {
    /// Storage backend
    pub store: Arc<S>,

    /// Application configuration
    pub config: Arc<Config>,

    /// Enqueue side of the view pipeline
    pub tracker: ViewTracker<S>,

    /// Drain side of the view pipeline, shared with the scheduler
    pub drainer: Arc<QueueDrainer<S>>,

    /// Threaded comments
    pub comments: CommentService<S>,

    /// Likes
    pub likes: LikeService<S>,

    /// Dashboard aggregates and document counters
    pub analytics: AnalyticsService<S>,
}

impl<S: StoreImpl> AppState<S> {
    /// Wire every service to the given store
    pub fn new(store: Arc<S>, config: Config) -> Self {
        let drainer = Arc::new(QueueDrainer::new(store.clone(), config.pipeline.drain_mode));

        Self {
            tracker: ViewTracker::new(store.clone()),
            drainer,
            comments: CommentService::new(store.clone()),
            likes: LikeService::new(store.clone()),
            analytics: AnalyticsService::new(store.clone()),
            config: Arc::new(config),
            store,
        }
    }

    /// Secret the drain endpoint checks, if one is configured
    pub fn cron_secret(&self) -> Option<&str> {
        self.config.cron_secret()
    }
}
