//! Storage layer for the archive server
//!
//! Three traits split the backend surface by concern: the view queue, the
//! community tables and the analytics aggregates. Every backend implements all
//! three; [`StoreImpl`] bundles them so generic bounds stay short.
//!
//! Methods return `impl Future + Send` so the generic HTTP handlers built on
//! top of them remain `Send`.

use std::future::Future;

use crate::core::types::{
    AnalyticsSummary, Comment, NewComment, QueueSnapshot, Timestamp, TopDocument,
};
use crate::core::Result;
use chrono::NaiveDate;

/// Postgres backend (sqlx)
pub mod postgres;

/// In-memory backend
pub mod memory;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Queue table and views table primitives used by the batching pipeline
pub trait ViewStore: Send + Sync {
    /// Append one row to the queue table
    fn enqueue_view(
        &self,
        document_id: &str,
        queued_at: Timestamp,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Count pending rows and report the highest queue id
    fn queue_snapshot(&self) -> impl Future<Output = Result<QueueSnapshot>> + Send;

    /// Copy queue rows with `id <= up_to_id` into the views table
    ///
    /// Returns the ids of the rows copied. The queue is not modified.
    fn copy_queued(&self, up_to_id: i64) -> impl Future<Output = Result<Vec<i64>>> + Send;

    /// Delete the listed queue rows, returning how many went
    ///
    /// Ids come from [`ViewStore::copy_queued`]. Rows that became visible
    /// after the copy stay queued even when their id is below the high water
    /// mark.
    fn delete_queued(&self, ids: &[i64]) -> impl Future<Output = Result<u64>> + Send;

    /// Copy and delete queue rows with `id <= up_to_id` as one atomic step
    fn move_queued(&self, up_to_id: i64) -> impl Future<Output = Result<u64>> + Send;

    /// Drained views of one document
    fn view_count(&self, document_id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Queued, not yet drained, views of one document
    fn pending_view_count(&self, document_id: &str)
        -> impl Future<Output = Result<u64>> + Send;
}

/// Comments and likes
pub trait CommunityStore: Send + Sync {
    /// Store a validated comment and return the stored row
    fn insert_comment(&self, comment: NewComment) -> impl Future<Output = Result<Comment>> + Send;

    /// Document a comment belongs to, if the comment exists
    fn comment_document(&self, comment_id: i64)
        -> impl Future<Output = Result<Option<String>>> + Send;

    /// All comments of a document, flat, oldest first
    fn list_comments(&self, document_id: &str)
        -> impl Future<Output = Result<Vec<Comment>>> + Send;

    /// Number of comments on a document, replies included
    fn comment_count(&self, document_id: &str) -> impl Future<Output = Result<u64>> + Send;

    /// Whether the user likes the document
    fn has_like(&self, document_id: &str, user: &str)
        -> impl Future<Output = Result<bool>> + Send;

    /// Add a like; false when it already existed
    fn insert_like(
        &self,
        document_id: &str,
        user: &str,
        created_at: Timestamp,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Remove a like; false when there was none
    fn delete_like(&self, document_id: &str, user: &str)
        -> impl Future<Output = Result<bool>> + Send;

    /// Number of likes on a document
    fn like_count(&self, document_id: &str) -> impl Future<Output = Result<u64>> + Send;
}

/// Aggregates for the analytics dashboard
pub trait AnalyticsStore: Send + Sync {
    /// Archive-wide totals
    fn summary(&self) -> impl Future<Output = Result<AnalyticsSummary>> + Send;

    /// Views per UTC day for views at or after `since`, sparse, oldest first
    fn views_per_day(&self, since: Timestamp)
        -> impl Future<Output = Result<Vec<(NaiveDate, u64)>>> + Send;

    /// Documents with the most drained views
    fn top_documents(&self, limit: u32) -> impl Future<Output = Result<Vec<TopDocument>>> + Send;
}

/// Helper trait that combines all requirements for storage implementations
/// This cleans up generic bounds throughout the codebase
pub trait StoreImpl: ViewStore + CommunityStore + AnalyticsStore + Send + Sync + 'static {}

/// Blanket implementation for any type that meets the requirements
impl<T> StoreImpl for T where T: ViewStore + CommunityStore + AnalyticsStore + Send + Sync + 'static {}
