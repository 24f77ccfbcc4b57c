//! Core type definitions for the archive server
//!
//! Row types shared by the storage backends, the pipeline and the HTTP layer.
//! Timestamps are always UTC.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};

/// Timestamp type used for every stored row
pub type Timestamp = DateTime<Utc>;

/// Longest document identifier accepted, in bytes
pub const MAX_DOCUMENT_ID_LEN: usize = 512;

/// Longest comment body accepted, in characters
pub const MAX_COMMENT_LEN: usize = 5000;

/// Longest comment author name accepted, in characters
pub const MAX_AUTHOR_LEN: usize = 100;

/// Longest like user identifier accepted, in characters
pub const MAX_USER_IDENTIFIER_LEN: usize = 128;

/// Author name stored when a comment is posted without one
pub const ANONYMOUS_AUTHOR: &str = "Anonymous";

/// A pending page visit waiting in the queue table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct QueuedView {
    /// Queue row id, monotonically increasing
    pub id: i64,
    /// Document that was visited
    pub document_id: String,
    /// When the visit was enqueued
    pub queued_at: Timestamp,
}

/// A durable view, created only by draining the queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct ViewRecord {
    /// View row id
    pub id: i64,
    /// Document that was viewed
    pub document_id: String,
    /// Enqueue timestamp carried over from the queue row
    pub viewed_at: Timestamp,
}

/// State of the queue at the start of a drain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueSnapshot {
    /// Number of rows waiting
    pub pending: u64,
    /// Highest queue id seen; rows above it arrived after the snapshot
    pub max_id: Option<i64>,
}

impl QueueSnapshot {
    /// Highest id to drain, or `None` when there is nothing to do
    pub fn high_water_mark(&self) -> Option<i64> {
        if self.pending == 0 {
            None
        } else {
            self.max_id
        }
    }
}

/// A stored comment row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Comment {
    /// Comment id
    pub id: i64,
    /// Document the comment belongs to
    pub document_id: String,
    /// Parent comment for replies
    pub parent_id: Option<i64>,
    /// Display name of the author
    pub author_name: String,
    /// Comment body
    pub content: String,
    /// Creation time
    pub created_at: Timestamp,
}

/// A validated comment ready to be stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewComment {
    /// Document the comment belongs to
    pub document_id: String,
    /// Parent comment for replies
    pub parent_id: Option<i64>,
    /// Display name of the author
    pub author_name: String,
    /// Comment body
    pub content: String,
    /// Creation time
    pub created_at: Timestamp,
}

/// A comment with its nested replies
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommentThread {
    /// The comment itself
    #[serde(flatten)]
    pub comment: Comment,
    /// Direct replies, oldest first
    pub replies: Vec<CommentThread>,
}

impl CommentThread {
    /// Number of comments in this thread including the root
    pub fn len(&self) -> usize {
        1 + self.replies.iter().map(CommentThread::len).sum::<usize>()
    }

    /// A thread always holds at least its root comment
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Like state for a document as seen by one user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeStatus {
    /// Whether the user currently likes the document
    pub liked: bool,
    /// Total likes on the document
    pub likes: u64,
}

/// Per-document counters shown in the viewer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStats {
    /// Document id
    pub document_id: String,
    /// Drained views
    pub views: u64,
    /// Views still waiting in the queue
    pub pending_views: u64,
    /// Likes
    pub likes: u64,
    /// Comments, replies included
    pub comments: u64,
}

/// Archive-wide totals for the analytics dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct AnalyticsSummary {
    /// Drained views
    pub total_views: u64,
    /// Views still waiting in the queue
    pub pending_views: u64,
    /// Likes
    pub total_likes: u64,
    /// Comments
    pub total_comments: u64,
    /// Documents with at least one drained view
    pub unique_documents: u64,
}

/// Views on one UTC day
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyViews {
    /// Calendar day (UTC)
    pub day: NaiveDate,
    /// Views recorded that day
    pub views: u64,
}

/// A document ranked by views
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopDocument {
    /// Document id
    pub document_id: String,
    /// Drained views
    pub views: u64,
}

/// Trim and check a document identifier coming from a request
pub fn validate_document_id(raw: &str) -> Result<&str> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(Error::invalid_input("document id must not be empty"));
    }
    if id.len() > MAX_DOCUMENT_ID_LEN {
        return Err(Error::invalid_input(format!(
            "document id exceeds {} bytes",
            MAX_DOCUMENT_ID_LEN
        )));
    }
    Ok(id)
}

/// Convert a database count to an unsigned counter
pub(crate) fn to_count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}
