//! In-memory storage backend
//!
//! Mirrors the Postgres tables closely enough that the pipeline behaves the
//! same on both: queue ids grow monotonically, the copy and delete steps are
//! separate critical sections, and the move step holds the lock throughout.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::Mutex;

use crate::core::types::{
    AnalyticsSummary, Comment, NewComment, QueueSnapshot, QueuedView, Timestamp, TopDocument,
    ViewRecord,
};
use crate::core::{Error, Result};
use crate::storage::{AnalyticsStore, CommunityStore, ViewStore};

#[derive(Default)]
struct ViewTables {
    next_queue_id: i64,
    next_view_id: i64,
    queue: Vec<QueuedView>,
    views: Vec<ViewRecord>,
}

impl ViewTables {
    fn copy_up_to(&mut self, up_to_id: i64) -> Vec<i64> {
        let rows: Vec<(i64, String, Timestamp)> = self
            .queue
            .iter()
            .filter(|row| row.id <= up_to_id)
            .map(|row| (row.id, row.document_id.clone(), row.queued_at))
            .collect();

        let mut copied = Vec::with_capacity(rows.len());
        for (id, document_id, viewed_at) in rows {
            self.next_view_id += 1;
            self.views.push(ViewRecord {
                id: self.next_view_id,
                document_id,
                viewed_at,
            });
            copied.push(id);
        }
        copied
    }

    fn delete_ids(&mut self, ids: &[i64]) -> u64 {
        let ids: HashSet<i64> = ids.iter().copied().collect();
        let before = self.queue.len();
        self.queue.retain(|row| !ids.contains(&row.id));
        (before - self.queue.len()) as u64
    }
}

/// Storage kept entirely in process memory
pub struct MemoryStore {
    tables: Mutex<ViewTables>,

    /// Comments keyed by id
    comments: DashMap<i64, Comment>,
    next_comment_id: AtomicI64,

    /// Like timestamps keyed by (document_id, user_identifier)
    likes: DashMap<(String, String), Timestamp>,

    unavailable: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            tables: Mutex::new(ViewTables::default()),
            comments: DashMap::new(),
            next_comment_id: AtomicI64::new(0),
            likes: DashMap::new(),
            unavailable: AtomicBool::new(false),
        }
    }

    /// Make every operation fail as if the backend were unreachable
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Rows currently waiting in the queue, oldest first
    pub fn queued_views(&self) -> Vec<QueuedView> {
        self.tables.lock().queue.clone()
    }

    /// Drained view rows, in insertion order
    pub fn view_records(&self) -> Vec<ViewRecord> {
        self.tables.lock().views.clone()
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(Error::unavailable("memory store is marked unavailable"))
        } else {
            Ok(())
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewStore for MemoryStore {
    async fn enqueue_view(&self, document_id: &str, queued_at: Timestamp) -> Result<()> {
        self.check_available()?;
        let mut tables = self.tables.lock();
        tables.next_queue_id += 1;
        let id = tables.next_queue_id;
        tables.queue.push(QueuedView {
            id,
            document_id: document_id.to_string(),
            queued_at,
        });
        Ok(())
    }

    async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        self.check_available()?;
        let tables = self.tables.lock();
        Ok(QueueSnapshot {
            pending: tables.queue.len() as u64,
            max_id: tables.queue.iter().map(|row| row.id).max(),
        })
    }

    async fn copy_queued(&self, up_to_id: i64) -> Result<Vec<i64>> {
        self.check_available()?;
        Ok(self.tables.lock().copy_up_to(up_to_id))
    }

    async fn delete_queued(&self, ids: &[i64]) -> Result<u64> {
        self.check_available()?;
        Ok(self.tables.lock().delete_ids(ids))
    }

    async fn move_queued(&self, up_to_id: i64) -> Result<u64> {
        self.check_available()?;
        let mut tables = self.tables.lock();
        let copied = tables.copy_up_to(up_to_id);
        Ok(tables.delete_ids(&copied))
    }

    async fn view_count(&self, document_id: &str) -> Result<u64> {
        self.check_available()?;
        let tables = self.tables.lock();
        Ok(tables
            .views
            .iter()
            .filter(|view| view.document_id == document_id)
            .count() as u64)
    }

    async fn pending_view_count(&self, document_id: &str) -> Result<u64> {
        self.check_available()?;
        let tables = self.tables.lock();
        Ok(tables
            .queue
            .iter()
            .filter(|row| row.document_id == document_id)
            .count() as u64)
    }
}

impl CommunityStore for MemoryStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        self.check_available()?;
        let id = self.next_comment_id.fetch_add(1, Ordering::SeqCst) + 1;
        let stored = Comment {
            id,
            document_id: comment.document_id,
            parent_id: comment.parent_id,
            author_name: comment.author_name,
            content: comment.content,
            created_at: comment.created_at,
        };
        self.comments.insert(id, stored.clone());
        Ok(stored)
    }

    async fn comment_document(&self, comment_id: i64) -> Result<Option<String>> {
        self.check_available()?;
        Ok(self
            .comments
            .get(&comment_id)
            .map(|comment| comment.document_id.clone()))
    }

    async fn list_comments(&self, document_id: &str) -> Result<Vec<Comment>> {
        self.check_available()?;
        let mut comments: Vec<Comment> = self
            .comments
            .iter()
            .filter(|entry| entry.value().document_id == document_id)
            .map(|entry| entry.value().clone())
            .collect();
        comments.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        Ok(comments)
    }

    async fn comment_count(&self, document_id: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self
            .comments
            .iter()
            .filter(|entry| entry.value().document_id == document_id)
            .count() as u64)
    }

    async fn has_like(&self, document_id: &str, user: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .likes
            .contains_key(&(document_id.to_string(), user.to_string())))
    }

    async fn insert_like(&self, document_id: &str, user: &str, created_at: Timestamp) -> Result<bool> {
        self.check_available()?;
        let key = (document_id.to_string(), user.to_string());
        match self.likes.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(false),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(created_at);
                Ok(true)
            }
        }
    }

    async fn delete_like(&self, document_id: &str, user: &str) -> Result<bool> {
        self.check_available()?;
        Ok(self
            .likes
            .remove(&(document_id.to_string(), user.to_string()))
            .is_some())
    }

    async fn like_count(&self, document_id: &str) -> Result<u64> {
        self.check_available()?;
        Ok(self
            .likes
            .iter()
            .filter(|entry| entry.key().0 == document_id)
            .count() as u64)
    }
}

impl AnalyticsStore for MemoryStore {
    async fn summary(&self) -> Result<AnalyticsSummary> {
        self.check_available()?;
        let (total_views, pending_views, unique_documents) = {
            let tables = self.tables.lock();
            let mut documents: Vec<&str> =
                tables.views.iter().map(|view| view.document_id.as_str()).collect();
            documents.sort_unstable();
            documents.dedup();
            (
                tables.views.len() as u64,
                tables.queue.len() as u64,
                documents.len() as u64,
            )
        };

        Ok(AnalyticsSummary {
            total_views,
            pending_views,
            total_likes: self.likes.len() as u64,
            total_comments: self.comments.len() as u64,
            unique_documents,
        })
    }

    async fn views_per_day(&self, since: Timestamp) -> Result<Vec<(NaiveDate, u64)>> {
        self.check_available()?;
        let tables = self.tables.lock();
        let mut per_day: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for view in tables.views.iter().filter(|view| view.viewed_at >= since) {
            *per_day.entry(view.viewed_at.date_naive()).or_default() += 1;
        }
        Ok(per_day.into_iter().collect())
    }

    async fn top_documents(&self, limit: u32) -> Result<Vec<TopDocument>> {
        self.check_available()?;
        let tables = self.tables.lock();
        let mut per_document: BTreeMap<&str, u64> = BTreeMap::new();
        for view in &tables.views {
            *per_document.entry(view.document_id.as_str()).or_default() += 1;
        }

        let mut ranked: Vec<TopDocument> = per_document
            .into_iter()
            .map(|(document_id, views)| TopDocument {
                document_id: document_id.to_string(),
                views,
            })
            .collect();
        ranked.sort_by(|a, b| b.views.cmp(&a.views).then_with(|| a.document_id.cmp(&b.document_id)));
        ranked.truncate(limit as usize);
        Ok(ranked)
    }
}
