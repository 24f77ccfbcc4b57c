//! Postgres storage backend
//!
//! Plain parameterized statements over an sqlx pool. The schema lives in
//! `migrations/` and is applied at startup unless disabled.

use chrono::NaiveDate;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::core::config::DatabaseConfig;
use crate::core::types::{
    to_count, AnalyticsSummary, Comment, NewComment, QueueSnapshot, Timestamp, TopDocument,
};
use crate::core::{Error, Result};
use crate::storage::{AnalyticsStore, CommunityStore, ViewStore};

const MOVE_QUEUED_SQL: &str = r#"
    WITH moved AS (
        DELETE FROM view_queue
        WHERE id <= $1
        RETURNING id, document_id, queued_at
    )
    INSERT INTO document_views (document_id, viewed_at)
    SELECT document_id, queued_at FROM moved ORDER BY id
"#;

const COPY_QUEUED_SQL: &str = r#"
    WITH batch AS (
        SELECT id, document_id, queued_at FROM view_queue
        WHERE id <= $1
    ), copied AS (
        INSERT INTO document_views (document_id, viewed_at)
        SELECT document_id, queued_at FROM batch ORDER BY id
    )
    SELECT id FROM batch ORDER BY id
"#;

const SUMMARY_SQL: &str = r#"
    SELECT
        (SELECT COUNT(*) FROM document_views),
        (SELECT COUNT(*) FROM view_queue),
        (SELECT COUNT(*) FROM likes),
        (SELECT COUNT(*) FROM comments),
        (SELECT COUNT(DISTINCT document_id) FROM document_views)
"#;

const VIEWS_PER_DAY_SQL: &str = r#"
    SELECT (viewed_at AT TIME ZONE 'UTC')::date AS day, COUNT(*)
    FROM document_views
    WHERE viewed_at >= $1
    GROUP BY day
    ORDER BY day
"#;

const TOP_DOCUMENTS_SQL: &str = r#"
    SELECT document_id, COUNT(*) AS views
    FROM document_views
    GROUP BY document_id
    ORDER BY views DESC, document_id ASC
    LIMIT $1
"#;

/// Storage backed by a Postgres connection pool
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect using the database section of the config, migrating if asked
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| Error::config("database.url is not set"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.connect_timeout)
            .connect(url)
            .await?;
        info!(max_connections = config.max_connections, "Connected to Postgres");

        let store = Self::new(pool);
        if config.run_migrations {
            store.migrate().await?;
        }
        Ok(store)
    }

    /// Apply the bundled schema migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    async fn count(&self, sql: &str, document_id: &str) -> Result<u64> {
        let n: i64 = sqlx::query_scalar(sql)
            .bind(document_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(to_count(n))
    }
}

impl ViewStore for PostgresStore {
    async fn enqueue_view(&self, document_id: &str, queued_at: Timestamp) -> Result<()> {
        sqlx::query("INSERT INTO view_queue (document_id, queued_at) VALUES ($1, $2)")
            .bind(document_id)
            .bind(queued_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        let (pending, max_id): (i64, Option<i64>) =
            sqlx::query_as("SELECT COUNT(*), MAX(id) FROM view_queue")
                .fetch_one(&self.pool)
                .await?;
        Ok(QueueSnapshot {
            pending: to_count(pending),
            max_id,
        })
    }

    async fn copy_queued(&self, up_to_id: i64) -> Result<Vec<i64>> {
        let copied: Vec<i64> = sqlx::query_scalar(COPY_QUEUED_SQL)
            .bind(up_to_id)
            .fetch_all(&self.pool)
            .await?;
        debug!(copied = copied.len(), up_to_id, "Copied queued views");
        Ok(copied)
    }

    async fn delete_queued(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let deleted = sqlx::query("DELETE FROM view_queue WHERE id = ANY($1)")
            .bind(ids)
            .execute(&self.pool)
            .await?
            .rows_affected();
        debug!(deleted, requested = ids.len(), "Deleted queued views");
        Ok(deleted)
    }

    async fn move_queued(&self, up_to_id: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let moved = sqlx::query(MOVE_QUEUED_SQL)
            .bind(up_to_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;
        debug!(moved, up_to_id, "Moved queued views");
        Ok(moved)
    }

    async fn view_count(&self, document_id: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM document_views WHERE document_id = $1",
            document_id,
        )
        .await
    }

    async fn pending_view_count(&self, document_id: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM view_queue WHERE document_id = $1",
            document_id,
        )
        .await
    }
}

impl CommunityStore for PostgresStore {
    async fn insert_comment(&self, comment: NewComment) -> Result<Comment> {
        let stored = sqlx::query_as::<_, Comment>(
            r#"
            INSERT INTO comments (document_id, parent_id, author_name, content, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, document_id, parent_id, author_name, content, created_at
            "#,
        )
        .bind(&comment.document_id)
        .bind(comment.parent_id)
        .bind(&comment.author_name)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await?;
        Ok(stored)
    }

    async fn comment_document(&self, comment_id: i64) -> Result<Option<String>> {
        let document_id = sqlx::query_scalar("SELECT document_id FROM comments WHERE id = $1")
            .bind(comment_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(document_id)
    }

    async fn list_comments(&self, document_id: &str) -> Result<Vec<Comment>> {
        let comments = sqlx::query_as::<_, Comment>(
            r#"
            SELECT id, document_id, parent_id, author_name, content, created_at
            FROM comments
            WHERE document_id = $1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn comment_count(&self, document_id: &str) -> Result<u64> {
        self.count(
            "SELECT COUNT(*) FROM comments WHERE document_id = $1",
            document_id,
        )
        .await
    }

    async fn has_like(&self, document_id: &str, user: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM likes WHERE document_id = $1 AND user_identifier = $2)",
        )
        .bind(document_id)
        .bind(user)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_like(&self, document_id: &str, user: &str, created_at: Timestamp) -> Result<bool> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO likes (document_id, user_identifier, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (document_id, user_identifier) DO NOTHING
            "#,
        )
        .bind(document_id)
        .bind(user)
        .bind(created_at)
        .execute(&self.pool)
        .await?
        .rows_affected();
        Ok(inserted == 1)
    }

    async fn delete_like(&self, document_id: &str, user: &str) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM likes WHERE document_id = $1 AND user_identifier = $2")
            .bind(document_id)
            .bind(user)
            .execute(&self.pool)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn like_count(&self, document_id: &str) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM likes WHERE document_id = $1", document_id)
            .await
    }
}

impl AnalyticsStore for PostgresStore {
    async fn summary(&self) -> Result<AnalyticsSummary> {
        let (views, pending, likes, comments, documents): (i64, i64, i64, i64, i64) =
            sqlx::query_as(SUMMARY_SQL).fetch_one(&self.pool).await?;
        Ok(AnalyticsSummary {
            total_views: to_count(views),
            pending_views: to_count(pending),
            total_likes: to_count(likes),
            total_comments: to_count(comments),
            unique_documents: to_count(documents),
        })
    }

    async fn views_per_day(&self, since: Timestamp) -> Result<Vec<(NaiveDate, u64)>> {
        let rows: Vec<(NaiveDate, i64)> = sqlx::query_as(VIEWS_PER_DAY_SQL)
            .bind(since)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(day, n)| (day, to_count(n))).collect())
    }

    async fn top_documents(&self, limit: u32) -> Result<Vec<TopDocument>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(TOP_DOCUMENTS_SQL)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(document_id, views)| TopDocument {
                document_id,
                views: to_count(views),
            })
            .collect())
    }
}
