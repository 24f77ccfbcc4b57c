//! Dashboard aggregates and per-document counters

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, Utc};

use crate::core::types::{
    validate_document_id, AnalyticsSummary, DailyViews, DocumentStats, TopDocument,
};
use crate::core::{Error, Result};
use crate::storage::StoreImpl;

/// Default window for [`AnalyticsService::daily_views`]
pub const DEFAULT_DAYS: u32 = 30;
/// Largest window for [`AnalyticsService::daily_views`]
pub const MAX_DAYS: u32 = 365;
/// Default length of [`AnalyticsService::top_documents`]
pub const DEFAULT_TOP_LIMIT: u32 = 10;
/// Largest length of [`AnalyticsService::top_documents`]
pub const MAX_TOP_LIMIT: u32 = 100;

/// Read-only queries over drained views, likes and comments
pub struct AnalyticsService<S> {
    store: Arc<S>,
}

impl<S> Clone for AnalyticsService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: StoreImpl> AnalyticsService<S> {
    /// Create a service over the given store
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Archive-wide totals
    pub async fn summary(&self) -> Result<AnalyticsSummary> {
        self.store.summary().await
    }

    /// Views per UTC day over the last `days` days, oldest first, zero-filled
    pub async fn daily_views(&self, days: Option<u32>) -> Result<Vec<DailyViews>> {
        let days = bounded("days", days, DEFAULT_DAYS, MAX_DAYS)?;
        let today = Utc::now().date_naive();
        let first = first_day(today, days);
        let since = first.and_time(chrono::NaiveTime::MIN).and_utc();

        let sparse = self.store.views_per_day(since).await?;
        Ok(fill_days(first, today, sparse))
    }

    /// Most viewed documents, views descending then id ascending
    pub async fn top_documents(&self, limit: Option<u32>) -> Result<Vec<TopDocument>> {
        let limit = bounded("limit", limit, DEFAULT_TOP_LIMIT, MAX_TOP_LIMIT)?;
        self.store.top_documents(limit).await
    }

    /// Counters shown next to a document
    pub async fn document_stats(&self, document_id: &str) -> Result<DocumentStats> {
        let document_id = validate_document_id(document_id)?;
        let (views, pending_views, likes, comments) = tokio::try_join!(
            self.store.view_count(document_id),
            self.store.pending_view_count(document_id),
            self.store.like_count(document_id),
            self.store.comment_count(document_id),
        )?;

        Ok(DocumentStats {
            document_id: document_id.to_string(),
            views,
            pending_views,
            likes,
            comments,
        })
    }
}

fn bounded(name: &str, value: Option<u32>, default: u32, max: u32) -> Result<u32> {
    match value {
        None => Ok(default),
        Some(v) if (1..=max).contains(&v) => Ok(v),
        Some(v) => Err(Error::invalid_input(format!(
            "{} must be between 1 and {}, got {}",
            name, max, v
        ))),
    }
}

fn first_day(today: NaiveDate, days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(days.saturating_sub(1))))
        .unwrap_or(NaiveDate::MIN)
}

/// Expand sparse per-day counts into one entry per day from `first` to `last`
pub fn fill_days(first: NaiveDate, last: NaiveDate, sparse: Vec<(NaiveDate, u64)>) -> Vec<DailyViews> {
    let counts: HashMap<NaiveDate, u64> = sparse.into_iter().collect();
    first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| DailyViews {
            day,
            views: counts.get(&day).copied().unwrap_or(0),
        })
        .collect()
}
