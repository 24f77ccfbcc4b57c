//! HTTP request handlers for the archive API
//!
//! Every handler is generic over the store so the same router serves both
//! backends.

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::auth;
use crate::api::response::{ApiResponse, JsonRequest, PathParam, QueryParams};
use crate::community::CommentRequest;
use crate::core::types::{
    AnalyticsSummary, Comment, CommentThread, DailyViews, DocumentStats, LikeStatus, Timestamp,
    TopDocument,
};
use crate::core::{AppState, Error, Result};
use crate::storage::StoreImpl;
use crate::system;

/// Body of a successful drain
#[derive(Debug, Serialize)]
pub struct DrainResponse {
    /// Always true
    pub success: bool,
    /// Queue rows recorded as views
    pub processed: u64,
    /// When the drain finished
    pub timestamp: Timestamp,
}

/// Body of the enqueue endpoint
#[derive(Debug, Serialize)]
pub struct TrackResponse {
    /// Always true; tracking never fails the caller
    pub success: bool,
    /// Whether a queue row was written
    pub queued: bool,
}

/// System health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Current system status
    pub status: String,
    /// Seconds since startup
    pub uptime_secs: u64,
    /// Server version
    pub version: String,
}

/// Like toggle request
#[derive(Debug, Deserialize)]
pub struct LikeRequest {
    /// Anonymous reader identifier chosen by the client
    pub user_identifier: String,
}

/// Query for like status
#[derive(Debug, Deserialize)]
pub struct LikeQuery {
    /// Reader identifier
    pub user: Option<String>,
}

/// Query for daily views
#[derive(Debug, Deserialize)]
pub struct DaysQuery {
    /// Window length in days
    pub days: Option<u32>,
}

/// Query for top documents
#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    /// Number of documents
    pub limit: Option<u32>,
}

/// Drain the view queue; called by the external scheduler
pub async fn process_views<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<DrainResponse>> {
    if let Some(secret) = app_state.cron_secret() {
        if !auth::is_authorized(&headers, secret) {
            warn!("Rejected drain request with missing or wrong cron secret");
            return Err(Error::Unauthorized);
        }
    }

    let outcome = app_state.drainer.drain().await?;
    Ok(Json(DrainResponse {
        success: true,
        processed: outcome.processed,
        timestamp: outcome.timestamp,
    }))
}

/// Queue one view of a document
pub async fn track_view<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    path: std::result::Result<Path<String>, PathRejection>,
) -> (StatusCode, Json<TrackResponse>) {
    let queued = match path {
        Ok(Path(document_id)) => app_state.tracker.track(&document_id).await,
        Err(rejection) => {
            warn!(reason = %rejection.body_text(), "Skipped view with undecodable document id");
            false
        }
    };
    (
        StatusCode::ACCEPTED,
        Json(TrackResponse {
            success: true,
            queued,
        }),
    )
}

/// View, like and comment counters of one document
pub async fn document_stats<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    PathParam(document_id): PathParam<String>,
) -> Result<Json<ApiResponse<DocumentStats>>> {
    let stats = app_state.analytics.document_stats(&document_id).await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Threaded comments of one document
pub async fn list_comments<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    PathParam(document_id): PathParam<String>,
) -> Result<Json<ApiResponse<Vec<CommentThread>>>> {
    let threads = app_state.comments.list_threads(&document_id).await?;
    debug!(document_id, threads = threads.len(), "Listed comments");
    Ok(Json(ApiResponse::success(threads)))
}

/// Post a comment or a reply
pub async fn add_comment<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    PathParam(document_id): PathParam<String>,
    JsonRequest(request): JsonRequest<CommentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Comment>>)> {
    let comment = app_state.comments.add_comment(&document_id, request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(comment))))
}

/// Whether a reader likes a document
pub async fn like_status<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    PathParam(document_id): PathParam<String>,
    QueryParams(query): QueryParams<LikeQuery>,
) -> Result<Json<ApiResponse<LikeStatus>>> {
    let user = query
        .user
        .ok_or_else(|| Error::invalid_input("user query parameter is required"))?;
    let status = app_state.likes.status(&document_id, &user).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Like or unlike a document
pub async fn toggle_like<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    PathParam(document_id): PathParam<String>,
    JsonRequest(request): JsonRequest<LikeRequest>,
) -> Result<Json<ApiResponse<LikeStatus>>> {
    let status = app_state
        .likes
        .toggle(&document_id, &request.user_identifier)
        .await?;
    Ok(Json(ApiResponse::success(status)))
}

/// Archive-wide totals
pub async fn analytics_summary<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
) -> Result<Json<ApiResponse<AnalyticsSummary>>> {
    let summary = app_state.analytics.summary().await?;
    Ok(Json(ApiResponse::success(summary)))
}

/// Views per day
pub async fn daily_views<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    QueryParams(query): QueryParams<DaysQuery>,
) -> Result<Json<ApiResponse<Vec<DailyViews>>>> {
    let days = app_state.analytics.daily_views(query.days).await?;
    Ok(Json(ApiResponse::success(days)))
}

/// Most viewed documents
pub async fn top_documents<S: StoreImpl>(
    State(app_state): State<Arc<AppState<S>>>,
    QueryParams(query): QueryParams<LimitQuery>,
) -> Result<Json<ApiResponse<Vec<TopDocument>>>> {
    let top = app_state.analytics.top_documents(query.limit).await?;
    Ok(Json(ApiResponse::success(top)))
}

/// Prometheus exposition
pub async fn metrics<S: StoreImpl>(State(app_state): State<Arc<AppState<S>>>) -> Response {
    if !app_state.config.metrics.enable_prometheus {
        return Error::not_found("metrics are disabled").into_response();
    }

    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        system::metrics::collect_metrics(),
    )
        .into_response()
}

/// Health check endpoint
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_secs: system::uptime().as_secs(),
        version: crate::VERSION.to_string(),
    })
}
