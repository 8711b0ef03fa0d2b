//! Administrative HTTP surface over the series store and the scheduler.

use std::{sync::Arc, time::Duration};

use axum::{
    Json,
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::{
    core::retention::retention_cutoff,
    db::{
        Db,
        record::{SeriesRecord, keep_latest},
    },
    prelude::*,
    scheduler::{SnapshotScheduler, Status},
};

pub struct AppState {
    pub db: Db,
    pub scheduler: Arc<SnapshotScheduler>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/series/records", get(get_records))
        .route("/api/series/latest", get(get_latest))
        .route("/api/series/cleanup", post(cleanup))
        .route("/api/scheduler/status", get(get_status))
        .with_state(state)
        .layer((
            TraceLayer::new_for_http(),
            TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(10)),
        ))
}

#[instrument(skip_all)]
pub async fn serve(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result {
    info!(address = ?listener.local_addr()?, "serving…");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal)
        .await
        .context("the server has failed")
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound,
    Internal(Error),
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        Self::Internal(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::BadRequest(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::NotFound => (StatusCode::NOT_FOUND, "no data").into_response(),
            Self::Internal(error) => {
                error!("failed to handle the request: {error:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, format!("{error:#}")).into_response()
            }
        }
    }
}

#[derive(Deserialize)]
pub struct RecordsQuery {
    key: Option<String>,

    /// Unix timestamp in seconds or RFC 3339, defaults to 24 hours ago.
    from: Option<String>,

    /// Unix timestamp in seconds or RFC 3339, defaults to now.
    to: Option<String>,

    /// Keep only this many most recent records, ignored unless a positive integer.
    limit: Option<String>,
}

#[derive(Serialize)]
pub struct RecordsResponse {
    records: Vec<SeriesRecord>,
    count: usize,
}

#[instrument(skip_all)]
async fn get_records(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RecordsQuery>,
) -> Result<Json<RecordsResponse>, ApiError> {
    let series_key = required_key(query.key)?;
    let now = Utc::now();
    let from = query.from.as_deref().map_or(Ok(now - TimeDelta::days(1)), parse_timestamp)?;
    let to = query.to.as_deref().map_or(Ok(now), parse_timestamp)?;
    let limit = query.limit.and_then(|limit| limit.parse::<usize>().ok());

    let records = state.db.series().query_range(&series_key, from..=to).await?;
    let records = keep_latest(records, limit);
    Ok(Json(RecordsResponse { count: records.len(), records }))
}

#[derive(Deserialize)]
pub struct LatestQuery {
    key: Option<String>,
}

#[instrument(skip_all)]
async fn get_latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<SeriesRecord>, ApiError> {
    let series_key = required_key(query.key)?;
    state.db.series().query_latest(&series_key).await?.map(Json).ok_or(ApiError::NotFound)
}

#[derive(Deserialize)]
pub struct CleanupRequest {
    /// Non-positive or missing value means the default retention.
    #[serde(rename = "daysToKeep", default)]
    days_to_keep: i64,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    #[serde(rename = "deletedCount")]
    deleted_count: u64,

    message: String,
}

#[instrument(skip_all)]
async fn cleanup(
    State(state): State<Arc<AppState>>,
    Json(request): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let cutoff = retention_cutoff(Utc::now(), request.days_to_keep)
        .ok_or_else(|| ApiError::BadRequest("`daysToKeep` is out of range".to_owned()))?;
    let deleted_count = state.db.series().delete_before(cutoff).await?;
    Ok(Json(CleanupResponse {
        deleted_count,
        message: format!("deleted {deleted_count} records created before {cutoff}"),
    }))
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<Status> {
    Json(state.scheduler.status())
}

fn required_key(key: Option<String>) -> Result<String, ApiError> {
    key.filter(|key| !key.is_empty())
        .ok_or_else(|| ApiError::BadRequest("`key` parameter is required".to_owned()))
}

/// Parse either a Unix timestamp in seconds or an RFC 3339 timestamp.
fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, ApiError> {
    let timestamp = match value.parse::<i64>() {
        Ok(seconds) => DateTime::from_timestamp(seconds, 0),
        Err(_) => DateTime::parse_from_rfc3339(value).ok().map(|timestamp| timestamp.to_utc()),
    };
    timestamp.ok_or_else(|| ApiError::BadRequest(format!("invalid timestamp: `{value}`")))
}
