use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::monitor::{CheckEngine, SchedulerStatus, StatusSnapshot};
use crate::store::Store;
use crate::tracking::{ResourceId, TrackedResource};

/// Application state shared across handlers
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub engine: Arc<CheckEngine>,
    pub status: Arc<SchedulerStatus>,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============================================================================
// Tracking
// ============================================================================

#[derive(Deserialize)]
pub struct TrackRequest {
    pub url: String,
    pub target_price: f64,
}

#[derive(Serialize)]
pub struct TrackResponse {
    pub message: &'static str,
    pub id: ResourceId,
    pub tracking_url: String,
    pub target_price: f64,
    pub current_price: f64,
    pub created: bool,
}

/// Register a URL for tracking.
///
/// The page is fetched once up front so a URL whose price cannot be read is
/// rejected instead of being tracked silently.
pub async fn track(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrackRequest>,
) -> Result<(StatusCode, Json<TrackResponse>), ApiError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::BadRequest("url is required".to_string()));
    }
    if !request.target_price.is_finite() || request.target_price <= 0.0 {
        return Err(ApiError::BadRequest(
            "target_price must be a positive number".to_string(),
        ));
    }

    let current_price = state.engine.fetch_value(url).await.map_err(|e| {
        ApiError::Unprocessable(format!(
            "Failed to read a price from the provided URL: {}",
            e
        ))
    })?;

    let registration = state
        .store
        .create_if_absent(url, request.target_price)
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to save track request: {}", e)))?;

    tracing::info!(
        resource_id = %registration.resource.id,
        url = %url,
        current_price,
        created = registration.created,
        "Track request accepted"
    );

    let (status, message) = if registration.created {
        (StatusCode::CREATED, "Product is being tracked")
    } else {
        (StatusCode::OK, "Product is already tracked")
    };

    Ok((
        status,
        Json(TrackResponse {
            message,
            id: registration.resource.id,
            tracking_url: registration.resource.locator,
            target_price: registration.resource.threshold,
            current_price,
            created: registration.created,
        }),
    ))
}

#[derive(Serialize)]
pub struct ResourceInfo {
    pub id: ResourceId,
    pub url: String,
    pub target_price: f64,
    pub last_price: f64,
    pub last_checked: Option<DateTime<Utc>>,
    pub alert_active: bool,
}

impl From<TrackedResource> for ResourceInfo {
    fn from(r: TrackedResource) -> Self {
        Self {
            id: r.id,
            url: r.locator,
            target_price: r.threshold,
            last_price: r.last_value,
            last_checked: r.last_checked_at,
            alert_active: r.alert_active,
        }
    }
}

#[derive(Serialize)]
pub struct ResourcesResponse {
    pub resources: Vec<ResourceInfo>,
}

pub async fn list_tracked(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ResourcesResponse>, ApiError> {
    let mut resources = state
        .store
        .list_all()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    resources.sort_by_key(|r| r.id);

    Ok(Json(ResourcesResponse {
        resources: resources.into_iter().map(ResourceInfo::from).collect(),
    }))
}

pub async fn get_tracked(
    State(state): State<Arc<AppState>>,
    Path(id): Path<u64>,
) -> Result<Json<ResourceInfo>, ApiError> {
    let resource = state
        .store
        .get(ResourceId(id))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound(format!("Resource {} not found", id)))?;

    Ok(Json(resource.into()))
}

// ============================================================================
// Stats
// ============================================================================

#[derive(Serialize)]
pub struct StatsResponse {
    pub tracked: usize,
    pub alerts_active: usize,
    pub recipients: usize,
    pub scheduler: StatusSnapshot,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Result<Json<StatsResponse>, ApiError> {
    let resources = state
        .store
        .list_all()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(Json(StatsResponse {
        tracked: resources.len(),
        alerts_active: resources.iter().filter(|r| r.alert_active).count(),
        recipients: state.engine.recipients().len(),
        scheduler: state.status.snapshot(),
    }))
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unprocessable(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
