//! API route handlers
//!
//! Request handling for:
//! - Health and library listing
//! - Catalog inspection
//! - Surface lifecycle (start, cancel, snapshot, teardown)
//!
//! The SSE stream lives in [`super::sse`].

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use super::envelope::{ApiErrorResponse, ApiResponse};
use crate::aggregator::RiskBreakdown;
use crate::catalog::{Catalog, CatalogError, DualCatalog};
use crate::playback::{EventBus, PlaybackMode, SurfaceRegistry, SurfaceSnapshot};
use crate::types::PlaybackStatus;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct ApiState {
    /// Every surface and the playback it owns
    pub surfaces: Arc<SurfaceRegistry>,
    /// Event fan-out the SSE endpoint subscribes to
    pub events: EventBus,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl ApiState {
    pub fn new(surfaces: Arc<SurfaceRegistry>, events: EventBus) -> Self {
        Self {
            surfaces,
            events,
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub surfaces: usize,
    pub running: usize,
    pub event_subscribers: usize,
}

/// Both playable forms of a subject. At least one is present.
#[derive(Debug, Serialize)]
pub struct CatalogResponse {
    pub subject_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub single: Option<Arc<Catalog>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dual: Option<DualCatalog>,
}

#[derive(Debug, Deserialize)]
pub struct StartRequest {
    pub subject_id: String,
    #[serde(default)]
    pub mode: PlaybackMode,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub surface: String,
    pub subject_id: String,
    pub mode: PlaybackMode,
    pub session_id: Uuid,
    pub status: PlaybackStatus,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub surface: String,
    pub cancelled: bool,
}

#[derive(Debug, Serialize)]
pub struct SurfaceResponse {
    #[serde(flatten)]
    pub snapshot: SurfaceSnapshot,
    pub risk_breakdown: RiskBreakdown,
}

#[derive(Debug, Serialize)]
pub struct TeardownResponse {
    pub surface: String,
    pub interrupted: bool,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/health
pub async fn get_health(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        surfaces: state.surfaces.surface_names().len(),
        running: state.surfaces.running_count(),
        event_subscribers: state.events.subscriber_count(),
    })
}

/// GET /api/v1/documents
pub async fn list_documents(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(state.surfaces.catalogs().list_documents())
}

/// GET /api/v1/catalogs/:subject_id
pub async fn get_catalog(
    State(state): State<ApiState>,
    Path(subject_id): Path<String>,
) -> Response {
    let catalogs = state.surfaces.catalogs();
    let single = catalogs.get_catalog(&subject_id).ok();
    let dual = catalogs.get_dual(&subject_id).ok();
    if single.is_none() && dual.is_none() {
        let err = CatalogError::UnknownSubject(subject_id);
        return ApiErrorResponse::not_found("UNKNOWN_SUBJECT", err.to_string());
    }
    ApiResponse::ok(CatalogResponse {
        subject_id,
        single,
        dual,
    })
}

/// POST /api/v1/surfaces/:surface/start
pub async fn start_surface(
    State(state): State<ApiState>,
    Path(surface): Path<String>,
    body: Result<Json<StartRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return ApiErrorResponse::bad_request(rejection.body_text()),
    };

    match state
        .surfaces
        .start(&surface, &request.subject_id, request.mode)
    {
        Ok(handle) => {
            info!(surface = %surface, subject = %request.subject_id, "🎬 Start requested via API");
            ApiResponse::accepted(StartResponse {
                surface,
                subject_id: request.subject_id,
                mode: request.mode,
                session_id: handle.session_id(),
                status: PlaybackStatus::Running,
            })
        }
        Err(e) => {
            debug!(surface = %surface, error = %e, "Start rejected");
            ApiErrorResponse::from_playback(&e)
        }
    }
}

/// POST /api/v1/surfaces/:surface/cancel
pub async fn cancel_surface(
    State(state): State<ApiState>,
    Path(surface): Path<String>,
) -> Response {
    match state.surfaces.cancel(&surface) {
        Ok(cancelled) => ApiResponse::ok(CancelResponse { surface, cancelled }),
        Err(e) => ApiErrorResponse::from_playback(&e),
    }
}

/// GET /api/v1/surfaces/:surface
pub async fn get_surface(
    State(state): State<ApiState>,
    Path(surface): Path<String>,
) -> Response {
    match state.surfaces.snapshot(&surface) {
        Ok(snapshot) => {
            let risk_breakdown = RiskBreakdown::from_result(snapshot.result());
            ApiResponse::ok(SurfaceResponse {
                snapshot,
                risk_breakdown,
            })
        }
        Err(e) => ApiErrorResponse::from_playback(&e),
    }
}

/// DELETE /api/v1/surfaces/:surface
pub async fn teardown_surface(
    State(state): State<ApiState>,
    Path(surface): Path<String>,
) -> Response {
    match state.surfaces.teardown(&surface) {
        Ok(interrupted) => ApiResponse::ok(TeardownResponse {
            surface,
            interrupted,
        }),
        Err(e) => ApiErrorResponse::from_playback(&e),
    }
}
