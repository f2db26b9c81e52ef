//! API route handlers
//!
//! Read endpoints serve the latest snapshot from [`AppState`]. Write
//! endpoints never touch the engine directly: they queue a request on the
//! processing loop's channels and answer `202 Accepted`.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, warn};

use super::envelope::{ApiErrorResponse, ApiResponse};
use super::feed::MetricsFeed;
use crate::pipeline::{AppState, SessionCommand, SystemStatus};
use crate::types::HeartRateMeasurement;

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers
#[derive(Clone)]
pub struct DashboardState {
    /// Application state from the pipeline
    pub app_state: Arc<RwLock<AppState>>,
    /// Broadcast of every published snapshot
    pub feed: MetricsFeed,
    /// Session commands towards the processing loop
    pub commands: mpsc::Sender<SessionCommand>,
    /// External heart-rate measurements towards the processing loop
    pub heart_rate: mpsc::Sender<HeartRateMeasurement>,
}

// ============================================================================
// Health Endpoint
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: SystemStatus,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub source: Option<String>,
    pub impulses_processed: u64,
}

/// GET /health
pub async fn get_health(State(state): State<DashboardState>) -> Json<HealthResponse> {
    let app_state = state.app_state.read().await;
    Json(HealthResponse {
        status: app_state.status,
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: app_state.uptime_secs(),
        source: app_state.source_name.clone(),
        impulses_processed: app_state.impulses_processed,
    })
}

// ============================================================================
// Metrics
// ============================================================================

/// GET /api/metrics - latest published snapshot
pub async fn get_metrics(State(state): State<DashboardState>) -> Response {
    let metrics = state.app_state.read().await.latest_metrics.clone();
    ApiResponse::ok(metrics)
}

// ============================================================================
// Session control
// ============================================================================

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub queued: &'static str,
}

/// POST /api/reset - start a new session
pub async fn post_reset(State(state): State<DashboardState>) -> Response {
    match state.commands.send(SessionCommand::Reset).await {
        Ok(()) => {
            debug!("Session reset queued");
            ApiResponse::accepted(QueuedResponse { queued: "reset" })
        }
        Err(_) => {
            warn!("Reset requested but the processing loop has stopped");
            ApiErrorResponse::unavailable("Processing loop is not running")
        }
    }
}

/// POST /api/heartrate - external heart-rate bridge
pub async fn post_heart_rate(
    State(state): State<DashboardState>,
    body: Result<Json<HeartRateMeasurement>, JsonRejection>,
) -> Response {
    let Json(measurement) = match body {
        Ok(body) => body,
        Err(rejection) => return ApiErrorResponse::bad_request(rejection.body_text()),
    };

    match state.heart_rate.send(measurement).await {
        Ok(()) => ApiResponse::accepted(QueuedResponse { queued: "heartrate" }),
        Err(_) => ApiErrorResponse::unavailable("Processing loop is not running"),
    }
}
