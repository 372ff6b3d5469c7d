use super::state::AppState;
use crate::session::{SessionStatus, StartOutcome, StopOutcome};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StartRecordingResponse {
    pub recording_id: Uuid,
    pub status: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    pub status: String,
    pub message: String,
    pub session: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /recorder/start
/// Start a fresh take on the session's capture device
pub async fn start_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.start().await {
        StartOutcome::Started { recording_id } => (
            StatusCode::OK,
            Json(StartRecordingResponse {
                recording_id,
                status: "recording".to_string(),
                message: format!("Recording {} started", recording_id),
            }),
        )
            .into_response(),
        StartOutcome::AlreadyRecording => (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Already recording".to_string(),
            }),
        )
            .into_response(),
        StartOutcome::DeviceUnavailable { message } => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse { error: message }),
        )
            .into_response(),
    }
}

/// POST /recorder/stop
/// Stop the take in progress. Always succeeds: stopping an idle session
/// changes nothing and reports the session as it stands.
pub async fn stop_recording(State(state): State<AppState>) -> impl IntoResponse {
    match state.session.stop().await {
        StopOutcome::Stopped(session) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "stopped".to_string(),
                message: "Recording stopped".to_string(),
                session,
            }),
        )
            .into_response(),
        StopOutcome::NotRecording(session) => (
            StatusCode::OK,
            Json(StopRecordingResponse {
                status: "no-op".to_string(),
                message: "No recording in progress".to_string(),
                session,
            }),
        )
            .into_response(),
    }
}

/// GET /recorder/status
/// Snapshot of the session for the widget to render
pub async fn get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.status().await)
}

/// GET /recorder/recording/:recording_id
/// Serve the finished take's raw PCM bytes.
///
/// A stale id (superseded by a newer take) gets 410 so clients can tell a
/// dead reference from one that never existed.
pub async fn get_recording(
    State(state): State<AppState>,
    Path(recording_id): Path<Uuid>,
) -> impl IntoResponse {
    match state.session.artifact().await {
        Some(artifact) if artifact.id == recording_id => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, artifact.content_type())],
            artifact.pcm.clone(),
        )
            .into_response(),
        Some(_) => (
            StatusCode::GONE,
            Json(ErrorResponse {
                error: format!("Recording {} was replaced by a newer take", recording_id),
            }),
        )
            .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No finished recording available".to_string(),
            }),
        )
            .into_response(),
    }
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
