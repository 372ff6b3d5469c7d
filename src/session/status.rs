use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::state::Phase;
use crate::playback::PlaybackRef;

/// Snapshot of the session as rendered to clients.
///
/// `transcription` and `response` are reserved slots for downstream
/// pipelines and are never populated by this service; they exist so the
/// payload shape stays stable when those pipelines land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: Phase,
    pub is_recording: bool,
    pub recording_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    /// Elapsed take time; still ticking while recording
    pub duration_secs: f64,
    pub chunks_received: usize,
    pub bytes_captured: usize,
    /// Playback reference for the finished take, if it produced audio
    pub recording: Option<PlaybackRef>,
    pub transcription: Option<String>,
    pub response: Option<String>,
    pub last_error: Option<String>,
}
