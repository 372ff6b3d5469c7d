use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use super::status::SessionStatus;
use crate::capture::{AudioChunk, CaptureFormat};
use crate::playback::{Artifact, PlaybackRef};

/// Lifecycle phase of the recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// No take yet, or the last start was refused
    Idle,
    /// Capturing; chunks are being appended
    Recording,
    /// Last take finished; its artifact (if any) is available
    Stopped,
}

/// The session aggregate: one recorder, one take at a time.
///
/// Pure state transitions only. The async side (device access, the chunk
/// pump) lives in `RecordingSession`; everything here happens under its
/// lock, so chunk order is exactly append order.
#[derive(Debug)]
pub struct SessionState {
    phase: Phase,
    chunks: Vec<AudioChunk>,
    chunk_count: usize,
    byte_len: usize,
    format: CaptureFormat,
    recording_id: Option<Uuid>,
    artifact: Option<Arc<Artifact>>,
    last_error: Option<String>,
    started_at: Option<DateTime<Utc>>,
    stopped_at: Option<DateTime<Utc>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            chunks: Vec::new(),
            chunk_count: 0,
            byte_len: 0,
            format: CaptureFormat::default(),
            recording_id: None,
            artifact: None,
            last_error: None,
            started_at: None,
            stopped_at: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn artifact(&self) -> Option<Arc<Artifact>> {
        self.artifact.clone()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn recording_id(&self) -> Option<Uuid> {
        self.recording_id
    }

    /// Begin a fresh take.
    ///
    /// Clears the chunk buffer, the previous artifact and any stale error,
    /// then enters the recording phase. Returns the new recording id.
    pub fn begin(&mut self, format: CaptureFormat) -> Uuid {
        let id = Uuid::new_v4();
        self.phase = Phase::Recording;
        self.chunks.clear();
        self.chunk_count = 0;
        self.byte_len = 0;
        self.format = format;
        self.recording_id = Some(id);
        self.artifact = None;
        self.last_error = None;
        self.started_at = Some(Utc::now());
        self.stopped_at = None;
        id
    }

    /// Record a refused access request. The phase does not change and a
    /// previous take's artifact stays playable.
    pub fn deny(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Append a captured chunk. Chunks arriving outside an active take are
    /// dropped.
    pub fn append_chunk(&mut self, chunk: AudioChunk) {
        if self.phase != Phase::Recording {
            warn!("Dropping chunk delivered outside an active take");
            return;
        }
        self.chunk_count += 1;
        self.byte_len += chunk.pcm.len();
        self.chunks.push(chunk);
    }

    /// Note a mid-take capture fault. The take still finalizes with
    /// whatever arrived before the fault.
    pub fn record_fault(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// End the take: Recording becomes Stopped and the buffered chunks
    /// become the artifact. A take with no chunks produces no artifact.
    /// Calling this outside the recording phase changes nothing.
    pub fn finalize(&mut self) -> Option<Arc<Artifact>> {
        if self.phase != Phase::Recording {
            return self.artifact.clone();
        }
        self.phase = Phase::Stopped;
        self.stopped_at = Some(Utc::now());

        // The buffer's job is done; the artifact replaces it
        let chunks = std::mem::take(&mut self.chunks);
        if chunks.is_empty() {
            self.artifact = None;
            return None;
        }

        let mut pcm = Vec::with_capacity(self.byte_len);
        for chunk in &chunks {
            pcm.extend_from_slice(&chunk.pcm);
        }
        let id = self.recording_id.unwrap_or_else(Uuid::new_v4);
        let artifact = Arc::new(Artifact::new(id, pcm, self.format));
        self.artifact = Some(Arc::clone(&artifact));
        Some(artifact)
    }

    /// Snapshot for status queries
    pub fn snapshot(&self) -> SessionStatus {
        let duration_secs = match (self.phase, self.started_at) {
            (Phase::Recording, Some(started)) => {
                Utc::now().signed_duration_since(started).num_milliseconds() as f64 / 1000.0
            }
            (Phase::Stopped, Some(started)) => match self.stopped_at {
                Some(stopped) => {
                    stopped.signed_duration_since(started).num_milliseconds() as f64 / 1000.0
                }
                None => 0.0,
            },
            _ => 0.0,
        };

        SessionStatus {
            phase: self.phase,
            is_recording: self.phase == Phase::Recording,
            recording_id: self.recording_id,
            started_at: self.started_at,
            duration_secs,
            chunks_received: self.chunk_count,
            bytes_captured: self.byte_len,
            recording: self.artifact.as_deref().map(PlaybackRef::for_artifact),
            transcription: None,
            response: None,
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
