//! Finished recordings and the transient references handed to clients

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::capture::CaptureFormat;

/// A finalized recording: every chunk of one take, concatenated in arrival
/// order. Held in memory until the next take replaces it.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub id: Uuid,
    pub pcm: Vec<u8>,
    pub format: CaptureFormat,
    pub captured_at: DateTime<Utc>,
}

impl Artifact {
    pub fn new(id: Uuid, pcm: Vec<u8>, format: CaptureFormat) -> Self {
        Self {
            id,
            pcm,
            format,
            captured_at: Utc::now(),
        }
    }

    pub fn len(&self) -> usize {
        self.pcm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pcm.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        self.format.duration_secs(self.pcm.len())
    }

    pub fn content_type(&self) -> String {
        self.format.content_type()
    }
}

/// Transient reference to the current artifact.
///
/// Cheap to mint and minted fresh for every status snapshot, so clients can
/// always regenerate one. It stops resolving as soon as a new take replaces
/// the artifact it points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackRef {
    pub recording_id: Uuid,
    /// Path that serves the raw PCM bytes
    pub url: String,
    pub content_type: String,
    pub size_bytes: usize,
    pub duration_secs: f64,
    pub captured_at: DateTime<Utc>,
}

impl PlaybackRef {
    pub fn for_artifact(artifact: &Artifact) -> Self {
        Self {
            recording_id: artifact.id,
            url: media_url(artifact.id),
            content_type: artifact.content_type(),
            size_bytes: artifact.len(),
            duration_secs: artifact.duration_secs(),
            captured_at: artifact.captured_at,
        }
    }
}

/// Media path serving a recording's bytes
pub fn media_url(id: Uuid) -> String {
    format!("/recorder/recording/{}", id)
}
