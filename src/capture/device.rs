use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

/// The single failure mode of requesting capture access.
///
/// Covers permission denial, missing hardware, and missing platform support —
/// the session does not care which; it records the reason and stays out of
/// the recording phase.
#[derive(Debug, Clone, Error)]
#[error("capture device unavailable: {reason}")]
pub struct DeviceUnavailable {
    pub reason: String,
}

impl DeviceUnavailable {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Requested capture parameters
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Preferred sample rate in Hz (devices may negotiate a different one)
    pub sample_rate: u32,
    /// Preferred channel count (1 = mono, 2 = stereo)
    pub channels: u16,
    /// Duration of each delivered chunk in milliseconds
    pub chunk_duration_ms: u64,
    /// Input device name (None = host default)
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // 16kHz speech capture default
            channels: 1,        // Mono
            chunk_duration_ms: 100,
            device: None,
        }
    }
}

/// Format a granted stream actually delivers.
///
/// Samples are always 16-bit little-endian PCM, interleaved; only rate and
/// channel count vary per device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl CaptureFormat {
    pub fn bytes_per_second(&self) -> usize {
        self.sample_rate as usize * self.channels as usize * 2
    }

    /// RFC 2586 media type for raw 16-bit PCM
    pub fn content_type(&self) -> String {
        format!(
            "audio/L16;rate={};channels={}",
            self.sample_rate, self.channels
        )
    }

    /// Duration of a buffer of this format, in seconds
    pub fn duration_secs(&self, byte_len: usize) -> f64 {
        byte_len as f64 / self.bytes_per_second() as f64
    }
}

impl Default for CaptureFormat {
    fn default() -> Self {
        Self {
            sample_rate: 16000,
            channels: 1,
        }
    }
}

/// One buffer of captured audio as delivered by a device
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Raw PCM bytes (16-bit little-endian, interleaved)
    pub pcm: Vec<u8>,
    /// Milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Shared slot a device writes into before closing its stream abnormally.
///
/// The session reads it once the chunk channel closes; an empty slot means
/// the stream ended cleanly. The first fault wins.
#[derive(Debug, Clone, Default)]
pub struct FaultSlot(Arc<Mutex<Option<String>>>);

impl FaultSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, message: impl Into<String>) {
        if let Ok(mut slot) = self.0.lock() {
            if slot.is_none() {
                *slot = Some(message.into());
            }
        }
    }

    pub fn take(&self) -> Option<String> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

/// One-shot request to end capture and release the device.
///
/// The wrapped closure runs at most once, whether `stop` is called or the
/// signal is dropped, so a device can treat it as its single release
/// request. After it fires the chunk channel closes once the device has
/// flushed everything it delivered.
pub struct StopSignal(Option<Box<dyn FnOnce() + Send>>);

impl StopSignal {
    pub fn new(on_stop: impl FnOnce() + Send + 'static) -> Self {
        Self(Some(Box::new(on_stop)))
    }

    /// Ask the device to end capture. Subsequent calls are no-ops.
    pub fn stop(&mut self) {
        if let Some(on_stop) = self.0.take() {
            on_stop();
        }
    }
}

impl Drop for StopSignal {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A live capture stream handed out by a device.
///
/// `chunks` yields buffers in delivery order and closes when capture ends —
/// because `stop` fired, or because the device quit on its own (check
/// `fault` for a reason once the channel is closed).
pub struct CaptureStream {
    pub format: CaptureFormat,
    pub chunks: mpsc::Receiver<AudioChunk>,
    pub fault: FaultSlot,
    pub stop: StopSignal,
}

/// Capture device contract
///
/// Implementations:
/// - `MicrophoneDevice`: cpal input device (all platforms)
/// - `WavFileDevice`: replay a WAV file as a live stream (tests, demos)
#[async_trait::async_trait]
pub trait CaptureDevice: Send + Sync {
    /// Request access to the device and begin streaming.
    ///
    /// Resolves once audio is actually flowing (or with `DeviceUnavailable`
    /// if the device refuses). Exclusivity is the caller's business: the
    /// recording session holds at most one open stream at a time.
    async fn request_access(&self) -> Result<CaptureStream, DeviceUnavailable>;

    /// Get device name for logging
    fn name(&self) -> &str;
}
