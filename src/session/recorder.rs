use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::state::{Phase, SessionState};
use super::status::SessionStatus;
use crate::capture::{AudioChunk, CaptureDevice, CaptureStream, FaultSlot, StopSignal};
use crate::playback::Artifact;

/// Result of a start request
#[derive(Debug)]
pub enum StartOutcome {
    /// A fresh take is recording
    Started { recording_id: Uuid },
    /// A take was already in progress; it continues untouched
    AlreadyRecording,
    /// The capture device refused access; the session stays as it was
    DeviceUnavailable { message: String },
}

/// Result of a stop request. Stopping is always benign: when no take is in
/// progress nothing changes and the current status is returned as-is.
#[derive(Debug)]
pub enum StopOutcome {
    Stopped(SessionStatus),
    NotRecording(SessionStatus),
}

/// Handles parked between start and stop for the take in progress
struct Control {
    pump: Option<JoinHandle<()>>,
    stop_signal: Option<StopSignal>,
}

/// One recording session over one capture device.
///
/// Drives the `SessionState` aggregate: `start` requests device access and
/// spawns a pump task that appends chunks as they arrive; `stop` fires the
/// device's stop signal, waits for the pump to drain the tail of the
/// stream, and finalizes the take. A stream that dies on its own (device
/// fault) finalizes the same way, keeping whatever was captured.
pub struct RecordingSession {
    device: Box<dyn CaptureDevice>,
    state: Arc<Mutex<SessionState>>,
    control: Mutex<Control>,
}

impl RecordingSession {
    pub fn new(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            state: Arc::new(Mutex::new(SessionState::new())),
            control: Mutex::new(Control {
                pump: None,
                stop_signal: None,
            }),
        }
    }

    /// Start a fresh take.
    ///
    /// Refused device access is caught, not propagated: the outcome carries
    /// the reason and the same text lands in the session's `last_error`.
    pub async fn start(&self) -> StartOutcome {
        let mut control = self.control.lock().await;

        if self.state.lock().await.phase() == Phase::Recording {
            warn!("Start requested while already recording");
            return StartOutcome::AlreadyRecording;
        }

        info!("Requesting capture access from {}", self.device.name());
        let stream = match self.device.request_access().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Capture access refused: {}", e);
                let mut state = self.state.lock().await;
                state.deny(e.to_string());
                return StartOutcome::DeviceUnavailable {
                    message: e.to_string(),
                };
            }
        };
        let CaptureStream {
            format,
            chunks,
            fault,
            stop,
        } = stream;

        // Reap the pump of the previous take before parking a new one
        if let Some(handle) = control.pump.take() {
            if let Err(e) = handle.await {
                error!("Chunk pump task panicked: {}", e);
            }
        }

        let recording_id = self.state.lock().await.begin(format);
        control.stop_signal = Some(stop);
        control.pump = Some(tokio::spawn(pump_chunks(
            Arc::clone(&self.state),
            recording_id,
            chunks,
            fault,
        )));

        info!(
            "Recording started: {} at {}Hz/{}ch",
            recording_id, format.sample_rate, format.channels
        );
        StartOutcome::Started { recording_id }
    }

    /// Stop the take in progress.
    ///
    /// Fires the device's stop signal once, waits for the pump to append
    /// the tail of the stream, and returns the finalized status. With no
    /// take in progress this changes nothing. A stop racing a still
    /// resolving start is ignored; callers observe the session through
    /// status until the start settles.
    pub async fn stop(&self) -> StopOutcome {
        let mut control = match self.control.try_lock() {
            Ok(control) => control,
            Err(_) => {
                info!("Stop requested while a start is pending, ignoring");
                return StopOutcome::NotRecording(self.status().await);
            }
        };

        if self.state.lock().await.phase() != Phase::Recording {
            debug!("Stop requested with no take in progress");
            return StopOutcome::NotRecording(self.status().await);
        }

        info!("Stopping recording");
        if let Some(mut signal) = control.stop_signal.take() {
            signal.stop();
        }
        if let Some(handle) = control.pump.take() {
            if let Err(e) = handle.await {
                error!("Chunk pump task panicked: {}", e);
            }
        }

        let status = self.status().await;
        match &status.recording {
            Some(reference) => info!(
                "Recording stopped: {} bytes available at {}",
                reference.size_bytes, reference.url
            ),
            None => info!("Recording stopped with no audio captured"),
        }
        StopOutcome::Stopped(status)
    }

    pub async fn status(&self) -> SessionStatus {
        self.state.lock().await.snapshot()
    }

    /// The finished take's artifact, if the last take produced one
    pub async fn artifact(&self) -> Option<Arc<Artifact>> {
        self.state.lock().await.artifact()
    }
}

/// Append chunks in arrival order until the stream closes, then finalize.
///
/// The guard on the recording id keeps a pump that outlived its take from
/// touching a newer one.
async fn pump_chunks(
    state: Arc<Mutex<SessionState>>,
    recording_id: Uuid,
    mut chunks: mpsc::Receiver<AudioChunk>,
    fault: FaultSlot,
) {
    while let Some(chunk) = chunks.recv().await {
        state.lock().await.append_chunk(chunk);
    }

    let mut state = state.lock().await;
    if state.recording_id() != Some(recording_id) {
        debug!("Capture stream for a superseded take closed");
        return;
    }
    if let Some(message) = fault.take() {
        warn!("Capture stream faulted: {}", message);
        state.record_fault(message);
    }
    match state.finalize() {
        Some(artifact) => info!(
            "Take finalized: {} bytes ({:.2}s)",
            artifact.len(),
            artifact.duration_secs()
        ),
        None => info!("Take finalized with no audio"),
    }
}
