//! Record three seconds from the default microphone and report the take.
//!
//! Run with: cargo run --example record_once

use anyhow::{bail, Result};
use micrec::{CaptureConfig, MicrophoneDevice, RecordingSession, StartOutcome, StopOutcome};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let device = MicrophoneDevice::new(CaptureConfig::default());
    let session = RecordingSession::new(Box::new(device));

    match session.start().await {
        StartOutcome::Started { recording_id } => {
            info!("Recording {} for three seconds...", recording_id)
        }
        StartOutcome::AlreadyRecording => bail!("Session unexpectedly busy"),
        StartOutcome::DeviceUnavailable { message } => bail!("Cannot record: {}", message),
    }

    tokio::time::sleep(Duration::from_secs(3)).await;

    let status = match session.stop().await {
        StopOutcome::Stopped(status) => status,
        StopOutcome::NotRecording(status) => status,
    };

    match status.recording {
        Some(reference) => info!(
            "Captured {} chunks, {} bytes ({:.2}s of {})",
            status.chunks_received, reference.size_bytes, reference.duration_secs, reference.content_type
        ),
        None => info!("No audio captured"),
    }

    Ok(())
}
