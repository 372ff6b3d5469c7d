pub mod capture;
pub mod config;
pub mod http;
pub mod playback;
pub mod session;

pub use capture::{
    AudioChunk, CaptureConfig, CaptureDevice, CaptureFormat, CaptureStream, DeviceUnavailable,
    FaultSlot, MicrophoneDevice, StopSignal, WavFileDevice,
};
pub use config::Config;
pub use http::{create_router, AppState};
pub use playback::{media_url, Artifact, PlaybackRef};
pub use session::{Phase, RecordingSession, SessionState, SessionStatus, StartOutcome, StopOutcome};
