//! Recording session management
//!
//! This module provides the recording lifecycle:
//! - `SessionState`: the pure state machine (Idle, Recording, Stopped)
//! - `RecordingSession`: wires the state to a capture device and drives
//!   the chunk pump
//! - `SessionStatus`: the client-facing snapshot

pub mod recorder;
pub mod state;
pub mod status;

pub use recorder::{RecordingSession, StartOutcome, StopOutcome};
pub use state::{Phase, SessionState};
pub use status::SessionStatus;
