use crate::session::RecordingSession;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The single recording session this service manages
    pub session: Arc<RecordingSession>,
}

impl AppState {
    pub fn new(session: Arc<RecordingSession>) -> Self {
        Self { session }
    }
}
