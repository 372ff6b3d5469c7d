//! HTTP API server for external control (the browser widget)
//!
//! This module provides a REST API for driving the recording session:
//! - POST /recorder/start - Start a fresh take
//! - POST /recorder/stop - Stop the take in progress (benign when idle)
//! - GET /recorder/status - Query session status
//! - GET /recorder/recording/:id - Fetch the finished take's audio
//! - GET /health - Health check

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
