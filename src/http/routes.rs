use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route("/recorder/start", post(handlers::start_recording))
        .route("/recorder/stop", post(handlers::stop_recording))
        // Session queries
        .route("/recorder/status", get(handlers::get_status))
        .route(
            "/recorder/recording/:recording_id",
            get(handlers::get_recording),
        )
        // The widget calls from a browser origin, so CORS stays open
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
