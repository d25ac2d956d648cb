pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::mcq::handlers as mcq_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Spoken interview
        .route("/api/v1/interviews", post(handlers::handle_create))
        .route("/api/v1/interviews/:id", get(handlers::handle_get))
        .route("/api/v1/interviews/:id/answer", post(handlers::handle_answer))
        .route(
            "/api/v1/interviews/:id/audio",
            get(handlers::handle_latest_audio).post(handlers::handle_upload_audio),
        )
        .route(
            "/api/v1/interviews/:id/speech-finished",
            post(handlers::handle_speech_finished),
        )
        .route("/api/v1/interviews/:id/capture", post(handlers::handle_capture))
        .route(
            "/api/v1/interviews/:id/capture-error",
            post(handlers::handle_capture_error),
        )
        .route("/api/v1/interviews/:id/leave", post(handlers::handle_leave))
        .route("/api/v1/interviews/:id/finish", post(handlers::handle_finish))
        // Multiple-choice round
        .route("/api/v1/mcq", get(mcq_handlers::handle_get_paper))
        .route("/api/v1/mcq/submit", post(mcq_handlers::handle_submit))
        .with_state(state)
}
