use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/submissions", post(handlers::submit_code))
        .route("/api/submissions/:token", get(handlers::get_submission))
        .route("/api/languages", get(handlers::list_languages))
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/stream", post(handlers::chat_stream))
        .route("/api/run-tests", post(handlers::run_tests))
        .route("/api/generate-question", post(handlers::generate_question))
        .route("/api/ai-feedback", post(handlers::ai_feedback))
}
