use axum::Json;

use crate::models::{HealthResponse, WelcomeResponse};

pub const WELCOME_MESSAGE: &str = "Welcome to the Hemingway API. Analyze text for readability, adverbs, passive voice, and complexity.";

// GET /
pub async fn root_handler() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

// GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
