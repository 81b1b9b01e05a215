//! Readability analysis API.
//!
//! `POST /analyze` hands the submitted text to an LLM completion service and
//! returns its critique, memoizing answers in a key-value cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod prompt;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers::{analyze_handler, health_handler, metrics_handler, root_handler};
use crate::state::AppState;

/// Any origin may call the API. Credentials stay off, since CORS forbids
/// them together with a wildcard origin.
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}

pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/analyze", post(analyze_handler))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
