use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::cache::CacheError;
use crate::gateway::GatewayError;

/// Handler error, rendered as `{"error": kind, "message": detail}`.
#[derive(Debug)]
pub struct AppError(pub GatewayError);

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        Self(err)
    }
}

impl AppError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            GatewayError::Model(_) => (StatusCode::BAD_GATEWAY, "upstream_model_error"),
            GatewayError::Cache(CacheError::Backend(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "cache_unavailable")
            }
            GatewayError::Cache(CacheError::Serialization(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "malformed_cache_entry")
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        tracing::error!(status = %status, error = %self.0, "analyze request failed");
        (
            status,
            Json(json!({ "error": kind, "message": self.0.to_string() })),
        )
            .into_response()
    }
}
