use axum::{Json, extract::State};
use std::sync::Arc;
use std::time::Instant;

use crate::error::AppError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{AnalyzeRequest, AnalyzeResponse};
use crate::state::AppState;

// POST /analyze, body validation is left to the Json extractor
pub async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    REQUEST_TOTAL.inc();
    let start_time = Instant::now();

    let analysis = state.gateway.analyze(&payload.text).await?;

    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());
    Ok(Json(AnalyzeResponse { analysis }))
}
