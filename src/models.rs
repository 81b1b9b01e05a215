use serde::{Deserialize, Serialize};

// POST /analyze request body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AnalyzeRequest {
    pub text: String,
}

// POST /analyze response body, `analysis` is the model's raw answer
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct AnalyzeResponse {
    pub analysis: String,
}

// GET / response body
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct WelcomeResponse {
    pub message: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}
