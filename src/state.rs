use crate::gateway::AnalysisGateway;

// app's shared state
pub struct AppState {
    pub gateway: AnalysisGateway,
}

impl AppState {
    pub fn new(gateway: AnalysisGateway) -> Self {
        Self { gateway }
    }
}
