mod analyze;
mod health;
mod metrics;

pub use analyze::analyze_handler;
pub use health::{WELCOME_MESSAGE, health_handler, root_handler};
pub use metrics::metrics_handler;
