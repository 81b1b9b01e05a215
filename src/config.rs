use clap::Parser;
use std::time::Duration;

use crate::gateway::GatewayOptions;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "hemingway-gateway")]
#[command(about = "Readability analysis API backed by an LLM, with a response cache")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    // API key for the completion service
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    pub openai_base_url: String,

    #[arg(short, long, env = "ANALYSIS_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, env = "ANALYSIS_TEMPERATURE", default_value_t = 0.3)]
    pub temperature: f32,

    // Cache endpoint, e.g. "redis://localhost:6379". In-memory cache when absent
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    // Cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = DEFAULT_CACHE_TTL_SECS)]
    pub cache_ttl: u64,

    // Keep serving (uncached) when the cache store errors
    #[arg(long, env = "CACHE_FAIL_OPEN", default_value_t = false)]
    pub cache_fail_open: bool,

    // Share one model call between concurrent identical misses
    #[arg(long, env = "SINGLE_FLIGHT", default_value_t = false)]
    pub single_flight: bool,

    // Model call timeout in seconds
    #[arg(long, env = "MODEL_TIMEOUT", default_value_t = 60)]
    pub request_timeout: u64,
}

impl Args {
    pub fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            ttl: Duration::from_secs(self.cache_ttl),
            fail_open: self.cache_fail_open,
            single_flight: self.single_flight,
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
