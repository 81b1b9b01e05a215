use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hemingway_gateway::app;
use hemingway_gateway::cache::{CacheStore, MemoryStore, RedisStore};
use hemingway_gateway::config::Args;
use hemingway_gateway::gateway::AnalysisGateway;
use hemingway_gateway::llm::OpenAiClient;
use hemingway_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).compact().init();

    let args = Args::parse();

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(args.request_timeout))
        .build()
        .context("building HTTP client")?;
    let backend = Arc::new(OpenAiClient::new(
        http,
        args.openai_api_key.clone(),
        &args.openai_base_url,
        args.model.clone(),
        args.temperature,
    ));

    let cache: Arc<dyn CacheStore> = match &args.redis_url {
        Some(url) => {
            info!("using redis cache");
            Arc::new(RedisStore::new(url).context("opening redis client")?)
        }
        None => {
            info!("REDIS_URL not set, using in-memory cache");
            Arc::new(MemoryStore::new())
        }
    };

    let options = args.gateway_options();
    let gateway = AnalysisGateway::new(cache, backend, options);
    let router = app(Arc::new(AppState::new(gateway)));

    let addr = args.listen_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    info!("listening on http://{}", addr);
    info!(model = %args.model, temperature = args.temperature, "completion backend configured");
    info!(
        cache_ttl_secs = options.ttl.as_secs(),
        fail_open = options.fail_open,
        single_flight = options.single_flight,
        "cache configured"
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
