mod advisor;
mod config;
mod dashboard;
mod db;
mod errors;
mod llm_client;
mod models;
mod propagation;
mod readiness;
mod routes;
mod state;
mod store;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::advisor::{LearningPathAdvisor, LlmPathGenerator, PathGenerator};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::propagation::Propagator;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{PgSkillStore, SkillRecordStore};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathway API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    let store: Arc<dyn SkillRecordStore> = Arc::new(PgSkillStore::new(pool));

    // Initialize the advisor; without an API key it serves the deterministic fallback only
    let generator: Option<Arc<dyn PathGenerator>> = match &config.anthropic_api_key {
        Some(key) => {
            let llm = LlmClient::new(key.clone(), config.llm_api_url.clone())?;
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            let generator: Arc<dyn PathGenerator> = Arc::new(LlmPathGenerator::new(llm));
            Some(generator)
        }
        None => {
            warn!("ANTHROPIC_API_KEY not set; learning path advisor runs in fallback-only mode");
            None
        }
    };
    let advisor = LearningPathAdvisor::new(generator, config.advisor_timeout);
    info!(
        "Advisor timeout {}s, auto-refresh learning path: {}",
        config.advisor_timeout.as_secs(),
        config.auto_refresh_learning_path
    );

    let propagator = Arc::new(
        Propagator::new(store.clone(), advisor, config.auto_refresh_learning_path)
            .with_user_capacity(config.propagator_user_capacity),
    );

    // Build app state
    let state = AppState { store, propagator };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client's domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
