//! flaskbot entry point: loads configuration, builds the catalog index and
//! outlet connection pool, and starts the HTTP boundary.

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use flaskbot::catalog::Catalog;
use flaskbot::config::Config;
use flaskbot::llm::{HttpLlmClient, LlmClient, RateLimitedLlmClient};
use flaskbot::orchestrator::Orchestrator;
use flaskbot::outlets::OutletGate;
use flaskbot::search::{Embedder, LocalEmbedder, ProductIndex};
use flaskbot::server::{self, AppState};
use flaskbot::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "flaskbot=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = Config::from_env().context("failed to load configuration")?;
    config.validate().context("invalid configuration")?;

    tracing::info!(port = config.port, "starting flaskbot");

    let catalog = Catalog::load_from_path(&config.catalog_path).context("failed to load catalog")?;
    tracing::info!(products = catalog.len(), "catalog loaded");

    let embedder: Arc<dyn Embedder> = Arc::new(
        tokio::task::spawn_blocking(LocalEmbedder::new)
            .await
            .context("embedding model load task panicked")?
            .context("failed to load embedding model")?,
    );
    let product_index = Arc::new(ProductIndex::build(&catalog, embedder).context("failed to build product index")?);

    let outlet_connect_options = PgConnectOptions::from_str(&config.sql_url)
        .context("invalid SQL_URL")?
        .password(&config.sql_key);
    let outlet_pool = PgPoolOptions::new()
        .max_connections(config.db_pool_size)
        .connect_with(outlet_connect_options)
        .await
        .context("failed to connect to outlet store")?;

    let http_llm: Arc<dyn LlmClient> = Arc::new(HttpLlmClient::from_config(&config));
    let llm: Arc<dyn LlmClient> = Arc::new(RateLimitedLlmClient::new(http_llm, config.llm_rate_limit_per_minute));

    let sessions = Arc::new(SessionStore::new(config.session_window, config.session_ttl_min));
    let outlet_gate = Arc::new(OutletGate::new(outlet_pool.clone(), llm.clone()));

    let orchestrator = Orchestrator::new(sessions.clone(), product_index, outlet_gate, llm, config.known_locations.clone());

    spawn_eviction_task(sessions, config.session_ttl_min);

    let state = Arc::new(AppState { config, orchestrator, catalog, outlet_pool });

    server::serve(state).await
}

/// Periodically sweeps expired/over-cap sessions, per spec.md §4.4's
/// lifetime policy. Runs for the life of the process.
fn spawn_eviction_task(sessions: Arc<SessionStore>, ttl_minutes: i64) {
    let interval = std::time::Duration::from_secs(60).max(std::time::Duration::from_secs((ttl_minutes.max(1) as u64) * 10));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            sessions.evict_expired(chrono::Utc::now()).await;
        }
    });
}
