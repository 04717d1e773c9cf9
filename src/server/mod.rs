//! Boundary (C7) — the external HTTP surface.
//!
//! Thin axum handlers that parse the request, call into the Orchestrator or
//! a core component directly, and shape the response. No business logic
//! lives here, matching the teacher's `server/api.rs` split between
//! transport and the `crate::api` functions it wraps.

mod routes;

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderValue;
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::catalog::Catalog;
use crate::config::Config;
use crate::orchestrator::Orchestrator;

/// Shared application state handed to every handler via axum's `State`
/// extractor, mirroring the teacher's `AppState` shape in `tollbooth::main`.
pub struct AppState {
    pub config: Config,
    pub orchestrator: Orchestrator,
    pub catalog: Catalog,
    pub outlet_pool: sqlx::PgPool,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = build_cors_layer(&state.config.cors_origins);

    Router::new()
        .route("/health", get(routes::health))
        .route("/api/stats", get(routes::stats))
        .route("/api/chat", axum::routing::post(routes::chat))
        .route("/products", get(routes::products))
        .route("/outlets", get(routes::outlets))
        .route("/calculate", get(routes::calculate))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Build the CORS layer from the configured allow-list, per spec.md §6.
/// An empty list means same-origin only: no `Access-Control-Allow-Origin`
/// header is ever set, matching a restrictive default.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::new();
    }
    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(parsed)
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
        .max_age(Duration::from_secs(3600))
}

pub async fn serve(state: Arc<AppState>) -> anyhow::Result<()> {
    let port = state.config.port;
    let app = router(state);
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("flaskbot listening on {}", addr);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cors_origins_yields_permissive_default_layer() {
        let layer = build_cors_layer(&[]);
        drop(layer);
    }

    #[test]
    fn test_configured_origins_parsed() {
        let layer = build_cors_layer(&["https://example.com".to_string()]);
        drop(layer);
    }
}
