//! HTTP-level integration tests for the Boundary (C7).
//!
//! Exercises the axum router directly with `tower::ServiceExt::oneshot`
//! rather than binding a real socket, per SPEC_FULL.md §10.4. Requires the
//! `test-support` feature so `ScriptedLlmClient`/`HashEmbedder` are visible
//! outside the library crate's own `#[cfg(test)]` blocks:
//! `cargo test --features test-support --test http_api`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use tower::ServiceExt;

use flaskbot::catalog::Catalog;
use flaskbot::config::Config;
use flaskbot::llm::client::ScriptedLlmClient;
use flaskbot::llm::LlmClient;
use flaskbot::orchestrator::Orchestrator;
use flaskbot::outlets::OutletGate;
use flaskbot::search::embedder::HashEmbedder;
use flaskbot::search::{Embedder, ProductIndex};
use flaskbot::server::{router, AppState};
use flaskbot::session::SessionStore;

fn test_config() -> Config {
    Config {
        port: 0,
        llm_api_key: "test-key".to_string(),
        llm_base_url: "http://localhost:0".to_string(),
        sql_url: "postgres://localhost/nonexistent".to_string(),
        sql_key: "test-sql-key".to_string(),
        cors_origins: Vec::new(),
        session_window: 3,
        session_ttl_min: 60,
        catalog_path: "data/catalog.jsonl".to_string(),
        known_locations: vec!["Selangor".to_string(), "Penang".to_string()],
        db_pool_size: 5,
        llm_rate_limit_per_minute: 30,
    }
}

fn sample_catalog() -> Catalog {
    let data = [
        r#"{"id":"p1","name":"Steel Tumbler","description":"insulated tumbler keeps drinks cold","price":25.00,"capacity_ml":500,"tags":["tumbler","steel"]}"#,
        r#"{"id":"p2","name":"Budget Bottle","description":"a cheap plastic bottle","price":5.00,"capacity_ml":750,"tags":["bottle","budget"]}"#,
    ]
    .join("\n");
    Catalog::load_from_reader(std::io::Cursor::new(data)).unwrap()
}

/// A pool that never actually connects: fine for every test here since
/// none of them drive a request through the Outlet SQL Gate's `execute`.
fn lazy_pool() -> sqlx::PgPool {
    PgPoolOptions::new().connect_lazy("postgres://localhost/nonexistent").unwrap()
}

fn test_app(reply: &str) -> axum::Router {
    let config = test_config();
    let catalog = sample_catalog();
    let embedder: Arc<dyn Embedder> = Arc::new(HashEmbedder { dim: 64 });
    let product_index = Arc::new(ProductIndex::build(&catalog, embedder).unwrap());
    let llm: Arc<dyn LlmClient> = Arc::new(ScriptedLlmClient::new(reply.to_string()));
    let outlet_pool = lazy_pool();
    let outlet_gate = Arc::new(OutletGate::new(outlet_pool.clone(), llm.clone()));
    let sessions = Arc::new(SessionStore::new(config.session_window, config.session_ttl_min));
    let orchestrator = Orchestrator::new(sessions, product_index, outlet_gate, llm, config.known_locations.clone());

    let state = Arc::new(AppState { config, orchestrator, catalog, outlet_pool });
    router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1_000_000).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_chat_calculate_roundtrip() {
    let app = test_app("five plus three is eight");
    let body = serde_json::json!({ "question": "what is 5 plus 3" });
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;

    assert_eq!(json["planning_info"]["primary_action"], "calculate");
    assert_eq!(json["calculation_result"]["value"], 8.0);
    assert!(!json["session_id"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_empty_question_is_bad_request() {
    let app = test_app("unused");
    let body = serde_json::json!({ "question": "   " });
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_chat_session_id_echoed_and_remembered() {
    let app = test_app("here are some tumblers");
    let body = serde_json::json!({ "question": "show me tumblers", "session_id": "fixed-session" });
    let request = Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let json = body_json(response).await;
    assert_eq!(json["session_id"], "fixed-session");
    assert_eq!(json["planning_info"]["primary_action"], "search_products");
    assert!(json["product_count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_products_endpoint_returns_matches() {
    let app = test_app("unused");
    let request = Request::builder().uri("/products?query=tumbler&k=5").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["count"].as_u64().unwrap() >= 1);
}

#[tokio::test]
async fn test_calculate_endpoint_via_expression_param() {
    let app = test_app("unused");
    let request = Request::builder().uri("/calculate?expression=2%20%2B%202").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["ok"], true);
    assert_eq!(json["value"], 4.0);
}

#[tokio::test]
async fn test_calculate_endpoint_missing_param_is_bad_request() {
    let app = test_app("unused");
    let request = Request::builder().uri("/calculate").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_reports_catalog_nonempty() {
    let app = test_app("unused");
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["catalog_empty"], false);
}

#[tokio::test]
async fn test_stats_reports_catalog_size() {
    let app = test_app("unused");
    let request = Request::builder().uri("/api/stats").body(Body::empty()).unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["catalog_size"], 2);
}
