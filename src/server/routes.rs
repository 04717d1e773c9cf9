//! HTTP handlers for the Boundary, per spec.md §6's External Interfaces.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::calculator;
use crate::orchestrator::ChatQuestion;
use crate::search::{SortKey, DEFAULT_K};

use super::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub catalog_empty: bool,
    pub outlet_store_reachable: bool,
    pub llm_configured: bool,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let catalog_empty = state.catalog.is_empty();
    let outlet_store_reachable =
        tokio::time::timeout(Duration::from_secs(2), sqlx::query("SELECT 1").execute(&state.outlet_pool)).await.is_ok_and(|r| r.is_ok());
    let llm_configured = !state.config.llm_api_key.trim().is_empty();

    Json(HealthResponse {
        status: if outlet_store_reachable { "online" } else { "degraded" },
        catalog_empty,
        outlet_store_reachable,
        llm_configured,
    })
}

#[derive(Serialize)]
pub struct StatsResponse {
    pub catalog_size: usize,
    pub outlet_row_count: Option<i64>,
    pub session_count: usize,
}

pub async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let outlet_row_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM outlets")
        .fetch_one(&state.outlet_pool)
        .await
        .ok();

    Json(StatsResponse {
        catalog_size: state.catalog.len(),
        outlet_row_count,
        session_count: state.orchestrator.sessions.len(),
    })
}

pub async fn chat(State(state): State<Arc<AppState>>, Json(request): Json<ChatQuestion>) -> Response {
    if request.question.trim().is_empty() {
        return (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "question must not be empty" }))).into_response();
    }
    let envelope = state.orchestrator.handle_chat(request).await;
    (StatusCode::OK, Json(envelope)).into_response()
}

#[derive(Deserialize)]
pub struct ProductsQuery {
    query: String,
    k: Option<usize>,
}

pub async fn products(State(state): State<Arc<AppState>>, Query(params): Query<ProductsQuery>) -> Response {
    let k = params.k.unwrap_or(DEFAULT_K);
    let sort_key = SortKey::detect(&params.query);
    let matches = state.orchestrator.product_index.search_sorted(&params.query, k, sort_key).await;
    (StatusCode::OK, Json(serde_json::json!({ "count": matches.len(), "results": matches }))).into_response()
}

#[derive(Deserialize)]
pub struct OutletsQuery {
    query: String,
}

pub async fn outlets(State(state): State<Arc<AppState>>, Query(params): Query<OutletsQuery>) -> Response {
    let answer = state.orchestrator.outlet_gate.answer(&params.query).await;
    (StatusCode::OK, Json(answer)).into_response()
}

#[derive(Deserialize)]
pub struct CalculateQuery {
    expression: Option<String>,
    text: Option<String>,
}

pub async fn calculate(Query(params): Query<CalculateQuery>) -> Response {
    let input = params.expression.or(params.text);
    match input {
        Some(text) if !text.trim().is_empty() => (StatusCode::OK, Json(calculator::parse_and_calculate(&text))).into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(serde_json::json!({ "error": "expression or text query parameter is required" }))).into_response(),
    }
}
