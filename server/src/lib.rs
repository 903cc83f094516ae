use anyhow::Result;
use axum::{extract::{Path, Query, State}, http::{HeaderMap, StatusCode}, routing::{get, post}, Json, Router};
use lexrag_core::tokenizer::tokenize;
use lexrag_core::{EngineConfig, IndexPaths, IndexSummary, QueryHit, RetrievalEngine, RetrievalError};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 100;
const SNIPPET_BEFORE: usize = 15;
const SNIPPET_AFTER: usize = 30;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub k: Option<usize>,
}

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_s: f64,
    /// Returned hits with a non-zero score.
    pub matched: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub position: usize,
    pub score: f64,
    pub document_id: String,
    pub ordinal: usize,
    pub text: String,
    pub snippet: Option<String>,
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RetrievalEngine>,
    pub index_paths: IndexPaths,
    pub admin_token: Option<String>,
}

/// Load the index (refusing to start without a valid one) and wire the routes.
pub fn build_app(index_dir: String, config: EngineConfig) -> Result<Router> {
    let index_paths = IndexPaths::new(&index_dir);
    let engine = Arc::new(RetrievalEngine::open(&index_paths, config)?);
    let admin_token = std::env::var("ADMIN_TOKEN").ok();
    Ok(router(AppState { engine, index_paths, admin_token }))
}

pub fn router(app_state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val.split(',').filter_map(|s| s.trim().parse().ok()).collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/chunk/:position", get(chunk_handler))
        .route("/stats", get(stats_handler))
        .route("/index/reload", post(reload_handler))
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Json<SearchResponse> {
    let start = std::time::Instant::now();
    let k = params.k.unwrap_or(state.engine.config().top_k).clamp(1, MAX_K);
    let hits = state.engine.query_top_k(&params.q, k);
    let terms: HashSet<String> = tokenize(&params.q).into_iter().collect();

    let matched = hits.iter().filter(|h| h.score > 0.0).count();
    let results = hits
        .into_iter()
        .map(|h| {
            let snippet = snippet(&h.text, &terms);
            SearchHit { position: h.position, score: h.score, document_id: h.document_id, ordinal: h.ordinal, text: h.text, snippet }
        })
        .collect();
    Json(SearchResponse { query: params.q, took_s: start.elapsed().as_secs_f64(), matched, results })
}

pub async fn chunk_handler(State(state): State<AppState>, Path(position): Path<usize>) -> Result<Json<QueryHit>, (StatusCode, String)> {
    let index = state.engine.snapshot();
    match index.chunks().get(position) {
        Some(chunk) => Ok(Json(QueryHit {
            score: 0.0,
            position,
            document_id: chunk.document_id.clone(),
            ordinal: chunk.ordinal,
            text: chunk.text.clone(),
        })),
        None => Err((StatusCode::NOT_FOUND, format!("no chunk at position {position}"))),
    }
}

pub async fn stats_handler(State(state): State<AppState>) -> Json<IndexSummary> {
    Json(state.engine.summary())
}

/// Re-read the index directory and publish it; queries keep the old index on failure.
async fn reload_handler(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<IndexSummary>, (StatusCode, String)> {
    authorize(&state, &headers)?;
    state
        .engine
        .reload(&state.index_paths)
        .map(Json)
        .map_err(|e| (reload_status(&e), e.to_string()))
}

fn reload_status(err: &RetrievalError) -> StatusCode {
    match err {
        RetrievalError::IndexNotFound { .. } => StatusCode::NOT_FOUND,
        RetrievalError::CorruptIndex(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), (StatusCode, String)> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err((StatusCode::UNAUTHORIZED, "ADMIN_TOKEN not set".into())),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err((StatusCode::UNAUTHORIZED, "invalid admin token".into()))
    }
}

/// A window of chunk text around the first query term, with matching terms in `<em>`.
fn snippet(text: &str, terms: &HashSet<String>) -> Option<String> {
    let words: Vec<&str> = text.split(' ').collect();
    let first = words.iter().position(|w| terms.contains(*w))?;
    let start = first.saturating_sub(SNIPPET_BEFORE);
    let end = (first + SNIPPET_AFTER).min(words.len());
    let marked: Vec<String> = words[start..end]
        .iter()
        .map(|w| if terms.contains(*w) { format!("<em>{w}</em>") } else { w.to_string() })
        .collect();
    Some(marked.join(" "))
}
