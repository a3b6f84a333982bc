//! HTTP transport for the `cached` daemon (§6): a thin `axum` listener
//! exposing `POST /modelcache` and `GET /welcome`, serialising
//! [`CacheRequest`]/[`CacheResponse`] directly over JSON. Everything past
//! request deserialisation is [`CacheEngine::handle`] — this module adds no
//! logic of its own beyond wiring.

pub mod config;

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::adapter::CacheEngine;
use crate::types::{CacheRequest, CacheResponse};

/// Shared state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<CacheEngine>,
}

/// Build the router: `POST /modelcache` for the request/response envelope,
/// `GET /welcome` as an unauthenticated liveness probe.
pub fn router(engine: Arc<CacheEngine>) -> Router {
    Router::new()
        .route("/modelcache", post(handle_modelcache))
        .route("/welcome", get(welcome))
        .with_state(AppState { engine })
}

/// A malformed JSON body still gets a [`CacheResponse`] with error code 101
/// (§7: the envelope never leaks a raw transport error), not a bare HTTP
/// 400.
async fn handle_modelcache(
    State(state): State<AppState>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let response = match serde_json::from_slice::<CacheRequest>(&body) {
        Ok(request) => state.engine.handle(request).await,
        Err(err) => CacheResponse::from_error(&crate::CacheError::Validation(err.to_string())),
    };
    Json(response)
}

async fn welcome() -> impl IntoResponse {
    format!("modelcache {}", crate::version::version_string())
}
