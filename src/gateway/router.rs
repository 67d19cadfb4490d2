//! Gateway HTTP router and handlers

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, header},
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use super::dispatch::Dispatcher;
use crate::error::rpc_codes;
use crate::protocol::JsonRpcResponse;

/// Descriptor of one configured adapter, served on `/mcp/servers`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AdapterDescriptor {
    /// Adapter name
    pub name: String,
    /// Service family
    pub kind: String,
    /// Remote adapter URL
    pub url: String,
}

/// Shared gateway state
pub struct AppState {
    /// Request dispatcher
    pub dispatcher: Dispatcher,
    /// Static descriptors of configured adapters
    pub descriptors: Vec<AdapterDescriptor>,
}

/// Build the gateway router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/mcp/sse", post(rpc_handler))
        .route("/mcp/servers", get(servers_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// POST /mcp/sse — one JSON-RPC envelope in, one envelope out.
///
/// The body is taken as a raw string so unparseable JSON still yields an
/// RPC-shaped parse error instead of a bare transport failure.
async fn rpc_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let bearer = bearer_token(&headers);

    let envelope: Value = match serde_json::from_str(&body) {
        Ok(v) => v,
        Err(_) => {
            return Json(JsonRpcResponse::error(
                None,
                rpc_codes::PARSE_ERROR,
                "Parse error",
            ));
        }
    };

    Json(state.dispatcher.dispatch(&envelope, bearer).await)
}

/// GET /mcp/servers — static descriptor of configured backend adapters.
async fn servers_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({"servers": state.descriptors}))
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
