//! Broker HTTP surface
//!
//! - `GET /auth/{provider}?user_id=&scope=` — redirect to the provider
//! - `GET /callback/{provider}?code=&state=` — complete the exchange
//! - `POST /token/{provider}` — issue an access token
//! - `GET /health` — liveness

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};

use super::endpoint::HttpTokenEndpoint;
use super::flow::OAuthFlow;
use super::issuer::TokenIssuer;
use super::provider::ProviderTable;
use super::store::{FileTokenStore, TokenStore};
use crate::config::{BrokerConfig, Config};
use crate::{Error, Result};

/// Shared broker state
pub struct BrokerState {
    /// Authorization flow controller
    pub flow: OAuthFlow,
    /// Token issuance service
    pub issuer: Arc<TokenIssuer>,
}

/// Credential broker server
pub struct Broker {
    config: BrokerConfig,
    state: Arc<BrokerState>,
}

impl Broker {
    /// Build a broker from config, wiring the file store and HTTP token
    /// endpoint. The issuer is shared so a co-located gateway can bind to
    /// it in-process.
    pub fn new(config: &Config) -> Result<Self> {
        let providers = Arc::new(ProviderTable::from_config(&config.providers));
        let store: Arc<dyn TokenStore> = match &config.broker.storage_dir {
            Some(dir) => Arc::new(FileTokenStore::new(dir.clone())?),
            None => Arc::new(FileTokenStore::default_location()?),
        };
        let endpoint = Arc::new(HttpTokenEndpoint::new(config.broker.request_timeout)?);

        let issuer = Arc::new(TokenIssuer::new(
            Arc::clone(&store),
            Arc::clone(&providers),
            endpoint.clone(),
        ));
        let flow = OAuthFlow::new(providers, store, endpoint, config.broker.public_url());

        Ok(Self {
            config: config.broker.clone(),
            state: Arc::new(BrokerState { flow, issuer }),
        })
    }

    /// Handle to the issuance service for in-process callers.
    #[must_use]
    pub fn issuer(&self) -> Arc<TokenIssuer> {
        Arc::clone(&self.state.issuer)
    }

    /// Run the broker until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid broker host: {e}")))?,
            self.config.port,
        );

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        info!(host = %self.config.host, port = self.config.port, "Credential broker listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(crate::shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}

/// Build the broker router.
pub fn create_router(state: Arc<BrokerState>) -> Router {
    Router::new()
        .route("/auth/{provider}", get(auth_handler))
        .route("/callback/{provider}", get(callback_handler))
        .route("/token/{provider}", post(token_handler))
        .route("/health", get(health_handler))
        .layer(CatchPanicLayer::new())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AuthQuery {
    user_id: String,
    #[serde(default)]
    scope: Option<String>,
}

async fn auth_handler(
    State(state): State<Arc<BrokerState>>,
    Path(provider): Path<String>,
    Query(query): Query<AuthQuery>,
) -> impl IntoResponse {
    match state
        .flow
        .authorization_url(&provider, &query.user_id, query.scope.as_deref())
    {
        Ok(url) => Redirect::temporary(url.as_str()).into_response(),
        Err(e) => {
            warn!(provider = %provider, error = %e, "Authorization start rejected");
            error_response(&e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

async fn callback_handler(
    State(state): State<Arc<BrokerState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
) -> impl IntoResponse {
    let (Some(code), Some(callback_state)) = (query.code, query.state) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Missing code or state parameter"})),
        )
            .into_response();
    };

    match state
        .flow
        .complete_authorization(&provider, &code, &callback_state)
        .await
    {
        Ok(()) => (
            StatusCode::OK,
            format!("Connected to {provider}. You can close this window."),
        )
            .into_response(),
        Err(e) => {
            error!(provider = %provider, error = %e, "Authorization exchange failed");
            error_response(&e).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenRequest {
    user_id: String,
}

async fn token_handler(
    State(state): State<Arc<BrokerState>>,
    Path(provider): Path<String>,
    Json(body): Json<TokenRequest>,
) -> impl IntoResponse {
    match state.issuer.issue(&provider, &body.user_id).await {
        Ok(token) => (StatusCode::OK, Json(serde_json::to_value(token).unwrap_or_default()))
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Map typed errors to distinct HTTP statuses at the broker boundary.
fn error_response(err: &Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match err {
        Error::NotConnected { .. } => StatusCode::NOT_FOUND,
        Error::RefreshFailed(_) => StatusCode::UNAUTHORIZED,
        Error::Config(_) => StatusCode::BAD_REQUEST,
        Error::Transport(_) | Error::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": err.to_string()})))
}

/// Build a broker state over injected parts, for embedding the broker
/// without the file store and HTTP endpoint wiring of [`Broker::new`].
#[must_use]
pub fn state_with(
    providers: Arc<ProviderTable>,
    store: Arc<dyn TokenStore>,
    endpoint: Arc<dyn super::endpoint::TokenEndpoint>,
    public_url: String,
) -> Arc<BrokerState> {
    let issuer = Arc::new(TokenIssuer::new(
        Arc::clone(&store),
        Arc::clone(&providers),
        Arc::clone(&endpoint),
    ));
    let flow = OAuthFlow::new(providers, store, endpoint, public_url);
    Arc::new(BrokerState { flow, issuer })
}
