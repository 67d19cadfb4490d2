//! Broker HTTP surface tests

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Body,
    http::{Request, StatusCode},
    routing::post,
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use toolhub::broker::{
    HttpTokenEndpoint, MemoryTokenStore, ProviderTable, TokenRecord, TokenStore, create_router,
    now_ms, state_with,
};
use toolhub::config::ProviderConfig;

fn provider_table(token_url: Option<&str>) -> Arc<ProviderTable> {
    let mut config = HashMap::new();
    for id in ["github", "google"] {
        config.insert(
            id.to_string(),
            ProviderConfig {
                client_id: Some("cid".to_string()),
                client_secret: Some("secret".to_string()),
                token_url: token_url.map(String::from),
                ..ProviderConfig::default()
            },
        );
    }
    Arc::new(ProviderTable::from_config(&config))
}

fn broker_router(store: Arc<MemoryTokenStore>, token_url: Option<&str>) -> Router {
    let endpoint = Arc::new(HttpTokenEndpoint::new(Duration::from_secs(5)).unwrap());
    let state = state_with(
        provider_table(token_url),
        store,
        endpoint,
        "http://localhost:8787".to_string(),
    );
    create_router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Stub identity provider whose token endpoint always grants.
async fn spawn_stub_provider() -> String {
    let app = Router::new().route(
        "/oauth/token",
        post(|| async {
            Json(json!({
                "access_token": "provider-at",
                "refresh_token": "provider-rt",
                "expires_in": 3600,
                "scope": "repo",
            }))
        }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/oauth/token")
}

#[tokio::test]
async fn token_without_authorization_is_404() {
    let app = broker_router(Arc::new(MemoryTokenStore::new()), None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token/github")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user_id":"u1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("u1"));
    assert!(message.contains("github"));
}

#[tokio::test]
async fn token_for_connected_user_is_issued() {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .put(
            "u1",
            "github",
            TokenRecord {
                access_token: "stored-at".to_string(),
                refresh_token: None,
                expires_at: now_ms() + 600_000,
                scope: None,
            },
        )
        .await
        .unwrap();
    let app = broker_router(store, None);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token/github")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user_id":"u1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["access_token"], "stored-at");
    assert!(body["expires_at"].as_i64().unwrap() > now_ms());
    // The refresh token never leaves the broker
    assert!(body.get("refresh_token").is_none());
}

#[tokio::test]
async fn expired_token_with_unreachable_provider_is_401() {
    let store = Arc::new(MemoryTokenStore::new());
    store
        .put(
            "u1",
            "google",
            TokenRecord {
                access_token: "stale".to_string(),
                refresh_token: Some("rt".to_string()),
                expires_at: 0,
                scope: None,
            },
        )
        .await
        .unwrap();
    // Nothing listens on this port: the refresh attempt fails
    let app = broker_router(store, Some("http://127.0.0.1:9/token"));

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token/google")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user_id":"u1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn auth_redirects_to_provider_with_state() {
    let app = broker_router(Arc::new(MemoryTokenStore::new()), None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/github?user_id=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get("location")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with("https://github.com/login/oauth/authorize"));
    assert!(location.contains("state=u1"));
    assert!(location.contains("client_id=cid"));
}

#[tokio::test]
async fn auth_for_unconfigured_provider_is_400() {
    // Builtin google without config has no client credentials
    let endpoint = Arc::new(HttpTokenEndpoint::new(Duration::from_secs(5)).unwrap());
    let state = state_with(
        Arc::new(ProviderTable::from_config(&HashMap::new())),
        Arc::new(MemoryTokenStore::new()),
        endpoint,
        "http://localhost:8787".to_string(),
    );
    let app = create_router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/google?user_id=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_without_code_is_400() {
    let app = broker_router(Arc::new(MemoryTokenStore::new()), None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/callback/github?state=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn callback_exchanges_code_and_persists_record() {
    let token_url = spawn_stub_provider().await;
    let store = Arc::new(MemoryTokenStore::new());
    let app = broker_router(Arc::clone(&store), Some(&token_url));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/callback/github?code=abc&state=u1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let record = store.get("u1", "github").await.unwrap().unwrap();
    assert_eq!(record.access_token, "provider-at");
    assert_eq!(record.refresh_token.as_deref(), Some("provider-rt"));
    // GitHub tokens do not expire: sentinel far beyond the grant's hour
    assert!(record.expires_at > now_ms() + 300 * 24 * 3600 * 1000);

    // And issuance now works end to end
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/token/github")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"user_id":"u1"}"#))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["access_token"], "provider-at");
}

#[tokio::test]
async fn health_is_ok() {
    let app = broker_router(Arc::new(MemoryTokenStore::new()), None);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}
