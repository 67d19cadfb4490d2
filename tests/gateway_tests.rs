//! Gateway HTTP surface tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tower::ServiceExt;

use toolhub::Result;
use toolhub::adapter::{AdapterKind, AdapterRegistry, ToolAdapter};
use toolhub::gateway::{AppState, Dispatcher, create_router};
use toolhub::protocol::Tool;
use toolhub::resolver::CredentialResolver;

struct StubAdapter {
    name: &'static str,
    kind: AdapterKind,
    tools: Vec<&'static str>,
    fail: bool,
}

#[async_trait]
impl ToolAdapter for StubAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn provider(&self) -> Option<&str> {
        None
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        if self.fail {
            return Err(toolhub::Error::Transport("adapter down".to_string()));
        }
        Ok(self
            .tools
            .iter()
            .map(|name| Tool {
                name: (*name).to_string(),
                description: Some(format!("{name} via {}", self.name)),
                input_schema: json!({"type": "object", "properties": {}}),
            })
            .collect())
    }

    async fn call_tool(
        &self,
        tool: &str,
        args: Value,
        _credential: Option<&str>,
    ) -> Result<Value> {
        if self.fail {
            return Err(toolhub::Error::Transport("adapter down".to_string()));
        }
        Ok(json!({"content": [{"type": "text", "text": format!("{tool} ok")}], "echo": args}))
    }
}

fn gateway_app(adapters: Vec<StubAdapter>) -> Router {
    let registry = Arc::new(AdapterRegistry::new());
    for adapter in adapters {
        registry.register(Arc::new(adapter));
    }
    let resolver = Arc::new(
        CredentialResolver::new(
            None,
            None,
            Some("static-token".to_string()),
            "u1".to_string(),
            Duration::from_secs(5),
        )
        .unwrap(),
    );
    let dispatcher = Dispatcher::new(registry, resolver, Duration::from_secs(5));
    create_router(Arc::new(AppState {
        dispatcher,
        descriptors: vec![],
    }))
}

fn default_app() -> Router {
    gateway_app(vec![
        StubAdapter {
            name: "tracker",
            kind: AdapterKind::Tracker,
            tools: vec!["create_issue", "list_repos"],
            fail: false,
        },
        StubAdapter {
            name: "calendar",
            kind: AdapterKind::Calendar,
            tools: vec!["list_events"],
            fail: false,
        },
    ])
}

async fn rpc(app: Router, envelope: Value) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp/sse")
                .header("content-type", "application/json")
                .body(Body::from(envelope.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn initialize_echoes_id_zero_and_declares_list_changed() {
    let (status, body) = rpc(
        default_app(),
        json!({
            "jsonrpc": "2.0",
            "id": 0,
            "method": "initialize",
            "params": {"protocolVersion": "2024-11-05"},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], json!(0), "id 0 must not collapse to null");
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(
        body["result"]["capabilities"]["tools"]["listChanged"],
        json!(true)
    );
}

#[tokio::test]
async fn id_round_trips_for_every_shape() {
    for id in [json!(0), json!(1), json!("abc"), json!(null)] {
        let (_, body) = rpc(
            default_app(),
            json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "tools/list",
            }),
        )
        .await;
        assert_eq!(body["id"], id, "id must echo byte-for-byte");
    }
}

#[tokio::test]
async fn tools_list_aggregates_across_adapters() {
    let (_, body) = rpc(
        default_app(),
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    )
    .await;

    let tools = body["result"]["tools"].as_array().unwrap();
    let names: Vec<_> = tools
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(tools.len(), 3);
    assert!(names.contains(&"create_issue"));
    assert!(names.contains(&"list_events"));
}

#[tokio::test]
async fn failing_adapter_does_not_break_listing() {
    let app = gateway_app(vec![
        StubAdapter {
            name: "tracker",
            kind: AdapterKind::Tracker,
            tools: vec!["create_issue"],
            fail: false,
        },
        StubAdapter {
            name: "mail",
            kind: AdapterKind::Mail,
            tools: vec!["send_mail"],
            fail: true,
        },
    ]);

    let (status, body) = rpc(
        app,
        json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none(), "no top-level error");
    let tools = body["result"]["tools"].as_array().unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0]["name"], "create_issue");
}

#[tokio::test]
async fn call_to_unknown_tool_is_error_flagged_result() {
    let (status, body) = rpc(
        default_app(),
        json!({
            "jsonrpc": "2.0",
            "id": 5,
            "method": "tools/call",
            "params": {"name": "teleport_user", "arguments": {}},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none());
    assert_eq!(body["result"]["isError"], json!(true));
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.contains("teleport_user"));
}

#[tokio::test]
async fn failing_adapter_call_is_error_flagged_result() {
    let app = gateway_app(vec![StubAdapter {
        name: "tracker",
        kind: AdapterKind::Tracker,
        tools: vec!["create_issue"],
        fail: true,
    }]);

    // Routed by keyword heuristic; the adapter itself then fails.
    let (status, body) = rpc(
        app,
        json!({
            "jsonrpc": "2.0",
            "id": 6,
            "method": "tools/call",
            "params": {"name": "create_issue", "arguments": {"title": "x"}},
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.get("error").is_none(), "downstream failures stay in the result");
    assert_eq!(body["result"]["isError"], json!(true));
}

#[tokio::test]
async fn unknown_method_is_method_not_found() {
    let (_, body) = rpc(
        default_app(),
        json!({"jsonrpc": "2.0", "id": 9, "method": "prompts/list"}),
    )
    .await;

    assert_eq!(body["error"]["code"], json!(-32601));
    assert_eq!(body["id"], json!(9));
}

#[tokio::test]
async fn malformed_envelope_is_invalid_request() {
    // Wrong protocol tag
    let (_, body) = rpc(
        default_app(),
        json!({"jsonrpc": "1.0", "id": 1, "method": "tools/list"}),
    )
    .await;
    assert_eq!(body["error"]["code"], json!(-32600));

    // Missing method
    let (_, body) = rpc(default_app(), json!({"jsonrpc": "2.0", "id": 1})).await;
    assert_eq!(body["error"]["code"], json!(-32600));
}

#[tokio::test]
async fn unparseable_body_is_parse_error() {
    let response = default_app()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/mcp/sse")
                .header("content-type", "application/json")
                .body(Body::from("{not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], json!(-32700));
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn initialized_notification_gets_empty_result() {
    let (_, body) = rpc(
        default_app(),
        json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
    )
    .await;
    assert_eq!(body["result"], json!({}));
    assert_eq!(body["id"], Value::Null);
}

#[tokio::test]
async fn servers_endpoint_lists_descriptors() {
    let registry = Arc::new(AdapterRegistry::new());
    let resolver = Arc::new(
        CredentialResolver::new(None, None, None, "u1".to_string(), Duration::from_secs(5))
            .unwrap(),
    );
    let app = create_router(Arc::new(AppState {
        dispatcher: Dispatcher::new(registry, resolver, Duration::from_secs(5)),
        descriptors: vec![toolhub::gateway::AdapterDescriptor {
            name: "tracker".to_string(),
            kind: "tracker".to_string(),
            url: "http://localhost:7001/rpc".to_string(),
        }],
    }));

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/mcp/servers")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["servers"][0]["name"], "tracker");
    assert_eq!(body["servers"][0]["url"], "http://localhost:7001/rpc");
}
