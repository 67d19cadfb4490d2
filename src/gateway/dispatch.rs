//! JSON-RPC method dispatch
//!
//! An explicit method table rather than open-ended string switching, so
//! the routing surface stays inspectable and testable in isolation.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::adapter::AdapterRegistry;
use crate::error::rpc_codes;
use crate::protocol::{
    InitializeResult, Info, JsonRpcResponse, RequestId, ServerCapabilities, Tool, ToolsCallParams,
    ToolsCallResult, ToolsCapability, ToolsListResult,
};
use crate::resolver::CredentialResolver;
use crate::{DEFAULT_PROTOCOL_VERSION, Error, Result};

/// Gateway request dispatcher.
pub struct Dispatcher {
    registry: Arc<AdapterRegistry>,
    resolver: Arc<CredentialResolver>,
    call_timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher.
    #[must_use]
    pub fn new(
        registry: Arc<AdapterRegistry>,
        resolver: Arc<CredentialResolver>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            resolver,
            call_timeout,
        }
    }

    /// Handle one envelope and produce the response envelope.
    ///
    /// `bearer` is the credential from the inbound `Authorization` header,
    /// if any; it becomes tier 1 of credential resolution for `tools/call`.
    pub async fn dispatch(&self, envelope: &Value, bearer: Option<&str>) -> JsonRpcResponse {
        // Id first, so even malformed envelopes echo it. Presence check,
        // never truthiness: 0 stays 0, absent and null become null.
        let id = RequestId::from_envelope(envelope);

        if envelope.get("jsonrpc").and_then(Value::as_str) != Some("2.0") {
            return JsonRpcResponse::error(id, rpc_codes::INVALID_REQUEST, "Invalid Request");
        }
        let Some(method) = envelope.get("method").and_then(Value::as_str) else {
            return JsonRpcResponse::error(id, rpc_codes::INVALID_REQUEST, "Invalid Request");
        };
        let params = envelope.get("params").cloned().unwrap_or(Value::Null);

        debug!(method = %method, "Dispatching request");

        let outcome = match method {
            "initialize" => self.handle_initialize(&params),
            // A notification carries no id, so strictly it should get no
            // body at all; an empty result is returned anyway for
            // compatibility with the clients this gateway grew up with.
            "notifications/initialized" => Ok(json!({})),
            "tools/list" => self.handle_tools_list().await,
            "tools/call" => self.handle_tools_call(params, bearer).await,
            "resources/list" => Ok(json!({"resources": []})),
            _ => Err(Error::json_rpc(
                rpc_codes::METHOD_NOT_FOUND,
                format!("Method not found: {method}"),
            )),
        };

        match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(e) => JsonRpcResponse::error(id, e.to_rpc_code(), e.to_string()),
        }
    }

    fn handle_initialize(&self, params: &Value) -> Result<Value> {
        // Echo the client's protocol version unchanged; a fixed version is
        // only used when the client does not send one.
        let protocol_version = params
            .get("protocolVersion")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_PROTOCOL_VERSION)
            .to_string();

        let result = InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    // Nudges well-behaved clients to fetch the tool list
                    // immediately after the handshake.
                    list_changed: Some(true),
                }),
            },
            server_info: Info {
                name: "toolhub".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };
        Ok(serde_json::to_value(result)?)
    }

    async fn handle_tools_list(&self) -> Result<Value> {
        let tools: Vec<Tool> = self.registry.aggregate_tools().await;
        debug!(tools = tools.len(), "Aggregated tool listing");
        Ok(serde_json::to_value(ToolsListResult { tools })?)
    }

    async fn handle_tools_call(&self, params: Value, bearer: Option<&str>) -> Result<Value> {
        let call: ToolsCallParams = serde_json::from_value(params)
            .map_err(|e| Error::json_rpc(rpc_codes::INVALID_PARAMS, format!("Invalid params: {e}")))?;

        let Some(adapter) = self.registry.route(&call.name) else {
            // Unknown tool is a tool-level failure, not a protocol one.
            return Ok(serde_json::to_value(ToolsCallResult::error_text(format!(
                "Unknown tool: '{}'. No adapter accepts it.",
                call.name
            )))?);
        };

        // Downstream failures from here on are wrapped into a normal result
        // payload so the response shape stays stable for clients.
        let credential = match adapter.provider() {
            Some(provider) => match self.resolver.resolve(bearer, provider).await {
                Ok(resolved) => {
                    debug!(tool = %call.name, provider = %provider, source = ?resolved.source, "Credential resolved");
                    Some(resolved.token)
                }
                Err(e) => {
                    warn!(tool = %call.name, provider = %provider, error = %e, "Credential resolution failed");
                    return Ok(serde_json::to_value(ToolsCallResult::error_text(format!(
                        "Credential resolution failed for '{}': {e}",
                        call.name
                    )))?);
                }
            },
            None => bearer.map(String::from),
        };

        let invocation = adapter.call_tool(&call.name, call.arguments, credential.as_deref());
        match tokio::time::timeout(self.call_timeout, invocation).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                warn!(tool = %call.name, adapter = %adapter.name(), error = %e, "Tool call failed");
                Ok(serde_json::to_value(ToolsCallResult::error_text(format!(
                    "Tool '{}' failed: {e}",
                    call.name
                )))?)
            }
            Err(_) => {
                warn!(tool = %call.name, adapter = %adapter.name(), "Tool call timed out");
                Ok(serde_json::to_value(ToolsCallResult::error_text(format!(
                    "Tool '{}' timed out",
                    call.name
                )))?)
            }
        }
    }
}
