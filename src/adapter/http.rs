//! HTTP forwarding adapter
//!
//! Forwards `tools/list` and `tools/call` as JSON-RPC POSTs to a remote
//! adapter process, attaching the resolved credential as a bearer header.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, header};
use serde_json::{Value, json};
use tracing::debug;

use super::{AdapterKind, ToolAdapter};
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, RequestId, Tool, ToolsListResult};
use crate::{Error, Result};

/// Adapter that proxies to a remote tool server over HTTP.
pub struct HttpAdapter {
    name: String,
    kind: AdapterKind,
    provider: Option<String>,
    url: String,
    http: Client,
}

impl HttpAdapter {
    /// Create a forwarding adapter with a bounded request timeout.
    pub fn new(
        name: String,
        kind: AdapterKind,
        provider: Option<String>,
        url: String,
        timeout: Duration,
    ) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Transport(e.to_string()))?;

        Ok(Self {
            name,
            kind,
            provider,
            url,
            http,
        })
    }

    async fn request(
        &self,
        method: &str,
        params: Value,
        credential: Option<&str>,
    ) -> Result<Value> {
        let envelope = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(RequestId::Number(1)),
            method: method.to_string(),
            params: Some(params),
        };

        let mut request = self
            .http
            .post(&self.url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(&envelope);

        if let Some(token) = credential {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Adapter request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(Error::Transport(format!(
                "Adapter '{}' returned HTTP {status}",
                self.name
            )));
        }

        let rpc: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| Error::Transport(format!("Malformed adapter response: {e}")))?;

        if let Some(err) = rpc.error {
            return Err(Error::JsonRpc {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        rpc.result
            .ok_or_else(|| Error::Protocol("Adapter response had neither result nor error".into()))
    }
}

#[async_trait]
impl ToolAdapter for HttpAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> AdapterKind {
        self.kind
    }

    fn provider(&self) -> Option<&str> {
        self.provider.as_deref()
    }

    async fn list_tools(&self) -> Result<Vec<Tool>> {
        let result = self.request("tools/list", json!({}), None).await?;
        let listing: ToolsListResult = serde_json::from_value(result)?;
        debug!(adapter = %self.name, tools = listing.tools.len(), "Listed remote tools");
        Ok(listing.tools)
    }

    async fn call_tool(&self, tool: &str, args: Value, credential: Option<&str>) -> Result<Value> {
        self.request(
            "tools/call",
            json!({"name": tool, "arguments": args}),
            credential,
        )
        .await
    }
}
