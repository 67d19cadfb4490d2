//! JSON-RPC protocol types for the gateway
//!
//! The gateway speaks JSON-RPC 2.0 over a connectionless HTTP transport:
//! every request is a full envelope and no session state survives between
//! calls. Request ids are echoed back byte-for-byte, including `0` and
//! `null`.

mod messages;
mod types;

pub use messages::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RequestId};
pub use types::{
    Content, InitializeResult, Info, ServerCapabilities, Tool, ToolsCallParams, ToolsCallResult,
    ToolsCapability, ToolsListResult,
};
