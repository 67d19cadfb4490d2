//! Protocol gateway
//!
//! Stateless-per-request JSON-RPC dispatcher: session handshake, tool
//! aggregation across backend adapters, and call routing backed by the
//! credential resolver. The transport is connectionless, so every request
//! is treated as if the session were already active except the explicit
//! handshake methods.

mod dispatch;
mod router;
mod server;

pub use dispatch::Dispatcher;
pub use router::{AdapterDescriptor, AppState, create_router};
pub use server::Gateway;
