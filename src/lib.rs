//! toolhub library
//!
//! Trust-and-dispatch substrate for a personal automation stack:
//!
//! - **Credential broker**: OAuth 2.0 authorization flows, durable token
//!   storage, and on-demand access-token issuance with per-provider
//!   refresh policies.
//! - **Protocol gateway**: JSON-RPC 2.0 over HTTP, stateless session
//!   handshake, tool aggregation across backend adapters, and call routing
//!   backed by a multi-tier credential resolver.
//!
//! The individual tool adapters (issue trackers, calendars, mailboxes, …)
//! live outside this crate; the gateway talks to them through the
//! [`adapter::ToolAdapter`] contract.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod broker;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod protocol;
pub mod resolver;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Protocol version offered when a client omits one during `initialize`.
/// Clients that send their own version get it echoed back unchanged.
pub const DEFAULT_PROTOCOL_VERSION: &str = "2024-11-05";

/// Setup tracing/logging
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => {
            subscriber.with(fmt::layer().json()).init();
        }
        _ => {
            subscriber.with(fmt::layer()).init();
        }
    }

    Ok(())
}

/// Resolve when the process receives Ctrl+C or SIGTERM.
///
/// Shared by the broker and gateway servers for graceful shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
