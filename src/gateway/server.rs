//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};

use super::dispatch::Dispatcher;
use super::router::{AdapterDescriptor, AppState, create_router};
use crate::adapter::{AdapterRegistry, HttpAdapter};
use crate::broker::TokenIssuer;
use crate::config::{Config, GatewayConfig};
use crate::resolver::CredentialResolver;
use crate::{Error, Result};

/// Protocol gateway server
pub struct Gateway {
    config: GatewayConfig,
    state: Arc<AppState>,
}

impl Gateway {
    /// Build a gateway from config.
    ///
    /// `issuer` is a direct binding to a co-located broker; when present it
    /// becomes tier 2 of credential resolution, ahead of the network tier.
    pub fn new(config: &Config, issuer: Option<Arc<TokenIssuer>>) -> Result<Self> {
        let registry = Arc::new(AdapterRegistry::new());
        let mut descriptors = Vec::new();

        for (name, adapter_config) in &config.adapters {
            if !adapter_config.enabled {
                continue;
            }
            let adapter = HttpAdapter::new(
                name.clone(),
                adapter_config.kind,
                adapter_config.provider.clone(),
                adapter_config.url.clone(),
                config.gateway.call_timeout,
            )?;
            registry.register(Arc::new(adapter));
            descriptors.push(AdapterDescriptor {
                name: name.clone(),
                kind: adapter_config.kind.to_string(),
                url: adapter_config.url.clone(),
            });
            info!(adapter = %name, kind = %adapter_config.kind, "Registered adapter");
        }

        if registry.is_empty() {
            warn!("No adapters configured - tools/list will be empty");
        }

        let resolver = Arc::new(CredentialResolver::new(
            issuer,
            config.gateway.broker_url.clone(),
            config.gateway.static_token.clone(),
            config.gateway.user_id.clone(),
            config.gateway.request_timeout,
        )?);

        let dispatcher = Dispatcher::new(registry, resolver, config.gateway.call_timeout);

        Ok(Self {
            config: config.gateway.clone(),
            state: Arc::new(AppState {
                dispatcher,
                descriptors,
            }),
        })
    }

    /// Run the gateway until shutdown.
    pub async fn run(self) -> Result<()> {
        let addr = SocketAddr::new(
            self.config
                .host
                .parse()
                .map_err(|e| Error::Config(format!("Invalid gateway host: {e}")))?,
            self.config.port,
        );

        let app = create_router(Arc::clone(&self.state));
        let listener = TcpListener::bind(addr).await?;

        info!(host = %self.config.host, port = self.config.port, "Protocol gateway listening");
        info!(
            "RPC endpoint: POST http://{}:{}/mcp/sse",
            self.config.host, self.config.port
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(crate::shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        Ok(())
    }
}
